use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::market_data::{QuoteCache, StreamScheduler, SubscriptionRegistry};
use crate::metrics::{LatencyStats, LatencyTracker};
use crate::models::{PredictionResponse, QuotePoint};
use crate::prediction::{PredictionError, PredictionService};

use super::responses::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<QuoteCache>,
    pub scheduler: Arc<StreamScheduler>,
    pub registry: Arc<SubscriptionRegistry>,
    pub latency: Arc<LatencyTracker>,
    pub predictions: Arc<PredictionService>,
}

/// Query parameters for range queries (epoch milliseconds, inclusive)
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: i64,
    pub end: i64,
}

/// Query parameters for prediction requests
#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    /// Position of this symbol in the caller's watchlist; staggers refreshes
    #[serde(default)]
    pub index: u32,
}

/// Convert PredictionError to HTTP response
impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        let status = match &self {
            PredictionError::NoData => StatusCode::NOT_FOUND,
            PredictionError::Provider(_) => StatusCode::BAD_GATEWAY,
            PredictionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Get the latest point for every tracked symbol
#[utoipa::path(
    get,
    path = "/api/v1/stocks",
    tag = "Stocks",
    responses(
        (status = 200, description = "Latest cached point per symbol", body = StockListResponse)
    )
)]
pub async fn get_all_stocks(State(state): State<AppState>) -> Json<StockListResponse> {
    let stocks = state.cache.snapshot_all();

    Json(StockListResponse {
        timestamp: Utc::now(),
        count: stocks.len(),
        stocks,
    })
}

/// Get the most recent point for one symbol
#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/current",
    tag = "Stocks",
    params(
        ("symbol" = String, Path, description = "Ticker symbol (e.g., AAPL)")
    ),
    responses(
        (status = 200, description = "Most recent cached point", body = QuotePoint),
        (status = 404, description = "Symbol has no cached data")
    )
)]
pub async fn get_current_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<QuotePoint>, StatusCode> {
    state
        .cache
        .latest(&symbol.to_uppercase())
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Get cached points for a symbol within a time window
#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/range",
    tag = "Stocks",
    params(
        ("symbol" = String, Path, description = "Ticker symbol (e.g., AAPL)"),
        ("start" = i64, Query, description = "Window start, epoch milliseconds (inclusive)"),
        ("end" = i64, Query, description = "Window end, epoch milliseconds (inclusive)")
    ),
    responses(
        (status = 200, description = "Points within the window", body = RangeResponse),
        (status = 400, description = "Unparseable window bound")
    )
)]
pub async fn get_quote_range(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<RangeResponse>, StatusCode> {
    let start = DateTime::from_timestamp_millis(params.start).ok_or(StatusCode::BAD_REQUEST)?;
    let end = DateTime::from_timestamp_millis(params.end).ok_or(StatusCode::BAD_REQUEST)?;

    let symbol = symbol.to_uppercase();
    let points = state.cache.range(&symbol, start, end);

    Ok(Json(RangeResponse {
        symbol,
        count: points.len(),
        points,
    }))
}

/// Get stream scheduler status
#[utoipa::path(
    get,
    path = "/api/v1/stream/status",
    tag = "Stream",
    responses(
        (status = 200, description = "Scheduler state, subscriber count and cache stats", body = StreamStatusResponse)
    )
)]
pub async fn get_stream_status(State(state): State<AppState>) -> Json<StreamStatusResponse> {
    Json(StreamStatusResponse {
        stream: state.scheduler.status(),
        subscribers: state.registry.active(),
        cache: state.cache.stats(),
    })
}

/// Get tick pipeline latency statistics
#[utoipa::path(
    get,
    path = "/api/v1/stream/latency",
    tag = "Stream",
    responses(
        (status = 200, description = "Fetch, broadcast and total-tick histograms", body = [LatencyStats])
    )
)]
pub async fn get_latency_stats(State(state): State<AppState>) -> Json<Vec<LatencyStats>> {
    Json(state.latency.all_stats())
}

/// Get the AI prediction for a symbol
#[utoipa::path(
    get,
    path = "/api/v1/predictions/{symbol}",
    tag = "Predictions",
    params(
        ("symbol" = String, Path, description = "Ticker symbol (e.g., AAPL)"),
        ("index" = Option<u32>, Query, description = "Watchlist position; staggers background refreshes (default: 0)")
    ),
    responses(
        (status = 200, description = "Prediction with provenance flags", body = PredictionResponse),
        (status = 404, description = "No market data available for the symbol", body = ErrorResponse),
        (status = 502, description = "Upstream provider failed during generation", body = ErrorResponse)
    )
)]
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<PredictionQuery>,
) -> Result<Json<PredictionResponse>, PredictionError> {
    let response = state.predictions.get_or_refresh(&symbol, params.index).await?;
    Ok(Json(response))
}
