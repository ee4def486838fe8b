use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::responses::*;
use crate::market_data::{QuoteCacheStats, StreamState, StreamStatus};
use crate::metrics::LatencyStats;
use crate::models::{EvidenceItem, PredictionRecord, PredictionResponse, QuotePoint};

/// OpenAPI specification
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stock Stream API",
        version = "1.0.0",
        description = "Real-time stock streaming with AI-generated predictions, built in Rust",
        license(
            name = "MIT"
        )
    ),
    paths(
        handlers::health_check,
        handlers::get_all_stocks,
        handlers::get_current_quote,
        handlers::get_quote_range,
        handlers::get_stream_status,
        handlers::get_latency_stats,
        handlers::get_prediction,
    ),
    components(
        schemas(
            QuotePoint,
            StockListResponse,
            RangeResponse,
            StreamState,
            StreamStatus,
            QuoteCacheStats,
            StreamStatusResponse,
            LatencyStats,
            EvidenceItem,
            PredictionRecord,
            PredictionResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Stocks", description = "Cached market data queries"),
        (name = "Stream", description = "Stream scheduler status and latency metrics"),
        (name = "Predictions", description = "AI-generated price forecasts"),
    )
)]
pub struct ApiDoc;
