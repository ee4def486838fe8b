use axum::{routing::get, Router};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::websocket::{websocket_handler, WsState};

use super::handlers::*;
use super::openapi::ApiDoc;

/// Create the API router with Swagger UI and WebSocket support
pub fn create_router(state: AppState, ws_state: Arc<WsState>) -> Router {
    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // WebSocket endpoint
        .route("/ws", get(websocket_handler))
        .with_state(ws_state)
        // Health check
        .route("/health", get(health_check))
        // Market data endpoints
        .route("/api/v1/stocks", get(get_all_stocks))
        .route("/api/v1/stocks/:symbol/current", get(get_current_quote))
        .route("/api/v1/stocks/:symbol/range", get(get_quote_range))
        // Stream endpoints
        .route("/api/v1/stream/status", get(get_stream_status))
        .route("/api/v1/stream/latency", get(get_latency_stats))
        // Prediction endpoints
        .route("/api/v1/predictions/:symbol", get(get_prediction))
        .with_state(state)
}
