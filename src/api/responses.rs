use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::market_data::{QuoteCacheStats, StreamStatus};
use crate::models::QuotePoint;

/// Snapshot of the most recent point for every cached symbol
#[derive(Debug, Serialize, ToSchema)]
pub struct StockListResponse {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub stocks: HashMap<String, QuotePoint>,
}

/// Cached points for one symbol within an inclusive time window
#[derive(Debug, Serialize, ToSchema)]
pub struct RangeResponse {
    pub symbol: String,
    pub count: usize,
    pub points: Vec<QuotePoint>,
}

/// Composite stream health: scheduler, subscribers and cache occupancy
#[derive(Debug, Serialize, ToSchema)]
pub struct StreamStatusResponse {
    pub stream: StreamStatus,
    pub subscribers: usize,
    pub cache: QuoteCacheStats,
}

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
