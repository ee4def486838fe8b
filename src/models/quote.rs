use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// One observed or synthesized market data sample for a single symbol
///
/// Points are produced once per stream tick (live fetch or simulation),
/// appended to the per-symbol ring buffer and broadcast to subscribers.
/// Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotePoint {
    /// Uppercase ticker (e.g. "AAPL")
    pub symbol: String,
    /// Sample time, millisecond precision
    pub timestamp: DateTime<Utc>,
    #[schema(value_type = String, example = "187.43")]
    pub price: Decimal,
    /// Absolute change versus the previous reference price
    #[schema(value_type = String, example = "-0.52")]
    pub change: Decimal,
    /// Percent change (percent points, e.g. -0.28 for -0.28%)
    #[schema(value_type = String, example = "-0.28")]
    pub change_percent: Decimal,
    pub volume: i64,
    #[schema(value_type = String, example = "189.10")]
    pub day_high: Decimal,
    #[schema(value_type = String, example = "185.90")]
    pub day_low: Decimal,
    // Simulated points fabricate bid/ask as price -/+ 0.01, so
    // bid <= price <= ask is not a guaranteed invariant here.
    #[schema(value_type = String, example = "187.42")]
    pub bid: Decimal,
    #[schema(value_type = String, example = "187.44")]
    pub ask: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "2900000000000")]
    pub market_cap: Option<Decimal>,
    pub currency: String,
}

impl QuotePoint {
    /// Quoted spread (ask - bid)
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// Batched stream event: every point produced during one tick, keyed by symbol
///
/// Published on the `stocks` topic only when at least one point was produced;
/// empty ticks emit nothing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub timestamp: DateTime<Utc>,
    pub updates: HashMap<String, QuotePoint>,
}

impl StockUpdate {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            updates: HashMap::new(),
        }
    }

    pub fn insert(&mut self, point: QuotePoint) {
        self.updates.insert(point.symbol.clone(), point);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }
}

impl Default for StockUpdate {
    fn default() -> Self {
        Self::new()
    }
}
