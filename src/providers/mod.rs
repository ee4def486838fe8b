//! Upstream provider ports
//!
//! Thin async traits over the external services this crate consumes: a
//! market data vendor for quotes and daily history, an AI completion
//! endpoint for forecast generation, and a news feed for supporting
//! evidence. Services depend on these traits, never on the HTTP adapters,
//! so tests swap in hand-rolled fakes.

pub mod news;
pub mod openai;
pub mod yahoo;

pub use news::NewsClient;
pub use openai::OpenAiClient;
pub use yahoo::YahooFinanceClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by upstream provider adapters
///
/// All variants are transient from the caller's point of view: the quote
/// selector falls back to synthesis and the prediction generator degrades
/// its inputs, so these never reach stream consumers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {code}")]
    Status { code: u16 },

    /// Response decoded but the field(s) we need were absent
    #[error("Missing data in upstream response: {0}")]
    MissingData(String),

    /// Credential absent or rejected
    #[error("Upstream authentication failed: {0}")]
    Auth(String),
}

impl ProviderError {
    /// True when retrying later could plausibly succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Auth(_))
    }
}

/// Snapshot quote as reported by the market data vendor
///
/// Bid/ask and market cap are optional because vendors omit them outside
/// regular sessions; the selector fabricates bid/ask from the price when
/// absent.
#[derive(Debug, Clone)]
pub struct ProviderQuote {
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub volume: i64,
    pub day_high: Decimal,
    pub day_low: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub currency: Option<String>,
}

/// One daily OHLCV candle from the vendor's history endpoint
#[derive(Debug, Clone)]
pub struct DailyCandle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

/// One news item attached to a symbol
#[derive(Debug, Clone)]
pub struct NewsArticle {
    pub title: String,
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub url: Option<String>,
}

/// Market data vendor port
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch the current snapshot quote for one symbol
    async fn quote(&self, symbol: &str) -> Result<ProviderQuote, ProviderError>;

    /// Fetch up to `days` of daily candles ending now, oldest first
    async fn historical(&self, symbol: &str, days: u32) -> Result<Vec<DailyCandle>, ProviderError>;
}

/// AI completion port
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Submit a prompt and return the raw completion text
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Identifier of the underlying model, recorded on generated forecasts
    fn model_id(&self) -> &str;
}

/// News feed port; failures degrade to "no recent news"
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn recent_news(&self, symbol: &str) -> Result<Vec<NewsArticle>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Status { code: 429 };
        assert_eq!(err.to_string(), "Upstream returned status 429");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Status { code: 500 }.is_transient());
        assert!(ProviderError::MissingData("bid".to_string()).is_transient());
        assert!(!ProviderError::Auth("bad key".to_string()).is_transient());
    }
}
