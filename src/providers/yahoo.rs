//! Yahoo Finance quote adapter
//!
//! Implements [`QuoteProvider`] against the public query API: the v7 quote
//! endpoint for snapshots and the v8 chart endpoint for daily history.
//! Responses are deserialized into narrow private structs and mapped to the
//! port types; anything absent that the port requires becomes
//! `ProviderError::MissingData`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::{DailyCandle, ProviderError, ProviderQuote, QuoteProvider};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SECONDS_PER_DAY: i64 = 86_400;

/// Yahoo Finance HTTP client
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Build from environment variables, falling back to the public host
    ///
    /// Reads QUOTE_BASE_URL.
    pub fn with_env_config() -> Self {
        match std::env::var("QUOTE_BASE_URL") {
            Ok(url) => Self::with_base_url(url),
            Err(_) => Self::new(),
        }
    }

    /// Point the client at a different host (config override, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                // the quote API rejects requests without a browser-ish agent
                .user_agent("Mozilla/5.0 (compatible; stock-stream-api/0.1)")
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceClient {
    async fn quote(&self, symbol: &str) -> Result<ProviderQuote, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v7/finance/quote", self.base_url))
            .query(&[("symbols", symbol)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                code: response.status().as_u16(),
            });
        }

        let envelope: QuoteEnvelope = response.json().await?;
        parse_quote(symbol, envelope)
    }

    async fn historical(&self, symbol: &str, days: u32) -> Result<Vec<DailyCandle>, ProviderError> {
        let period2 = Utc::now().timestamp();
        let period1 = period2 - i64::from(days) * SECONDS_PER_DAY;

        let response = self
            .client
            .get(format!("{}/v8/finance/chart/{}", self.base_url, symbol))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                code: response.status().as_u16(),
            });
        }

        let envelope: ChartEnvelope = response.json().await?;
        parse_chart(symbol, envelope)
    }
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    result: Vec<QuoteResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResult {
    symbol: Option<String>,
    regular_market_price: Option<Decimal>,
    regular_market_change: Option<Decimal>,
    regular_market_change_percent: Option<Decimal>,
    regular_market_volume: Option<i64>,
    regular_market_day_high: Option<Decimal>,
    regular_market_day_low: Option<Decimal>,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    market_cap: Option<Decimal>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<ChartBars>,
}

#[derive(Debug, Deserialize)]
struct ChartBars {
    open: Option<Vec<Option<Decimal>>>,
    high: Option<Vec<Option<Decimal>>>,
    low: Option<Vec<Option<Decimal>>>,
    close: Option<Vec<Option<Decimal>>>,
    volume: Option<Vec<Option<i64>>>,
}

// ============================================================================
// Mapping
// ============================================================================

fn parse_quote(symbol: &str, envelope: QuoteEnvelope) -> Result<ProviderQuote, ProviderError> {
    let result = envelope
        .quote_response
        .result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MissingData(format!("no quote result for {}", symbol)))?;

    let price = result
        .regular_market_price
        .ok_or_else(|| ProviderError::MissingData("regularMarketPrice".to_string()))?;

    Ok(ProviderQuote {
        symbol: result.symbol.unwrap_or_else(|| symbol.to_string()),
        price,
        change: result.regular_market_change.unwrap_or(Decimal::ZERO),
        change_percent: result.regular_market_change_percent.unwrap_or(Decimal::ZERO),
        volume: result.regular_market_volume.unwrap_or(0),
        day_high: result.regular_market_day_high.unwrap_or(price),
        day_low: result.regular_market_day_low.unwrap_or(price),
        bid: result.bid,
        ask: result.ask,
        market_cap: result.market_cap,
        currency: result.currency,
    })
}

fn parse_chart(symbol: &str, envelope: ChartEnvelope) -> Result<Vec<DailyCandle>, ProviderError> {
    let ChartResult {
        timestamp,
        indicators,
    } = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::MissingData(format!("no chart result for {}", symbol)))?;

    let timestamps = timestamp.unwrap_or_default();
    let bars = indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MissingData("indicators.quote".to_string()))?;

    let open = bars.open.unwrap_or_default();
    let high = bars.high.unwrap_or_default();
    let low = bars.low.unwrap_or_default();
    let close = bars.close.unwrap_or_default();
    let volume = bars.volume.unwrap_or_default();

    let mut candles = Vec::with_capacity(timestamps.len());
    for (i, secs) in timestamps.iter().enumerate() {
        // null entries mark half-days or gaps; skip the whole bar
        let (o, h, l, c) = match (
            open.get(i).copied().flatten(),
            high.get(i).copied().flatten(),
            low.get(i).copied().flatten(),
            close.get(i).copied().flatten(),
        ) {
            (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
            _ => continue,
        };
        let Some(timestamp) = DateTime::<Utc>::from_timestamp(*secs, 0) else {
            continue;
        };
        candles.push(DailyCandle {
            timestamp,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: volume.get(i).copied().flatten().unwrap_or(0),
        });
    }

    Ok(candles)
}
