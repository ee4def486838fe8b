//! Quote source selection
//!
//! Decides, per symbol and per tick, where the next QuotePoint comes from:
//! the live provider when a fetch succeeds, otherwise synthesis seeded by
//! the last known price. Provider failures are absorbed here and never
//! reach the stream; a symbol with no price history at all is skipped for
//! the tick.

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

use crate::market_data::simulator;
use crate::models::QuotePoint;
use crate::providers::{ProviderQuote, QuoteProvider};

/// Fabricated half-spread when the provider omits bid/ask
const HALF_SPREAD: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub struct QuoteSource {
    provider: Arc<dyn QuoteProvider>,
    /// Last price seen per symbol, live or synthetic; seeds the next synthesis
    last_prices: DashMap<String, Decimal>,
}

impl QuoteSource {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            provider,
            last_prices: DashMap::new(),
        }
    }

    /// Record a starting price for a symbol, typically the newest seeded
    /// historical close
    pub fn seed_price(&self, symbol: &str, price: Decimal) {
        self.last_prices.insert(symbol.to_string(), price);
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.last_prices.get(symbol).map(|p| *p)
    }

    /// Live-path quote: fetch from the provider, fall back to synthesis
    ///
    /// Returns None only when the fetch failed and no seed price exists,
    /// meaning the symbol is skipped this tick.
    pub async fn next_quote(&self, symbol: &str) -> Option<QuotePoint> {
        match self.provider.quote(symbol).await {
            Ok(quote) => {
                self.last_prices.insert(symbol.to_string(), quote.price);
                Some(self.map_provider_quote(quote))
            }
            Err(e) => {
                warn!(
                    "⚠️  Quote fetch failed for {}: {} - falling back to synthesis",
                    symbol, e
                );
                self.simulated_quote(symbol)
            }
        }
    }

    /// Synthesize the next point from the last known price
    ///
    /// The synthetic price becomes the new seed, so repeated calls random-walk
    /// rather than jitter around a fixed point.
    pub fn simulated_quote(&self, symbol: &str) -> Option<QuotePoint> {
        let seed = *self.last_prices.get(symbol)?;
        let point = simulator::synthesize_point(symbol, seed, Utc::now());
        self.last_prices.insert(symbol.to_string(), point.price);
        Some(point)
    }

    fn map_provider_quote(&self, quote: ProviderQuote) -> QuotePoint {
        let price = quote.price;
        QuotePoint {
            symbol: quote.symbol,
            timestamp: Utc::now(),
            price,
            change: quote.change,
            change_percent: quote.change_percent,
            volume: quote.volume,
            day_high: quote.day_high,
            day_low: quote.day_low,
            bid: quote.bid.unwrap_or(price - HALF_SPREAD),
            ask: quote.ask.unwrap_or(price + HALF_SPREAD),
            market_cap: quote.market_cap,
            currency: quote.currency.unwrap_or_else(|| "USD".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DailyCandle, ProviderError};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    struct FakeQuoteProvider {
        fail: AtomicBool,
        calls: AtomicU64,
    }

    impl FakeQuoteProvider {
        fn new(fail: bool) -> Self {
            Self {
                fail: AtomicBool::new(fail),
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl QuoteProvider for FakeQuoteProvider {
        async fn quote(&self, symbol: &str) -> Result<ProviderQuote, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Status { code: 503 });
            }
            Ok(ProviderQuote {
                symbol: symbol.to_string(),
                price: dec!(187.43),
                change: dec!(-0.52),
                change_percent: dec!(-0.28),
                volume: 1_200_000,
                day_high: dec!(189.10),
                day_low: dec!(185.90),
                bid: None,
                ask: None,
                market_cap: Some(dec!(2900000000000)),
                currency: Some("USD".to_string()),
            })
        }

        async fn historical(
            &self,
            _symbol: &str,
            _days: u32,
        ) -> Result<Vec<DailyCandle>, ProviderError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_live_quote_maps_and_seeds() {
        let provider = Arc::new(FakeQuoteProvider::new(false));
        let source = QuoteSource::new(provider.clone());

        let point = source.next_quote("AAPL").await.unwrap();
        assert_eq!(point.price, dec!(187.43));
        // provider omitted bid/ask, so they are fabricated around the price
        assert_eq!(point.bid, dec!(187.42));
        assert_eq!(point.ask, dec!(187.44));
        assert_eq!(source.last_price("AAPL"), Some(dec!(187.43)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_synthesis() {
        let source = QuoteSource::new(Arc::new(FakeQuoteProvider::new(true)));
        source.seed_price("AAPL", dec!(200));

        let point = source.next_quote("AAPL").await.unwrap();
        assert!(point.change_percent.abs() <= dec!(0.3));
        assert_eq!(point.ask - point.bid, dec!(0.02));
    }

    #[tokio::test]
    async fn test_no_seed_means_skip() {
        let source = QuoteSource::new(Arc::new(FakeQuoteProvider::new(true)));
        assert!(source.next_quote("UNSEEDED").await.is_none());
        assert!(source.simulated_quote("UNSEEDED").is_none());
    }

    #[test]
    fn test_synthesis_walks_from_previous_point() {
        let source = QuoteSource::new(Arc::new(FakeQuoteProvider::new(true)));
        source.seed_price("AAPL", dec!(100));

        let first = source.simulated_quote("AAPL").unwrap();
        assert_eq!(source.last_price("AAPL"), Some(first.price));

        let second = source.simulated_quote("AAPL").unwrap();
        // second point perturbs the first synthetic price, not the original seed
        assert_eq!(second.price, first.price + second.change);
    }
}
