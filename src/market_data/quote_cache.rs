use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use utoipa::ToSchema;

use crate::models::QuotePoint;

/// Statistics for the quote cache
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteCacheStats {
    pub symbols: usize,
    pub capacity: usize,
    pub total_points: usize,
    pub total_appended: u64,
    pub total_evicted: u64,
    /// Current buffer length per symbol
    pub per_symbol: HashMap<String, usize>,
}

/// In-memory quote history, one bounded FIFO buffer per symbol
///
/// Written only by the stream scheduler; read concurrently by request
/// handlers. Once a buffer reaches capacity the oldest point is evicted for
/// each new append, so a buffer holds at most one trading session of
/// 1-second samples at the default capacity.
pub struct QuoteCache {
    buffers: DashMap<String, VecDeque<QuotePoint>>,
    capacity: usize,
    total_appended: AtomicU64,
    total_evicted: AtomicU64,
}

impl QuoteCache {
    /// Create a cache with the given per-symbol capacity (floored at 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: DashMap::new(),
            capacity: capacity.max(1),
            total_appended: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        }
    }

    /// Create a cache sized from the environment, or one 6.5-hour session
    /// of 1-second samples by default
    pub fn with_env_config() -> Self {
        let capacity = std::env::var("SYMBOL_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(23_400);

        tracing::info!("📦 Quote cache initialized: capacity={}", capacity);
        Self::new(capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one point to its symbol buffer, evicting the oldest at capacity
    pub fn append(&self, symbol: &str, point: QuotePoint) {
        let mut buffer = self
            .buffers
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(1024)));

        if buffer.len() >= self.capacity {
            buffer.pop_front();
            self.total_evicted.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(point);
        self.total_appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Bulk-insert historical points, oldest first, under one buffer lock
    pub fn seed(&self, symbol: &str, points: Vec<QuotePoint>) {
        let count = points.len();
        let mut buffer = self
            .buffers
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(1024)));

        for point in points {
            if buffer.len() >= self.capacity {
                buffer.pop_front();
                self.total_evicted.fetch_add(1, Ordering::Relaxed);
            }
            buffer.push_back(point);
            self.total_appended.fetch_add(1, Ordering::Relaxed);
        }
        drop(buffer);

        tracing::debug!("📥 Seeded {} historical points for {}", count, symbol);
    }

    /// Most recent point for a symbol
    pub fn latest(&self, symbol: &str) -> Option<QuotePoint> {
        self.buffers
            .get(symbol)
            .and_then(|buffer| buffer.back().cloned())
    }

    /// Every cached point for a symbol, oldest first
    pub fn all(&self, symbol: &str) -> Vec<QuotePoint> {
        self.buffers
            .get(symbol)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Points with `start <= timestamp <= end`, oldest first
    pub fn range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<QuotePoint> {
        self.buffers
            .get(symbol)
            .map(|buffer| {
                buffer
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Latest point per symbol, for the stocks snapshot endpoint
    pub fn snapshot_all(&self) -> HashMap<String, QuotePoint> {
        self.buffers
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .back()
                    .cloned()
                    .map(|point| (entry.key().clone(), point))
            })
            .collect()
    }

    /// Current cache statistics
    pub fn stats(&self) -> QuoteCacheStats {
        let per_symbol: HashMap<String, usize> = self
            .buffers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();

        QuoteCacheStats {
            symbols: per_symbol.len(),
            capacity: self.capacity,
            total_points: per_symbol.values().sum(),
            total_appended: self.total_appended.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            per_symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn point_at(symbol: &str, timestamp: DateTime<Utc>, price: rust_decimal::Decimal) -> QuotePoint {
        QuotePoint {
            symbol: symbol.to_string(),
            timestamp,
            price,
            change: dec!(0),
            change_percent: dec!(0),
            volume: 1000,
            day_high: price,
            day_low: price,
            bid: price - dec!(0.01),
            ask: price + dec!(0.01),
            market_cap: None,
            currency: "USD".to_string(),
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_cache_creation() {
        let cache = QuoteCache::new(100);
        let stats = cache.stats();

        assert_eq!(stats.symbols, 0);
        assert_eq!(stats.capacity, 100);
        assert_eq!(stats.total_appended, 0);
    }

    #[test]
    fn test_fifo_eviction_preserves_order() {
        let cache = QuoteCache::new(3);
        for i in 0..5 {
            cache.append("AAPL", point_at("AAPL", ts(i), dec!(100) + rust_decimal::Decimal::from(i)));
        }

        let all = cache.all("AAPL");
        assert_eq!(all.len(), 3);
        // the two oldest were evicted first
        assert_eq!(all[0].price, dec!(102));
        assert_eq!(all[2].price, dec!(104));

        let stats = cache.stats();
        assert_eq!(stats.total_appended, 5);
        assert_eq!(stats.total_evicted, 2);
    }

    #[test]
    fn test_buffers_are_per_symbol() {
        let cache = QuoteCache::new(10);
        cache.append("AAPL", point_at("AAPL", ts(0), dec!(187)));
        cache.append("MSFT", point_at("MSFT", ts(1), dec!(412)));

        assert_eq!(cache.all("AAPL").len(), 1);
        assert_eq!(cache.all("MSFT").len(), 1);
        assert!(cache.all("TSLA").is_empty());
        assert_eq!(cache.latest("MSFT").unwrap().price, dec!(412));
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let cache = QuoteCache::new(10);
        for i in 0..5 {
            cache.append("AAPL", point_at("AAPL", ts(i), dec!(100)));
        }

        let hits = cache.range("AAPL", ts(1), ts(3));
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].timestamp, ts(1));
        assert_eq!(hits[2].timestamp, ts(3));

        assert!(cache.range("AAPL", ts(10), ts(20)).is_empty());
        assert!(cache.range("NOPE", ts(0), ts(4)).is_empty());
    }

    #[test]
    fn test_seed_respects_capacity() {
        let cache = QuoteCache::new(3);
        let points = (0..10)
            .map(|i| point_at("AAPL", ts(i), dec!(100) + rust_decimal::Decimal::from(i)))
            .collect();
        cache.seed("AAPL", points);

        let all = cache.all("AAPL");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].price, dec!(107));
        assert_eq!(all[2].price, dec!(109));
    }

    #[test]
    fn test_snapshot_all_returns_latest() {
        let cache = QuoteCache::new(10);
        cache.append("AAPL", point_at("AAPL", ts(0), dec!(100)));
        cache.append("AAPL", point_at("AAPL", ts(1), dec!(101)));
        cache.append("MSFT", point_at("MSFT", ts(0), dec!(412)));

        let snapshot = cache.snapshot_all();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["AAPL"].price, dec!(101));
        assert_eq!(snapshot["MSFT"].price, dec!(412));
    }
}
