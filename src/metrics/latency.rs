use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use utoipa::ToSchema;

/// High-precision latency tracker for the stream tick pipeline
///
/// HDR histograms sized for 1ns to 10 seconds at 3 significant figures.
/// Shared between the scheduler (writes) and the API layer (reads), so each
/// histogram sits behind its own short-held mutex.
pub struct LatencyTracker {
    /// Upstream fetch / synthesis phase of a tick
    fetch_ns: Mutex<Histogram<u64>>,

    /// Bus publish phase of a tick
    broadcast_ns: Mutex<Histogram<u64>>,

    /// Whole tick, fetch through publish
    total_tick_ns: Mutex<Histogram<u64>>,
}

fn new_histogram() -> Mutex<Histogram<u64>> {
    Mutex::new(Histogram::new_with_bounds(1, 10_000_000_000, 3).expect("static histogram bounds"))
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self {
            fetch_ns: new_histogram(),
            broadcast_ns: new_histogram(),
            total_tick_ns: new_histogram(),
        }
    }

    /// Record the fetch phase duration
    #[inline]
    pub fn record_fetch(&self, start: Instant) {
        let nanos = start.elapsed().as_nanos() as u64;
        let _ = self.fetch_ns.lock().record(nanos);
    }

    /// Record the broadcast phase duration
    #[inline]
    pub fn record_broadcast(&self, start: Instant) {
        let nanos = start.elapsed().as_nanos() as u64;
        let _ = self.broadcast_ns.lock().record(nanos);
    }

    /// Record the whole-tick duration
    #[inline]
    pub fn record_total_tick(&self, start: Instant) {
        let nanos = start.elapsed().as_nanos() as u64;
        let _ = self.total_tick_ns.lock().record(nanos);
    }

    pub fn fetch_stats(&self) -> LatencyStats {
        stats_from("fetch", &self.fetch_ns.lock())
    }

    pub fn broadcast_stats(&self) -> LatencyStats {
        stats_from("broadcast", &self.broadcast_ns.lock())
    }

    pub fn total_tick_stats(&self) -> LatencyStats {
        stats_from("total_tick", &self.total_tick_ns.lock())
    }

    /// All pipeline statistics, for the latency endpoint
    pub fn all_stats(&self) -> Vec<LatencyStats> {
        vec![
            self.fetch_stats(),
            self.broadcast_stats(),
            self.total_tick_stats(),
        ]
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn stats_from(name: &str, histogram: &Histogram<u64>) -> LatencyStats {
    LatencyStats {
        metric_name: name.to_string(),
        p50_ns: histogram.value_at_percentile(50.0),
        p95_ns: histogram.value_at_percentile(95.0),
        p99_ns: histogram.value_at_percentile(99.0),
        p999_ns: histogram.value_at_percentile(99.9),
        max_ns: histogram.max(),
        min_ns: histogram.min(),
        mean_ns: histogram.mean(),
        sample_count: histogram.len(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LatencyStats {
    pub metric_name: String,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
    pub max_ns: u64,
    pub min_ns: u64,
    pub mean_ns: f64,
    pub sample_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_record_and_read_stats() {
        let tracker = LatencyTracker::new();

        let start = Instant::now();
        thread::sleep(Duration::from_micros(100));
        tracker.record_fetch(start);

        let stats = tracker.fetch_stats();
        assert_eq!(stats.metric_name, "fetch");
        assert_eq!(stats.sample_count, 1);
        assert!(stats.p50_ns > 0);
    }

    #[test]
    fn test_metrics_are_independent() {
        let tracker = LatencyTracker::new();

        for _ in 0..5 {
            tracker.record_fetch(Instant::now());
        }
        tracker.record_total_tick(Instant::now());

        assert_eq!(tracker.fetch_stats().sample_count, 5);
        assert_eq!(tracker.total_tick_stats().sample_count, 1);
        assert_eq!(tracker.broadcast_stats().sample_count, 0);
    }

    #[test]
    fn test_all_stats_covers_pipeline() {
        let tracker = LatencyTracker::new();
        let names: Vec<String> = tracker
            .all_stats()
            .into_iter()
            .map(|s| s.metric_name)
            .collect();
        assert_eq!(names, vec!["fetch", "broadcast", "total_tick"]);
    }
}
