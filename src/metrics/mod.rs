pub mod latency;

pub use latency::{LatencyStats, LatencyTracker};
