//! Market data streaming module
//!
//! Everything between the upstream quote provider and the WebSocket fan-out
//! lives here: the trading calendar, the synthetic quote generator, the
//! live-or-simulated source selector, the in-memory history cache, the tick
//! scheduler, and the subscriber registry that starts and stops it.

pub mod calendar;
pub mod quote_cache;
pub mod simulator;
pub mod source;
pub mod stream;
pub mod subscription;

pub use quote_cache::{QuoteCache, QuoteCacheStats};
pub use source::QuoteSource;
pub use stream::{StreamConfig, StreamScheduler, StreamState, StreamStatus};
pub use subscription::SubscriptionRegistry;
