// Library Crate Root
// lib.rs

pub mod api;
pub mod database;
pub mod market_data;
pub mod metrics;
pub mod models;
pub mod prediction;
pub mod providers;
pub mod websocket;

// pub use = re-export at crate root
pub use api::{create_router, AppState};
pub use market_data::{QuoteCache, StreamScheduler, SubscriptionRegistry};
pub use models::{PredictionRecord, QuotePoint, StockUpdate};
pub use websocket::Broadcaster;
