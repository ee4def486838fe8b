//! Persistence module
//!
//! Embedded SQLite store for AI predictions. The repository trait keeps the
//! prediction service decoupled from the concrete storage engine.

pub mod prediction_store;

pub use prediction_store::{PredictionRepository, SqlitePredictionRepository, StoreError};
