pub mod quote;
pub mod prediction;

pub use quote::{QuotePoint, StockUpdate};
pub use prediction::{EvidenceItem, PredictionRecord, PredictionResponse};
