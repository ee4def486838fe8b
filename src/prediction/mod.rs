//! AI prediction module
//!
//! Forecast generation (prompt assembly, completion call, tolerant JSON
//! extraction), the freshness-checked cache in front of the store, and the
//! staggered background refresh queue.

pub mod generator;
pub mod refresh;
pub mod service;

pub use generator::PredictionGenerator;
pub use refresh::RefreshQueue;
pub use service::{PredictionConfig, PredictionService};

use crate::database::StoreError;
use crate::providers::ProviderError;
use thiserror::Error;

/// Errors surfaced by the synchronous prediction path
///
/// Background refreshes absorb these (logged, stale record kept); only a
/// request that must generate on the spot sees them.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// An upstream provider failed while generating
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The prediction store could not be read or written
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No quote, no history and no cached record; nothing to forecast from
    #[error("No market data available to generate a prediction")]
    NoData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            PredictionError::NoData.to_string(),
            "No market data available to generate a prediction"
        );

        let err = PredictionError::Provider(ProviderError::Status { code: 429 });
        assert_eq!(err.to_string(), "Provider error: Upstream returned status 429");
    }
}
