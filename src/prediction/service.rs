use crate::database::PredictionRepository;
use crate::models::PredictionResponse;
use crate::prediction::{PredictionError, PredictionGenerator, RefreshQueue};
use chrono::Utc;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Prediction cache configuration
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Age under which a stored record is served as fresh
    pub freshness: chrono::Duration,
    /// Base unit of the refresh stagger; a request with stagger index N
    /// schedules its regeneration N steps out
    pub stagger_step: Duration,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            freshness: chrono::Duration::hours(6),
            stagger_step: Duration::from_secs(10 * 60),
        }
    }
}

impl PredictionConfig {
    /// Build from environment variables, falling back to defaults
    ///
    /// Reads PREDICTION_FRESHNESS_HOURS and PREDICTION_STAGGER_MINUTES.
    pub fn with_env_config() -> Self {
        let mut config = Self::default();

        if let Some(hours) = env::var("PREDICTION_FRESHNESS_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            config.freshness = chrono::Duration::hours(hours);
        }

        if let Some(minutes) = env::var("PREDICTION_STAGGER_MINUTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.stagger_step = Duration::from_secs(minutes * 60);
        }

        info!(
            "⚙️ Prediction config: freshness={}h, stagger_step={:?}",
            config.freshness.num_hours(),
            config.stagger_step
        );
        config
    }
}

/// Freshness-checked cache in front of the prediction store
///
/// Serves stored records while they are younger than the freshness window.
/// Stale records are returned immediately (stale-while-revalidate) with a
/// background regeneration queued at a staggered delay; only a symbol with
/// no record at all generates synchronously.
pub struct PredictionService {
    store: Arc<dyn PredictionRepository>,
    generator: Arc<PredictionGenerator>,
    refresh: Arc<RefreshQueue>,
    config: PredictionConfig,
}

impl PredictionService {
    pub fn new(
        generator: Arc<PredictionGenerator>,
        store: Arc<dyn PredictionRepository>,
        config: PredictionConfig,
    ) -> Self {
        let worker_generator = generator.clone();
        let refresh = RefreshQueue::new(move |symbol: String| {
            let generator = worker_generator.clone();
            async move {
                match generator.generate(&symbol).await {
                    Ok(_) => info!("🔄 Background refresh completed for {}", symbol),
                    Err(e) => warn!(
                        "⚠️ Background refresh failed for {}: {} - stale record kept",
                        symbol, e
                    ),
                }
            }
        });

        Self {
            store,
            generator,
            refresh,
            config,
        }
    }

    /// Serve the prediction for `symbol`
    ///
    /// `stagger_index` spreads regenerations of many symbols going stale
    /// together (a client iterating its watchlist passes the position).
    pub async fn get_or_refresh(
        &self,
        symbol: &str,
        stagger_index: u32,
    ) -> Result<PredictionResponse, PredictionError> {
        let symbol = symbol.to_uppercase();

        match self.store.find_latest(&symbol)? {
            None => {
                info!("No stored prediction for {}; generating synchronously", symbol);
                let record = self.generator.generate(&symbol).await?;
                Ok(PredictionResponse::fresh(record, false))
            }
            Some(record) if record.is_fresh(Utc::now(), self.config.freshness) => {
                Ok(PredictionResponse::fresh(record, true))
            }
            Some(record) => {
                let delay = self.config.stagger_step.saturating_mul(stagger_index);
                if self.refresh.schedule(&symbol, delay) {
                    info!(
                        "⏳ Stale prediction for {}; refresh scheduled in {:?}",
                        symbol, delay
                    );
                }
                Ok(PredictionResponse::stale(record))
            }
        }
    }

    /// Symbols with a background refresh pending or running
    pub fn pending_refreshes(&self) -> usize {
        self.refresh.pending_count()
    }
}
