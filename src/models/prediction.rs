use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One supporting datum cited by a forecast
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    /// Free-text description of the signal (e.g. "Q2 revenue beat estimates by 4%")
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_link: Option<String>,
}

/// The latest AI-generated forecast for a symbol
///
/// At most one authoritative record exists per symbol; the repository upserts
/// by symbol key. Numeric fields are Option so a degraded record (the model
/// replied with unparseable text) can be stored with nulls instead of being
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "187.43")]
    pub current_price: Option<Decimal>,
    pub recent_change_percent: Option<f64>,
    /// Predicted percent move over the forecast horizon
    pub predicted_pct: Option<f64>,
    /// Model self-reported confidence in [0, 1]
    pub confidence: Option<f64>,
    /// Narrative justification; for degraded records, the raw model reply
    pub rationale: String,
    pub evidence: Vec<EvidenceItem>,
    /// Identifier of the completion model that produced this record
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Time elapsed since generation
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.generated_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, freshness: Duration) -> bool {
        self.age(now) < freshness
    }

    /// True when the AI reply could not be parsed and only the raw text survives
    pub fn is_degraded(&self) -> bool {
        self.predicted_pct.is_none() && self.confidence.is_none()
    }
}

/// PredictionRecord plus provenance flags for API consumers
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub record: PredictionRecord,
    /// False only when this request generated the record synchronously
    pub from_cache: bool,
    pub is_fresh: bool,
    pub is_stale: bool,
}

impl PredictionResponse {
    pub fn fresh(record: PredictionRecord, from_cache: bool) -> Self {
        Self {
            record,
            from_cache,
            is_fresh: true,
            is_stale: false,
        }
    }

    pub fn stale(record: PredictionRecord) -> Self {
        Self {
            record,
            from_cache: true,
            is_fresh: false,
            is_stale: true,
        }
    }
}
