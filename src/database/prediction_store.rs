use crate::models::{EvidenceItem, PredictionRecord};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Prediction store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Repository interface for persisted predictions
///
/// One authoritative record per symbol; `upsert` replaces any prior forecast.
pub trait PredictionRepository: Send + Sync {
    /// Load the stored record for a symbol, if any
    fn find_latest(&self, symbol: &str) -> Result<Option<PredictionRecord>, StoreError>;

    /// Insert or replace the record for its symbol
    fn upsert(&self, record: &PredictionRecord) -> Result<(), StoreError>;
}

/// SQLite-backed prediction repository
///
/// A single connection behind a mutex is plenty for this workload: predictions
/// are written at most once per symbol per freshness window, and the mutex
/// gives upserts the per-symbol atomicity the cache logic relies on.
pub struct SqlitePredictionRepository {
    conn: Mutex<Connection>,
}

impl SqlitePredictionRepository {
    /// Open (or create) the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        Self::init_schema(&conn)?;
        tracing::info!("📦 Prediction store opened: {}", path.as_ref().display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS predictions (
                symbol TEXT PRIMARY KEY,
                current_price TEXT,
                recent_change_percent REAL,
                predicted_pct REAL,
                confidence REAL,
                rationale TEXT NOT NULL,
                evidence TEXT NOT NULL,
                model TEXT NOT NULL,
                generated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl PredictionRepository for SqlitePredictionRepository {
    fn find_latest(&self, symbol: &str) -> Result<Option<PredictionRecord>, StoreError> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT symbol, current_price, recent_change_percent, predicted_pct, confidence,
                    rationale, evidence, model, generated_at
             FROM predictions WHERE symbol = ?1",
            params![symbol],
            row_to_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        let evidence = serde_json::to_string(&record.evidence)?;
        let current_price = record.current_price.map(|p| p.to_string());

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO predictions (symbol, current_price, recent_change_percent, predicted_pct,
                                      confidence, rationale, evidence, model, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(symbol) DO UPDATE SET
                 current_price = excluded.current_price,
                 recent_change_percent = excluded.recent_change_percent,
                 predicted_pct = excluded.predicted_pct,
                 confidence = excluded.confidence,
                 rationale = excluded.rationale,
                 evidence = excluded.evidence,
                 model = excluded.model,
                 generated_at = excluded.generated_at",
            params![
                record.symbol,
                current_price,
                record.recent_change_percent,
                record.predicted_pct,
                record.confidence,
                record.rationale,
                evidence,
                record.model,
                record.generated_at.to_rfc3339(),
            ],
        )?;

        tracing::debug!("Stored prediction for {}", record.symbol);
        Ok(())
    }
}

/// Map a predictions row back into a record
///
/// Conversion failures (corrupt price text, bad timestamp, malformed evidence
/// JSON) surface as SQLite conversion errors with the offending column index.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PredictionRecord> {
    let price_text: Option<String> = row.get(1)?;
    let current_price = price_text
        .map(|text| {
            Decimal::from_str(&text).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    let evidence_json: String = row.get(6)?;
    let evidence: Vec<EvidenceItem> = serde_json::from_str(&evidence_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    let generated_at_text: String = row.get(8)?;
    let generated_at = DateTime::parse_from_rfc3339(&generated_at_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(PredictionRecord {
        symbol: row.get(0)?,
        current_price,
        recent_change_percent: row.get(2)?,
        predicted_pct: row.get(3)?,
        confidence: row.get(4)?,
        rationale: row.get(5)?,
        evidence,
        model: row.get(7)?,
        generated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_record(symbol: &str) -> PredictionRecord {
        PredictionRecord {
            symbol: symbol.to_string(),
            current_price: Some(dec!(187.45)),
            recent_change_percent: Some(1.2),
            predicted_pct: Some(2.5),
            confidence: Some(0.72),
            rationale: "Strong earnings momentum".to_string(),
            evidence: vec![EvidenceItem {
                detail: "Q3 revenue beat estimates".to_string(),
                source_link: Some("https://example.com/earnings".to_string()),
            }],
            model: "gpt-4o-mini".to_string(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_find_latest_on_empty_store() {
        let store = SqlitePredictionRepository::open_in_memory().unwrap();
        assert!(store.find_latest("AAPL").unwrap().is_none());
    }

    #[test]
    fn test_upsert_and_find_round_trip() {
        let store = SqlitePredictionRepository::open_in_memory().unwrap();
        let record = sample_record("AAPL");
        store.upsert(&record).unwrap();

        let loaded = store.find_latest("AAPL").unwrap().unwrap();
        assert_eq!(loaded.symbol, "AAPL");
        assert_eq!(loaded.current_price, Some(dec!(187.45)));
        assert_eq!(loaded.predicted_pct, Some(2.5));
        assert_eq!(loaded.confidence, Some(0.72));
        assert_eq!(loaded.rationale, "Strong earnings momentum");
        assert_eq!(loaded.evidence.len(), 1);
        assert_eq!(loaded.evidence[0].detail, "Q3 revenue beat estimates");
        assert_eq!(loaded.model, "gpt-4o-mini");
        // RFC 3339 storage keeps sub-second precision
        assert_eq!(
            loaded.generated_at.timestamp_millis(),
            record.generated_at.timestamp_millis()
        );
    }

    #[test]
    fn test_upsert_replaces_prior_record() {
        let store = SqlitePredictionRepository::open_in_memory().unwrap();
        store.upsert(&sample_record("TSLA")).unwrap();

        let mut updated = sample_record("TSLA");
        updated.predicted_pct = Some(-1.8);
        updated.rationale = "Deliveries miss".to_string();
        store.upsert(&updated).unwrap();

        let loaded = store.find_latest("TSLA").unwrap().unwrap();
        assert_eq!(loaded.predicted_pct, Some(-1.8));
        assert_eq!(loaded.rationale, "Deliveries miss");

        // still exactly one row per symbol
        let conn = store.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_degraded_record_stores_nulls() {
        let store = SqlitePredictionRepository::open_in_memory().unwrap();
        let record = PredictionRecord {
            symbol: "NVDA".to_string(),
            current_price: None,
            recent_change_percent: None,
            predicted_pct: None,
            confidence: None,
            rationale: "The model rambled about GPUs without giving numbers".to_string(),
            evidence: vec![],
            model: "gpt-4o-mini".to_string(),
            generated_at: Utc::now(),
        };
        store.upsert(&record).unwrap();

        let loaded = store.find_latest("NVDA").unwrap().unwrap();
        assert!(loaded.is_degraded());
        assert!(loaded.current_price.is_none());
        assert!(loaded.evidence.is_empty());
    }

    #[test]
    fn test_symbols_are_isolated() {
        let store = SqlitePredictionRepository::open_in_memory().unwrap();
        store.upsert(&sample_record("AAPL")).unwrap();
        store.upsert(&sample_record("MSFT")).unwrap();

        assert!(store.find_latest("AAPL").unwrap().is_some());
        assert!(store.find_latest("MSFT").unwrap().is_some());
        assert!(store.find_latest("GOOGL").unwrap().is_none());
    }

    #[test]
    fn test_open_creates_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.db");

        {
            let store = SqlitePredictionRepository::open(&path).unwrap();
            store.upsert(&sample_record("AMZN")).unwrap();
        }

        // records survive reopen
        let store = SqlitePredictionRepository::open(&path).unwrap();
        let loaded = store.find_latest("AMZN").unwrap().unwrap();
        assert_eq!(loaded.symbol, "AMZN");
    }
}
