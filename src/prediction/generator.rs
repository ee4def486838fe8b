//! Forecast generation
//!
//! Gathers the model's inputs (current quote, 30-day history, recent news),
//! each best-effort, builds one structured prompt, and turns the free-form
//! completion reply into a PredictionRecord. Replies that carry no parseable
//! JSON become degraded records (null numerics, raw text as rationale)
//! instead of discarded attempts.

use crate::database::PredictionRepository;
use crate::models::{EvidenceItem, PredictionRecord};
use crate::prediction::PredictionError;
use crate::providers::{
    CompletionProvider, DailyCandle, NewsArticle, NewsProvider, ProviderQuote, QuoteProvider,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Days of daily candles summarized into the prompt
const HISTORY_DAYS: u32 = 30;

pub struct PredictionGenerator {
    quotes: Arc<dyn QuoteProvider>,
    completions: Arc<dyn CompletionProvider>,
    news: Arc<dyn NewsProvider>,
    store: Arc<dyn PredictionRepository>,
}

impl PredictionGenerator {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        completions: Arc<dyn CompletionProvider>,
        news: Arc<dyn NewsProvider>,
        store: Arc<dyn PredictionRepository>,
    ) -> Self {
        Self {
            quotes,
            completions,
            news,
            store,
        }
    }

    /// Generate a forecast for `symbol` and persist it
    ///
    /// Quote, history and news are each optional inputs; only when quote AND
    /// history are both unavailable is generation refused (`NoData`), since
    /// the model would have nothing real to reason over.
    pub async fn generate(&self, symbol: &str) -> Result<PredictionRecord, PredictionError> {
        let quote = match self.quotes.quote(symbol).await {
            Ok(q) => Some(q),
            Err(e) => {
                warn!("⚠️ Quote unavailable for {} prediction: {}", symbol, e);
                None
            }
        };

        let history = match self.quotes.historical(symbol, HISTORY_DAYS).await {
            Ok(candles) if !candles.is_empty() => Some(candles),
            Ok(_) => None,
            Err(e) => {
                warn!("⚠️ History unavailable for {} prediction: {}", symbol, e);
                None
            }
        };

        if quote.is_none() && history.is_none() {
            return Err(PredictionError::NoData);
        }

        let news = match self.news.recent_news(symbol).await {
            Ok(articles) => articles,
            Err(e) => {
                debug!("News unavailable for {}: {}", symbol, e);
                Vec::new()
            }
        };

        let prompt = build_prompt(symbol, quote.as_ref(), history.as_deref(), &news);
        let reply = self.completions.complete(&prompt).await?;

        let record = self.build_record(symbol, quote.as_ref(), history.as_deref(), &reply);
        self.store.upsert(&record)?;

        debug!(
            "Prediction generated for {}: predicted_pct={:?} confidence={:?}",
            symbol, record.predicted_pct, record.confidence
        );
        Ok(record)
    }

    fn build_record(
        &self,
        symbol: &str,
        quote: Option<&ProviderQuote>,
        history: Option<&[DailyCandle]>,
        reply: &str,
    ) -> PredictionRecord {
        // provider-sourced context survives even when the AI reply does not parse
        let current_price = quote
            .map(|q| q.price)
            .or_else(|| history.and_then(|candles| candles.last()).map(|c| c.close));
        let recent_change_percent =
            window_change_percent(history).or_else(|| quote.and_then(|q| q.change_percent.to_f64()));

        let (predicted_pct, confidence, rationale, evidence) = match extract_forecast(reply) {
            Some(forecast) => {
                let rationale = forecast
                    .rationale
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| reply.trim().to_string());
                let evidence = forecast
                    .evidence
                    .into_iter()
                    .filter_map(|e| {
                        e.detail.map(|detail| EvidenceItem {
                            detail,
                            source_link: e.source_link,
                        })
                    })
                    .collect();
                (
                    forecast.predicted_pct,
                    forecast.confidence.map(|c| c.clamp(0.0, 1.0)),
                    rationale,
                    evidence,
                )
            }
            None => {
                warn!("⚠️ Unparseable completion for {}; storing degraded record", symbol);
                (None, None, reply.trim().to_string(), Vec::new())
            }
        };

        PredictionRecord {
            symbol: symbol.to_string(),
            current_price,
            recent_change_percent,
            predicted_pct,
            confidence,
            rationale,
            evidence,
            model: self.completions.model_id().to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Reply shape we ask the model for; aliases absorb casing drift
#[derive(Debug, Deserialize)]
struct AiForecast {
    #[serde(alias = "predictedPct")]
    predicted_pct: Option<f64>,
    confidence: Option<f64>,
    rationale: Option<String>,
    #[serde(default)]
    evidence: Vec<AiEvidence>,
}

#[derive(Debug, Deserialize)]
struct AiEvidence {
    detail: Option<String>,
    #[serde(alias = "sourceLink", alias = "url")]
    source_link: Option<String>,
}

/// Pull the forecast JSON object out of a free-form reply
///
/// Replies arrive bare, wrapped in markdown code fences, or embedded in
/// prose. Slicing from the first `{` to the last `}` handles all three.
fn extract_forecast(reply: &str) -> Option<AiForecast> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

/// Percent change across the historical window, first close to last
fn window_change_percent(history: Option<&[DailyCandle]>) -> Option<f64> {
    let candles = history?;
    let first = candles.first()?.close;
    let last = candles.last()?.close;
    if first.is_zero() {
        return None;
    }
    ((last - first) / first * Decimal::ONE_HUNDRED).to_f64()
}

fn build_prompt(
    symbol: &str,
    quote: Option<&ProviderQuote>,
    history: Option<&[DailyCandle]>,
    news: &[NewsArticle],
) -> String {
    let mut prompt = format!(
        "You are an equity analyst. Forecast the price movement of {} over the next five trading days.\n\n",
        symbol
    );

    prompt.push_str("Current quote:\n");
    match quote {
        Some(q) => {
            let currency = q.currency.as_deref().unwrap_or("USD");
            prompt.push_str(&format!(
                "price {} {}, change {} ({}%), day range {} - {}, volume {}\n",
                q.price, currency, q.change, q.change_percent, q.day_low, q.day_high, q.volume
            ));
        }
        None => prompt.push_str("no data\n"),
    }

    prompt.push_str("\nDaily closes, oldest first:\n");
    match history {
        Some(candles) => {
            for candle in candles {
                prompt.push_str(&format!(
                    "{} close {} volume {}\n",
                    candle.timestamp.format("%Y-%m-%d"),
                    candle.close,
                    candle.volume
                ));
            }
        }
        None => prompt.push_str("no data\n"),
    }

    prompt.push_str("\nRecent news:\n");
    if news.is_empty() {
        prompt.push_str("no recent news\n");
    } else {
        for article in news {
            prompt.push_str(&format!(
                "- {} [{}] {}\n",
                article.title,
                article.sentiment.as_deref().unwrap_or("neutral"),
                article.summary.as_deref().unwrap_or("")
            ));
        }
    }

    prompt.push_str(
        "\nRespond with a single JSON object and nothing else:\n\
         {\n\
           \"predicted_pct\": <expected percent change, number>,\n\
           \"confidence\": <number between 0 and 1>,\n\
           \"rationale\": \"<two or three sentences>\",\n\
           \"evidence\": [{\"detail\": \"<supporting fact>\", \"source_link\": \"<url or null>\"}]\n\
         }\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqlitePredictionRepository;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeQuotes {
        fail_quote: bool,
        fail_history: bool,
    }

    #[async_trait]
    impl QuoteProvider for FakeQuotes {
        async fn quote(&self, symbol: &str) -> Result<ProviderQuote, ProviderError> {
            if self.fail_quote {
                return Err(ProviderError::Status { code: 503 });
            }
            Ok(ProviderQuote {
                symbol: symbol.to_string(),
                price: dec!(190.00),
                change: dec!(1.50),
                change_percent: dec!(0.80),
                volume: 52_000_000,
                day_high: dec!(191.20),
                day_low: dec!(188.10),
                bid: Some(dec!(189.99)),
                ask: Some(dec!(190.01)),
                market_cap: None,
                currency: Some("USD".to_string()),
            })
        }

        async fn historical(
            &self,
            _symbol: &str,
            _days: u32,
        ) -> Result<Vec<DailyCandle>, ProviderError> {
            if self.fail_history {
                return Err(ProviderError::Status { code: 503 });
            }
            let base = Utc::now() - Duration::days(3);
            Ok([dec!(180), dec!(185), dec!(189)]
                .iter()
                .enumerate()
                .map(|(i, close)| DailyCandle {
                    timestamp: base + Duration::days(i as i64),
                    open: *close - dec!(1),
                    high: *close + dec!(2),
                    low: *close - dec!(2),
                    close: *close,
                    volume: 40_000_000,
                })
                .collect())
        }
    }

    struct FakeCompletion {
        reply: String,
        calls: AtomicU64,
        last_prompt: Mutex<Option<String>>,
    }

    impl FakeCompletion {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicU64::new(0),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock() = Some(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn model_id(&self) -> &str {
            "fake-model"
        }
    }

    struct FakeNews {
        fail: bool,
    }

    #[async_trait]
    impl NewsProvider for FakeNews {
        async fn recent_news(&self, _symbol: &str) -> Result<Vec<NewsArticle>, ProviderError> {
            if self.fail {
                return Err(ProviderError::Status { code: 500 });
            }
            Ok(vec![NewsArticle {
                title: "Chip demand stays strong".to_string(),
                summary: Some("Data center orders keep growing".to_string()),
                sentiment: Some("Bullish".to_string()),
                url: None,
            }])
        }
    }

    const GOOD_REPLY: &str = r#"{"predicted_pct": 3.2, "confidence": 0.8, "rationale": "Momentum and strong demand.", "evidence": [{"detail": "Data center orders growing", "source_link": null}]}"#;

    fn generator(
        quotes: FakeQuotes,
        completion: Arc<FakeCompletion>,
        news_fail: bool,
    ) -> PredictionGenerator {
        PredictionGenerator::new(
            Arc::new(quotes),
            completion,
            Arc::new(FakeNews { fail: news_fail }),
            Arc::new(SqlitePredictionRepository::open_in_memory().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_generate_parses_structured_reply() {
        let completion = Arc::new(FakeCompletion::new(GOOD_REPLY));
        let gen = generator(
            FakeQuotes {
                fail_quote: false,
                fail_history: false,
            },
            completion.clone(),
            false,
        );

        let record = gen.generate("NVDA").await.unwrap();
        assert_eq!(record.symbol, "NVDA");
        assert_eq!(record.current_price, Some(dec!(190.00)));
        assert_eq!(record.predicted_pct, Some(3.2));
        assert_eq!(record.confidence, Some(0.8));
        assert_eq!(record.rationale, "Momentum and strong demand.");
        assert_eq!(record.evidence.len(), 1);
        assert_eq!(record.model, "fake-model");
        // 180 -> 189 over the window
        assert!((record.recent_change_percent.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);

        // persisted under the symbol key
        assert!(gen.store.find_latest("NVDA").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_generate_tolerates_fenced_reply() {
        let fenced = format!("```json\n{}\n```", GOOD_REPLY);
        let completion = Arc::new(FakeCompletion::new(&fenced));
        let gen = generator(
            FakeQuotes {
                fail_quote: false,
                fail_history: false,
            },
            completion,
            false,
        );

        let record = gen.generate("NVDA").await.unwrap();
        assert_eq!(record.predicted_pct, Some(3.2));
        assert!(!record.is_degraded());
    }

    #[tokio::test]
    async fn test_unparseable_reply_stores_degraded_record() {
        let completion = Arc::new(FakeCompletion::new("It will probably go up a lot!"));
        let gen = generator(
            FakeQuotes {
                fail_quote: false,
                fail_history: false,
            },
            completion,
            false,
        );

        let record = gen.generate("NVDA").await.unwrap();
        assert!(record.is_degraded());
        assert_eq!(record.rationale, "It will probably go up a lot!");
        assert!(record.evidence.is_empty());
        // provider context is kept on the degraded record
        assert_eq!(record.current_price, Some(dec!(190.00)));

        let stored = gen.store.find_latest("NVDA").unwrap().unwrap();
        assert!(stored.is_degraded());
    }

    #[tokio::test]
    async fn test_no_market_data_refuses_generation() {
        let completion = Arc::new(FakeCompletion::new(GOOD_REPLY));
        let gen = generator(
            FakeQuotes {
                fail_quote: true,
                fail_history: true,
            },
            completion.clone(),
            false,
        );

        let err = gen.generate("NVDA").await.unwrap_err();
        assert!(matches!(err, PredictionError::NoData));
        // never burned a completion call
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_quote_failure_alone_still_generates() {
        let completion = Arc::new(FakeCompletion::new(GOOD_REPLY));
        let gen = generator(
            FakeQuotes {
                fail_quote: true,
                fail_history: false,
            },
            completion.clone(),
            false,
        );

        let record = gen.generate("NVDA").await.unwrap();
        // falls back to the last close
        assert_eq!(record.current_price, Some(dec!(189)));

        let prompt = completion.last_prompt.lock().clone().unwrap();
        assert!(prompt.contains("no data"));
        assert!(prompt.contains("close 189"));
    }

    #[tokio::test]
    async fn test_news_failure_is_best_effort() {
        let completion = Arc::new(FakeCompletion::new(GOOD_REPLY));
        let gen = generator(
            FakeQuotes {
                fail_quote: false,
                fail_history: false,
            },
            completion.clone(),
            true,
        );

        assert!(gen.generate("NVDA").await.is_ok());
        let prompt = completion.last_prompt.lock().clone().unwrap();
        assert!(prompt.contains("no recent news"));
    }

    #[tokio::test]
    async fn test_prompt_carries_all_inputs() {
        let completion = Arc::new(FakeCompletion::new(GOOD_REPLY));
        let gen = generator(
            FakeQuotes {
                fail_quote: false,
                fail_history: false,
            },
            completion.clone(),
            false,
        );

        gen.generate("NVDA").await.unwrap();
        let prompt = completion.last_prompt.lock().clone().unwrap();
        assert!(prompt.contains("NVDA"));
        assert!(prompt.contains("price 190.00 USD"));
        assert!(prompt.contains("Chip demand stays strong"));
        assert!(prompt.contains("\"predicted_pct\""));
    }

    #[tokio::test]
    async fn test_confidence_clamped_to_unit_interval() {
        let reply = r#"{"predicted_pct": 1.0, "confidence": 1.7, "rationale": "Very sure."}"#;
        let completion = Arc::new(FakeCompletion::new(reply));
        let gen = generator(
            FakeQuotes {
                fail_quote: false,
                fail_history: false,
            },
            completion,
            false,
        );

        let record = gen.generate("NVDA").await.unwrap();
        assert_eq!(record.confidence, Some(1.0));
    }

    #[test]
    fn test_extract_forecast_variants() {
        assert!(extract_forecast(GOOD_REPLY).is_some());
        assert!(extract_forecast(&format!("```json\n{}\n```", GOOD_REPLY)).is_some());
        assert!(extract_forecast(&format!(
            "Here is my analysis:\n{}\nHope that helps!",
            GOOD_REPLY
        ))
        .is_some());
        assert!(extract_forecast("no json here at all").is_none());
        assert!(extract_forecast("} backwards {").is_none());
    }
}
