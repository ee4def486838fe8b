//! Market news adapter
//!
//! Implements [`NewsProvider`] against an AlphaVantage-style NEWS_SENTIMENT
//! endpoint. News is strictly supporting evidence for forecasts, so every
//! failure mode here is survivable; the generator treats an error as "no
//! recent news".

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{NewsArticle, NewsProvider, ProviderError};

const BASE_URL: &str = "https://www.alphavantage.co";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Articles per symbol; more adds prompt bulk without adding signal
const ARTICLE_LIMIT: usize = 5;

/// AlphaVantage-style news client
pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NewsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Build from environment variables, falling back to the public host
    ///
    /// Reads NEWS_API_KEY and NEWS_BASE_URL. An absent key just means the
    /// upstream replies without a feed, which callers already tolerate.
    pub fn with_env_config() -> Self {
        let api_key = std::env::var("NEWS_API_KEY").unwrap_or_default();
        let base_url = std::env::var("NEWS_BASE_URL").unwrap_or_else(|_| BASE_URL.to_string());
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewsEnvelope {
    #[serde(default)]
    feed: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    title: Option<String>,
    summary: Option<String>,
    url: Option<String>,
    overall_sentiment_label: Option<String>,
}

#[async_trait]
impl NewsProvider for NewsClient {
    async fn recent_news(&self, symbol: &str) -> Result<Vec<NewsArticle>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Auth("NEWS_API_KEY not set".to_string()));
        }

        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[
                ("function", "NEWS_SENTIMENT"),
                ("tickers", symbol),
                ("limit", "10"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                code: response.status().as_u16(),
            });
        }

        let envelope: NewsEnvelope = response.json().await?;
        Ok(map_feed(envelope))
    }
}

fn map_feed(envelope: NewsEnvelope) -> Vec<NewsArticle> {
    envelope
        .feed
        .into_iter()
        .filter_map(|item| {
            // an entry without a headline carries nothing usable
            let title = item.title?;
            Some(NewsArticle {
                title,
                summary: item.summary,
                sentiment: item.overall_sentiment_label,
                url: item.url,
            })
        })
        .take(ARTICLE_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_feed_drops_titleless_entries() {
        let body = r#"{
            "feed": [
                {"title": "Apple beats estimates", "summary": "Q2 revenue up", "url": "https://example.com/a", "overall_sentiment_label": "Bullish"},
                {"summary": "orphan entry"},
                {"title": "Supplier guidance cut", "overall_sentiment_label": "Bearish"}
            ]
        }"#;
        let envelope: NewsEnvelope = serde_json::from_str(body).unwrap();
        let articles = map_feed(envelope);

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Apple beats estimates");
        assert_eq!(articles[0].sentiment.as_deref(), Some("Bullish"));
        assert!(articles[1].url.is_none());
    }

    #[test]
    fn test_map_feed_tolerates_missing_feed_key() {
        let envelope: NewsEnvelope = serde_json::from_str(r#"{"items": "0"}"#).unwrap();
        assert!(map_feed(envelope).is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_any_request() {
        let client = NewsClient::new("");
        let err = client.recent_news("AAPL").await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }
}
