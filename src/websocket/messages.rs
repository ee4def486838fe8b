use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{QuotePoint, StockUpdate};

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Batched market data for one stream tick
    StockUpdate {
        timestamp: DateTime<Utc>,
        updates: HashMap<String, QuotePoint>,
    },
    /// Subscription confirmation
    Subscribed { channel: String },
    /// Unsubscription confirmation
    Unsubscribed { channel: String },
    /// Error message
    Error { message: String },
    /// Heartbeat/Ping
    Ping { timestamp: DateTime<Utc> },
    /// Pong response
    Pong { timestamp: DateTime<Utc> },
}

impl From<StockUpdate> for WsMessage {
    fn from(update: StockUpdate) -> Self {
        WsMessage::StockUpdate {
            timestamp: update.timestamp,
            updates: update.updates,
        }
    }
}

/// Client subscription request
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}
