use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::messages::WsMessage;

/// Topic-keyed pub/sub bus over tokio broadcast channels
///
/// Producers publish typed [`WsMessage`]s without any reference to the
/// transport; the WebSocket gateway subscribes per topic and forwards to
/// clients. Channels are created lazily on first subscribe; publishing to
/// a topic nobody listens on is a no-op.
#[derive(Clone)]
pub struct Broadcaster {
    channels: Arc<DashMap<String, broadcast::Sender<WsMessage>>>,
    /// Buffered messages per channel before slow receivers lag
    capacity: usize,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    fn get_or_create_channel(&self, topic: &str) -> broadcast::Sender<WsMessage> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a topic, creating its channel if needed
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<WsMessage> {
        self.get_or_create_channel(topic).subscribe()
    }

    /// Publish a message to a topic; silently dropped without subscribers
    pub fn publish(&self, topic: &str, message: WsMessage) {
        if let Some(sender) = self.channels.get(topic) {
            let _ = sender.send(message);
        }
    }

    /// Live receiver count for a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels whose receivers have all disconnected
    pub fn cleanup_empty_channels(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Topic names
pub mod topics {
    /// The single market data stream topic
    pub fn stocks() -> &'static str {
        "stocks"
    }
}
