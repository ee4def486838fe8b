use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::select;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use super::{
    broadcaster::{topics, Broadcaster},
    messages::{ClientMessage, WsMessage},
};
use crate::market_data::SubscriptionRegistry;

/// WebSocket connection state
pub struct WsState {
    pub broadcaster: Broadcaster,
    pub registry: Arc<SubscriptionRegistry>,
}

/// Handle WebSocket upgrade request
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
///
/// The subscription receiver doubles as the joined flag: Some while the
/// client is counted in the registry, None otherwise. The disconnect path
/// below the loop settles the count exactly once.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription: Option<broadcast::Receiver<WsMessage>> = None;

    // Heartbeat interval
    let mut heartbeat = interval(Duration::from_secs(30));

    info!("WebSocket client connected");

    loop {
        select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_client_message(
                            &text,
                            &mut subscription,
                            &mut sender,
                            &state,
                        ).await {
                            error!("Error handling client message: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket client sent close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            // Forward stream updates while subscribed
            result = next_broadcast(subscription.as_mut()) => {
                match result {
                    Ok(ws_msg) => {
                        if let Ok(json) = serde_json::to_string(&ws_msg) {
                            if sender.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Client receiver lagging; {} updates dropped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        warn!("Stream channel closed underneath a subscriber");
                        break;
                    }
                }
            }

            // Send heartbeat
            _ = heartbeat.tick() => {
                let heartbeat_msg = WsMessage::Ping {
                    timestamp: chrono::Utc::now(),
                };
                if let Ok(json) = serde_json::to_string(&heartbeat_msg) {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if subscription.is_some() {
        let remaining = state.registry.forced_leave();
        info!(
            "WebSocket client disconnected while subscribed; {} subscribers remain",
            remaining
        );
    } else {
        info!("WebSocket connection closed");
    }
}

/// Await the next bus message, or park forever when not subscribed
async fn next_broadcast(
    rx: Option<&mut broadcast::Receiver<WsMessage>>,
) -> Result<WsMessage, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Handle client messages (subscribe/unsubscribe/ping)
async fn handle_client_message(
    text: &str,
    subscription: &mut Option<broadcast::Receiver<WsMessage>>,
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    state: &Arc<WsState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            let reply = WsMessage::Error {
                message: format!("Unrecognized message: {}", e),
            };
            sender.send(Message::Text(serde_json::to_string(&reply)?)).await?;
            return Ok(());
        }
    };

    match client_msg {
        ClientMessage::Subscribe { channel } => {
            if channel != topics::stocks() {
                send_unknown_channel(sender, &channel).await?;
                return Ok(());
            }

            // one registry slot per client, no matter how often it subscribes
            if subscription.is_none() {
                *subscription = Some(state.broadcaster.subscribe(topics::stocks()));
                let active = state.registry.join();
                info!("📡 Client subscribed to {}; {} active", channel, active);
            }

            let response = WsMessage::Subscribed { channel };
            sender.send(Message::Text(serde_json::to_string(&response)?)).await?;
        }
        ClientMessage::Unsubscribe { channel } => {
            if channel != topics::stocks() {
                send_unknown_channel(sender, &channel).await?;
                return Ok(());
            }

            if subscription.take().is_some() {
                let active = state.registry.leave();
                info!("Client unsubscribed from {}; {} active", channel, active);
            }

            let response = WsMessage::Unsubscribed { channel };
            sender.send(Message::Text(serde_json::to_string(&response)?)).await?;
        }
        ClientMessage::Ping => {
            let response = WsMessage::Pong {
                timestamp: chrono::Utc::now(),
            };
            sender.send(Message::Text(serde_json::to_string(&response)?)).await?;
        }
    }

    Ok(())
}

async fn send_unknown_channel(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    channel: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let reply = WsMessage::Error {
        message: format!("Unknown channel: {}", channel),
    };
    sender.send(Message::Text(serde_json::to_string(&reply)?)).await?;
    Ok(())
}
