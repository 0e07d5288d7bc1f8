//! WebSocket endpoint relaying execution events to browser clients.
//!
//! Each connection subscribes to the workflows topic under a unique
//! connection id. Addressed events are delivered only to connections
//! whose client identity matches; unaddressed events (queue state) go
//! to every connection.

use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use flowdeck_relay::{RelayEvent, WORKFLOWS_TOPIC};

use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "clientId")]
    client_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let identity = query
        .client_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

async fn handle_socket(socket: WebSocket, identity: String, state: AppState) {
    // Subscriptions are per connection, not per identity: two sockets
    // carrying the same clientId (browser reload) must not evict each
    // other. Identity only drives addressed_to filtering.
    let connection_id = Uuid::new_v4().to_string();
    debug!(client_id = %identity, connection_id = %connection_id, "websocket connected");

    let mut events = state.relay.subscribe(WORKFLOWS_TOPIC, &connection_id).await;
    let (mut sink, mut stream) = socket.split();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !event.addressed_to(&identity) {
                    continue;
                }
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if sink.send(Message::Text(Utf8Bytes::from(text))).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_text(&state, &identity, &mut sink, text.as_str()).await {
                            warn!(client_id = %identity, error = %e, "failed to answer client frame");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Protocol-level pings are answered by the ws layer
                    // itself; binary and pong frames carry nothing for us.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(client_id = %identity, error = %e, "websocket transport error");
                        break;
                    }
                }
            }
        }
    }

    state.relay.unsubscribe(WORKFLOWS_TOPIC, &connection_id).await;
    debug!(client_id = %identity, connection_id = %connection_id, "websocket disconnected");
}

async fn handle_text(
    state: &AppState,
    identity: &str,
    sink: &mut SplitSink<WebSocket, Message>,
    text: &str,
) -> Result<(), axum::Error> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Ok(());
    };

    if value.get("type").and_then(Value::as_str) == Some("ping") {
        let pong = json!({ "type": "pong" }).to_string();
        return sink.send(Message::Text(Utf8Bytes::from(pong))).await;
    }

    // {target, payload} frames are rebroadcast to the named topic; the
    // payload's own clientId (if any) scopes who receives it.
    if let (Some(target), Some(payload)) = (
        value.get("target").and_then(Value::as_str),
        value.get("payload"),
    ) {
        debug!(client_id = %identity, target, "Rebroadcasting client payload");
        state
            .relay
            .publish(target, RelayEvent::rebroadcast(payload.clone()))
            .await;
    }

    Ok(())
}
