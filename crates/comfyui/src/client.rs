//! Per-run WebSocket connection to the engine's event channel.
//!
//! Unlike a long-lived bridge, each workflow run opens its own
//! connection scoped to one client id, consumes events until the run
//! terminates, and closes the stream. The connection must be closed on
//! every exit path, including when the run is abandoned early.

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::messages::{parse_message, EngineMessage};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for one engine instance.
pub struct EngineClient {
    ws_url: String,
}

/// A live event-stream connection for one run.
pub struct EngineConnection {
    /// Client id sent during the handshake; the engine scopes its
    /// per-client messages to it.
    pub client_id: String,
    stream: WsStream,
}

/// Errors from the event-stream layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineStreamError {
    /// The WebSocket handshake failed.
    #[error("failed to connect to engine event stream: {0}")]
    Connect(String),

    /// The connection dropped or errored mid-run.
    #[error("engine event stream error: {0}")]
    Transport(String),
}

impl EngineClient {
    /// * `ws_url` - WebSocket base, e.g. `ws://127.0.0.1:8188`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    /// Open the event channel for one run.
    ///
    /// The `client_id` is appended as a query parameter so the engine
    /// addresses execution messages for this run's prompt back to us.
    pub async fn connect(&self, client_id: &str) -> Result<EngineConnection, EngineStreamError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (stream, _response) = connect_async(&url)
            .await
            .map_err(|e| EngineStreamError::Connect(format!("{} ({e})", self.ws_url)))?;

        tracing::debug!(client_id, ws_url = %self.ws_url, "Engine event stream connected");

        Ok(EngineConnection {
            client_id: client_id.to_string(),
            stream,
        })
    }
}

impl EngineConnection {
    /// Wait for the next engine message.
    ///
    /// Returns `Ok(None)` when the engine closes the stream cleanly.
    /// Frames that fail to parse (unknown message kinds, binary preview
    /// images) are logged and skipped rather than surfaced as errors.
    pub async fn next_message(&mut self) -> Result<Option<EngineMessage>, EngineStreamError> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match parse_message(&text) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping unrecognized engine frame");
                    }
                },
                Ok(Message::Binary(_)) => {
                    // Preview image frames; not part of the progress signal.
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    tracing::debug!(client_id = %self.client_id, ?frame, "Engine closed event stream");
                    return Ok(None);
                }
                Err(e) => {
                    return Err(EngineStreamError::Transport(e.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Close the underlying stream.
    ///
    /// Best-effort: a send failure here only means the peer is already
    /// gone.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "Event stream close failed");
        }
    }
}
