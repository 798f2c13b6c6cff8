//! Forward WebSocket event stream.
//!
//! The bot connects to the OneBot implementation, decodes every text frame into
//! an [`Event`] and forwards it over an mpsc channel. The connection is retried
//! until shutdown.

use super::event::Event;
use crate::error::{Result, TreePassError};
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EventStream {
    url: String,
    access_token: Option<String>,
    reconnect_delay: Duration,
}

enum Disconnect {
    /// Remote closed or the stream ended
    Closed,
    /// Receiver side of the event channel is gone
    ReceiverDropped,
}

impl EventStream {
    pub fn new(url: &str, access_token: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            access_token,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Run the connect/read loop in the background.
    ///
    /// The task ends when `shutdown` fires or `tx` is closed.
    pub fn spawn(self, tx: mpsc::Sender<Event>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let outcome = tokio::select! {
                    _ = shutdown.recv() => break,
                    outcome = self.run_once(&tx) => outcome,
                };

                match outcome {
                    Ok(Disconnect::ReceiverDropped) => break,
                    Ok(Disconnect::Closed) => warn!(url = %self.url, "event stream closed"),
                    Err(e) => warn!(url = %self.url, error = %e, "event stream failed"),
                }

                info!(delay_secs = self.reconnect_delay.as_secs(), "reconnecting to event stream");
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(self.reconnect_delay) => {}
                }
            }
            debug!("event stream stopped");
        })
    }

    async fn run_once(&self, tx: &mpsc::Sender<Event>) -> Result<Disconnect> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = &self.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| TreePassError::Config(format!("Invalid access token: {}", e)))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        info!(url = %self.url, "connected to event stream");

        let (_write, mut read) = ws_stream.split();
        while let Some(frame) = read.next().await {
            let text = match frame? {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => return Ok(Disconnect::Closed),
                _ => continue,
            };

            let value = match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "dropping non-JSON frame");
                    continue;
                }
            };

            if let Some(event) = Event::from_json(value) {
                if tx.send(event).await.is_err() {
                    return Ok(Disconnect::ReceiverDropped);
                }
            }
        }

        Ok(Disconnect::Closed)
    }
}
