use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::ListenerConfig;
use crate::metrics::{LISTENER_CONNECTED, LISTENER_MESSAGES_TOTAL, LISTENER_RECONNECTS_TOTAL};
use crate::notification::{Admission, NotificationStore};

use super::backoff::ReconnectPolicy;
use super::message::InboundMessage;

/// Default delay used when nothing else is configured
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Characters of a rejected payload kept in logs
const LOG_PAYLOAD_PREVIEW_CHARS: usize = 256;

/// Errors that end a single connection
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Why a connection ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    Shutdown,
    Remote,
}

/// WebSocket client that forwards pushed notifications into the store
pub struct NotificationListener {
    url: String,
    store: Arc<NotificationStore>,
    policy: ReconnectPolicy,
    shutdown: broadcast::Sender<()>,
}

impl NotificationListener {
    /// Create a listener from settings
    pub fn new(config: &ListenerConfig, store: Arc<NotificationStore>) -> Self {
        Self::with_policy(config.url.clone(), store, ReconnectPolicy::from_config(config))
    }

    pub fn with_policy(
        url: impl Into<String>,
        store: Arc<NotificationStore>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            url: url.into(),
            store,
            policy,
            shutdown,
        }
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Connect and keep reconnecting until shutdown is signalled
    #[tracing::instrument(name = "listener.run", skip(self), fields(url = %self.url))]
    pub async fn run(mut self) {
        let mut shutdown_rx = self.shutdown.subscribe();

        tracing::info!("Starting notification listener");

        loop {
            match self.run_connection(&mut shutdown_rx).await {
                Ok(Disconnect::Shutdown) => {
                    tracing::info!("Notification listener stopped");
                    break;
                }
                Ok(Disconnect::Remote) => {
                    tracing::warn!("WebSocket closed by server");
                }
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket connection error");
                }
            }

            LISTENER_CONNECTED.set(0);

            let delay = self.policy.next_delay();
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = self.policy.attempt(),
                "Reconnecting notification listener"
            );

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown during reconnect wait");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    LISTENER_RECONNECTS_TOTAL.inc();
                }
            }
        }

        LISTENER_CONNECTED.set(0);
    }

    async fn run_connection(
        &mut self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<Disconnect, ListenerError> {
        let (mut stream, _) = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(Disconnect::Shutdown),
            connected = connect_async(self.url.as_str()) => connected?,
        };

        self.policy.reset();
        LISTENER_CONNECTED.set(1);
        tracing::info!("Notification listener connected");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = stream.close(None).await;
                    return Ok(Disconnect::Shutdown);
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            // Admission writes through to storage
                            let payload = text.as_str().to_owned();
                            if let Err(e) = self
                                .store
                                .run_blocking(move |store| forward_message(store, &payload))
                                .await
                            {
                                tracing::error!(error = %e, "Message handling task failed");
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::debug!(frame = ?frame, "Received close frame");
                            return Ok(Disconnect::Remote);
                        }
                        Some(Ok(_)) => {
                            // Binary, ping and pong frames carry no notifications
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(Disconnect::Remote),
                    }
                }
            }
        }
    }

    /// Decode one text frame and forward it to the store.
    ///
    /// Malformed messages are logged and dropped; the connection stays open.
    pub fn handle_message(&self, payload: &str) -> Option<Admission> {
        forward_message(&self.store, payload)
    }
}

fn forward_message(store: &NotificationStore, payload: &str) -> Option<Admission> {
    let message = match InboundMessage::parse(payload) {
        Ok(m) => m,
        Err(e) => {
            LISTENER_MESSAGES_TOTAL.with_label_values(&["malformed"]).inc();
            tracing::warn!(
                error = %e,
                payload_len = payload.len(),
                payload_preview = %payload_preview(payload),
                "Failed to parse WebSocket message"
            );
            return None;
        }
    };

    match message {
        InboundMessage::Notification { notification } => {
            LISTENER_MESSAGES_TOTAL.with_label_values(&["notification"]).inc();
            Some(store.add_notification(notification))
        }
        InboundMessage::Other => {
            LISTENER_MESSAGES_TOTAL.with_label_values(&["ignored"]).inc();
            tracing::debug!("Ignoring non-notification message");
            None
        }
    }
}

/// Leading slice of `payload`, cut on a char boundary
fn payload_preview(payload: &str) -> &str {
    match payload.char_indices().nth(LOG_PAYLOAD_PREVIEW_CHARS) {
        Some((end, _)) => &payload[..end],
        None => payload,
    }
}

/// Spawn the listener on the runtime, returning its shutdown sender and handle
pub fn spawn_listener(
    listener: NotificationListener,
) -> (broadcast::Sender<()>, tokio::task::JoinHandle<()>) {
    let shutdown = listener.shutdown_signal();
    let handle = tokio::spawn(listener.run());
    (shutdown, handle)
}
