//! Push channel transport — connection management and message fan-out.
//!
//! DESIGN
//! ======
//! The push connection is process-wide: one listener task owns the socket
//! and fans parsed messages out over a broadcast channel that any number of
//! subscribers read. Reconnection is explicit policy, not ambient state:
//! exponential backoff from a base delay up to a cap, giving up after a
//! bounded number of consecutive failed attempts.
//!
//! `PushTransport`/`PushStream` are the seam: production uses
//! [`WsPushTransport`] over tokio-tungstenite, tests use scripted fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::push::PushMessage;
use crate::telemetry::task::env_parse;

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

const DEFAULT_RECONNECT_BASE_MS: u64 = 1000;
const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

const BROADCAST_CAPACITY: usize = 64;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("send failed: {0}")]
    Send(String),
}

// =============================================================================
// TRAITS
// =============================================================================

/// Factory for push-channel connections.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PushStream>, TransportError>;
}

/// One live push-channel connection.
#[async_trait]
pub trait PushStream: Send {
    /// Next text payload. `None` means the peer closed cleanly.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Send a text payload (used for the liveness ping on open).
    async fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&mut self);
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

// =============================================================================
// RECONNECT POLICY
// =============================================================================

/// Bounded exponential backoff for reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Consecutive failed attempts before the listener gives up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_delay_ms: env_parse("PUSH_RECONNECT_BASE_MS", DEFAULT_RECONNECT_BASE_MS),
            max_delay_ms: env_parse("PUSH_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS),
            max_attempts: env_parse("PUSH_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS),
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based): base doubling up
    /// to the cap.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(16));
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_RECONNECT_BASE_MS,
            max_delay_ms: DEFAULT_RECONNECT_MAX_MS,
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }
}

// =============================================================================
// LISTENER
// =============================================================================

/// Handle to the running push listener.
#[derive(Debug)]
pub struct ListenerHandle {
    msg_tx: broadcast::Sender<PushMessage>,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// New subscription to the parsed message fan-out.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.msg_tx.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch connection status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Wait for the listener to end (clean close after attempts exhausted).
    pub async fn join(self) {
        let _ = self.task.await;
    }

    /// Tear the listener down immediately.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Spawn the push listener: connect, forward parsed messages, reconnect
/// with backoff, give up after `policy.max_attempts` consecutive failures.
#[must_use]
pub fn spawn_push_listener(
    transport: Arc<dyn PushTransport>,
    policy: ReconnectPolicy,
) -> ListenerHandle {
    let (msg_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

    let task = tokio::spawn(listener_loop(transport, policy, msg_tx.clone(), status_tx));

    ListenerHandle { msg_tx, status_rx, task }
}

async fn listener_loop(
    transport: Arc<dyn PushTransport>,
    policy: ReconnectPolicy,
    msg_tx: broadcast::Sender<PushMessage>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    let mut attempts: u32 = 0;

    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting);

        match transport.connect().await {
            Ok(mut stream) => {
                attempts = 0;
                let _ = status_tx.send(ConnectionStatus::Connected);
                info!("push channel connected");

                // Liveness probe on open; failure here is not fatal.
                if let Err(error) = stream.send(r#"{"type":"ping"}"#).await {
                    warn!(%error, "liveness ping failed");
                }

                forward_messages(stream.as_mut(), &msg_tx).await;
                stream.close().await;
                info!("push channel disconnected");
            }
            Err(error) => {
                warn!(%error, attempt = attempts + 1, "push connect failed");
            }
        }

        let _ = status_tx.send(ConnectionStatus::Disconnected);

        attempts += 1;
        if attempts >= policy.max_attempts {
            warn!(attempts, "push reconnect attempts exhausted; giving up");
            return;
        }
        tokio::time::sleep(policy.delay_for(attempts - 1)).await;
    }
}

/// Forward payloads until the stream ends or errors. Malformed payloads are
/// dropped (and logged) at the parse boundary.
async fn forward_messages(stream: &mut dyn PushStream, msg_tx: &broadcast::Sender<PushMessage>) {
    while let Some(item) = stream.recv().await {
        match item {
            Ok(text) => {
                if let Some(msg) = PushMessage::parse_lossy(&text) {
                    // No subscribers is fine; completions are best-effort.
                    let _ = msg_tx.send(msg);
                }
            }
            Err(error) => {
                warn!(%error, "push receive error");
                break;
            }
        }
    }
}

// =============================================================================
// WEBSOCKET TRANSPORT
// =============================================================================

/// Production transport: a WebSocket connection to the push endpoint.
#[derive(Debug, Clone)]
pub struct WsPushTransport {
    url: String,
}

impl WsPushTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn connect(&self) -> Result<Box<dyn PushStream>, TransportError> {
        let (inner, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Box::new(WsStream { inner }))
    }
}

struct WsStream {
    inner: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl PushStream for WsStream {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Binary frames and protocol-level ping/pong are not part
                // of the push contract.
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.inner
            .send(Message::from(text.to_owned()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
