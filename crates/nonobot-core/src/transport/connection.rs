//! Connection handling and lifecycle types.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::error::{TransportError, TransportResult};

/// Capacity of the outgoing frame queue of a connection.
pub const OUTGOING_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// Connection Handler
// =============================================================================

/// Receives the events of one push connection.
///
/// Transports call [`on_message`](Self::on_message) for every text frame in
/// arrival order, and [`on_disconnect`](Self::on_disconnect) exactly once
/// when the connection ends, whatever the cause.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Called for each text frame received.
    async fn on_message(&self, text: &str);

    /// Called when the connection is closed.
    async fn on_disconnect(&self);
}

// =============================================================================
// Handles
// =============================================================================

/// Handle to a client connection.
///
/// Writes are queued; the transport's connection task drains the queue in
/// order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Unique identifier for this connection.
    pub id: String,
    /// Sender for outgoing frames.
    message_tx: mpsc::Sender<String>,
    /// Shutdown signal sender.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Creates a new connection handle.
    pub fn new(
        id: impl Into<String>,
        message_tx: mpsc::Sender<String>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            id: id.into(),
            message_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Queues a text frame without waiting.
    ///
    /// Fails when the queue is full or the connection task has ended.
    pub fn send_text(&self, text: impl Into<String>) -> TransportResult<()> {
        self.message_tx
            .try_send(text.into())
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Serializes `value` and queues it as a text frame.
    pub fn send_json<T: Serialize>(&self, value: &T) -> TransportResult<()> {
        let text = serde_json::to_string(value)
            .map_err(|e| TransportError::SendFailed(format!("JSON serialization failed: {e}")))?;
        self.send_text(text)
    }

    /// Requests the connection to close.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether a close has been requested or the connection task has ended.
    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow() || self.message_tx.is_closed()
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for client connections.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Optional access token for authentication.
    pub access_token: Option<String>,
    /// Upper bound on connection establishment.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Sets the access token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
