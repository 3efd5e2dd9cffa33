//! Unified error types for the nonobot core.
//!
//! Router-level errors (like `RouterError`) are defined in nonobot-framework.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Bus Errors
// =============================================================================

/// Errors raised by the [`EventBus`](crate::EventBus).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// A point-to-point send found no consumer for the address.
    #[error("no handlers registered for address '{address}'")]
    NoHandlers {
        /// The target address.
        address: String,
    },

    /// A request got no reply before its deadline.
    #[error("timed out after {timeout:?} waiting for a reply on '{address}'")]
    Timeout {
        /// The target address.
        address: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The consumer discarded a delivery without replying.
    #[error("reply dropped by consumer of '{address}'")]
    ReplyDropped {
        /// The target address.
        address: String,
    },

    /// The bus has been closed.
    #[error("event bus is closed")]
    Closed,
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Frame send failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// Transport not available.
    #[error("transport '{transport}' not available")]
    NotAvailable {
        /// The transport type that's not available.
        transport: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors that can occur while an adapter connects to or talks with a backend.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// `connect` was called while a connection is in progress or live.
    #[error("adapter is already connected")]
    AlreadyConnected,

    /// The adapter has been closed, or a close raced the handshake.
    #[error("adapter is closed")]
    Closed,

    /// The handshake or upgrade failed.
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The discovery endpoint answered with a non-200 status.
    #[error("session discovery rejected with HTTP status {status}")]
    DiscoveryRejected {
        /// The HTTP status code.
        status: u16,
    },

    /// The discovery payload is missing expected fields.
    #[error("malformed discovery payload: {reason}")]
    MalformedPayload {
        /// Reason for failure.
        reason: String,
    },

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AdapterError {
    /// Creates a connection failure.
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Creates a malformed payload error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Client Errors
// =============================================================================

/// Errors surfaced by a [`BotClient`](crate::BotClient).
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The router did not answer before the receive deadline.
    #[error("no reply within {timeout:?}")]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The client has been closed.
    #[error("bot client is closed")]
    Closed,

    /// The processing pipeline could not be brought up.
    #[error("bot pipeline unavailable: {0}")]
    Unavailable(String),

    /// Bus error.
    #[error(transparent)]
    Bus(#[from] BusError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result type for bot client operations.
pub type ClientResult<T> = Result<T, ClientError>;
