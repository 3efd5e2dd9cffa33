//! Error types for the nonobot framework.

use nonobot_core::BusError;
use thiserror::Error;

/// Errors raised by routers and the messages they dispatch.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// A reply was already sent for this message.
    #[error("already replied")]
    AlreadyReplied,

    /// A handler pattern failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// The reply was sent but not acknowledged.
    #[error("reply was not acknowledged: {0}")]
    Ack(BusError),

    /// The router has been closed.
    #[error("router is closed")]
    Closed,

    /// The router was created outside of an async runtime.
    #[error("no async runtime available to start the router")]
    NoRuntime,

    /// Bus error.
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl RouterError {
    /// Creates an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
