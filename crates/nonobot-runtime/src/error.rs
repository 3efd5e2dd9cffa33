//! Runtime error types.

use nonobot_core::{AdapterError, ClientError, TransportError};
use nonobot_framework::RouterError;
use thiserror::Error;

pub use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The realtime adapter failed.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// A transport capability could not be created.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Handler registration failed.
    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    /// The bot client is unavailable.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// A shutdown signal handler could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
