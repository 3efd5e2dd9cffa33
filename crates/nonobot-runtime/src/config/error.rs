//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a [`NonobotConfig`](super::NonobotConfig).
///
/// Validation errors name the offending key in dotted form, e.g.
/// `realtime.token`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("configuration file {} does not exist", path.display())]
    FileNotFound { path: PathBuf },

    /// The file extension has no enabled format feature.
    #[error("no enabled configuration format for {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// A source could not be read or did not fit the schema.
    #[error("failed to load configuration: {0}")]
    Extract(#[source] Box<figment::Error>),

    /// A key holds an unusable value.
    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    /// A key that must be set is empty.
    #[error("{field} must be set")]
    Missing { field: &'static str },

    /// A key holds a URL the runtime cannot use.
    #[error("{field}: invalid URL {url:?} ({reason})")]
    InvalidUrl {
        field: &'static str,
        url: String,
        reason: String,
    },
}

impl ConfigError {
    /// Creates an [`Invalid`](Self::Invalid) error for `field`.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Creates a [`Missing`](Self::Missing) error for `field`.
    pub fn missing(field: &'static str) -> Self {
        Self::Missing { field }
    }

    /// Creates an [`InvalidUrl`](Self::InvalidUrl) error for `field`.
    pub fn invalid_url(
        field: &'static str,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidUrl {
            field,
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// The dotted key this error is about, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Invalid { field, .. } | Self::Missing { field } | Self::InvalidUrl { field, .. } => {
                Some(*field)
            }
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
