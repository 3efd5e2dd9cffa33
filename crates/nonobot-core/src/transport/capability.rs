//! Transport capability traits.
//!
//! Each capability is an object-safe async trait, so adapters can be handed a
//! real network implementation or an in-memory double alike:
//!
//! ```rust,ignore
//! let response = http.get(&discovery_url, Some(token)).await?;
//! let handle = ws.connect(&endpoint, handler, ClientConfig::default()).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::connection::{ClientConfig, ConnectionHandle, ConnectionHandler};
use crate::error::TransportResult;

/// A buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Outbound HTTP requests.
#[async_trait]
pub trait HttpClientCapability: Send + Sync {
    /// Issues a GET, authenticated with `bearer` when present.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn get(&self, url: &str, bearer: Option<&str>) -> TransportResult<HttpResponse>;
}

/// Outbound push connections.
#[async_trait]
pub trait WsClientCapability: Send + Sync {
    /// Opens a connection to `url`, feeding its events to `handler`.
    ///
    /// Resolves once the connection is established.
    async fn connect(
        &self,
        url: &str,
        handler: Arc<dyn ConnectionHandler>,
        config: ClientConfig,
    ) -> TransportResult<ConnectionHandle>;
}
