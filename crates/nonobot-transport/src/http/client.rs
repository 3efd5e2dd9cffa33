//! HTTP client capability implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, trace};

use nonobot_core::{HttpClientCapability, HttpResponse, TransportError, TransportResult};

/// HTTP client capability implementation.
#[derive(Debug, Clone)]
pub struct HttpClientCapabilityImpl {
    client: Client,
}

impl HttpClientCapabilityImpl {
    /// Creates a new HTTP client capability with a 30 second timeout.
    pub fn new() -> TransportResult<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Creates with custom timeout.
    pub fn with_timeout(timeout: Duration) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientCapability for HttpClientCapabilityImpl {
    async fn get(&self, url: &str, bearer: Option<&str>) -> TransportResult<HttpResponse> {
        debug!(url = %redact(url), "HTTP GET");

        let mut req = self.client.get(url);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| TransportError::ConnectionFailed {
            url: redact(url),
            reason: e.to_string(),
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        trace!(status, len = body.len(), "HTTP response received");
        Ok(HttpResponse::new(status, body))
    }
}

/// Strips the query string, which may carry credentials.
fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?…"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact() {
        assert_eq!(redact("https://h/session/start?token=s3cret"), "https://h/session/start?…");
        assert_eq!(redact("https://h/x"), "https://h/x");
    }
}
