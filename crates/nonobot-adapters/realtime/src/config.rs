//! Configuration types for the realtime adapter.
//!
//! # Example Configuration
//!
//! ```toml
//! [realtime]
//! base_url = "https://chat.example.com"
//! token = "xoxb-…"
//! discovery_path = "/session/start"
//! heartbeat_interval_ms = 4000
//! pending_frames = 1024
//! ```

use std::time::Duration;

use nonobot_core::{AdapterError, AdapterResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Realtime adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeOptions {
    /// Backend base URL; `https` makes the push connection secure.
    pub base_url: String,

    /// Bearer token, also passed as the `token` query parameter.
    pub token: String,

    /// Path of the session-start endpoint.
    #[serde(default = "default_discovery_path")]
    pub discovery_path: String,

    /// Interval between heartbeat ticks.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Maximum frames held back while the bot pipeline starts.
    #[serde(default = "default_pending_frames")]
    pub pending_frames: usize,

    /// Upper bound on opening the push connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long a command may wait for the bot's answer.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

fn default_discovery_path() -> String {
    "/session/start".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    4000
}

fn default_pending_frames() -> usize {
    1024
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_reply_timeout_ms() -> u64 {
    30_000
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl RealtimeOptions {
    /// Creates options with defaults for everything but the backend and token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            discovery_path: default_discovery_path(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            pending_frames: default_pending_frames(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
        }
    }

    /// Sets the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = saturating_millis(interval);
        self
    }

    /// Sets the pending frame capacity.
    pub fn with_pending_frames(mut self, capacity: usize) -> Self {
        self.pending_frames = capacity;
        self
    }

    /// Sets how long a command may wait for the bot's answer.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Sets how long the discovery and upgrade phases may take together.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Sets the discovery path.
    pub fn with_discovery_path(mut self, path: impl Into<String>) -> Self {
        self.discovery_path = path.into();
        self
    }

    /// Heartbeat interval as a duration.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Reply timeout as a duration.
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// The authenticated session-start URL.
    pub fn discovery_url(&self) -> AdapterResult<Url> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| AdapterError::connection(format!("invalid base URL: {e}")))?;
        let mut url = base
            .join(&self.discovery_path)
            .map_err(|e| AdapterError::connection(format!("invalid discovery path: {e}")))?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

/// Derives the push-connection address from the URL returned by discovery.
///
/// Only host, port and path are kept. A missing port defaults to 443 when
/// the handshake was secure and 80 otherwise, and the scheme follows the
/// handshake.
pub fn push_endpoint(discovered: &str, secure: bool) -> AdapterResult<String> {
    let url = Url::parse(discovered)
        .map_err(|e| AdapterError::malformed(format!("invalid push URL '{discovered}': {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| AdapterError::malformed(format!("push URL '{discovered}' has no host")))?;

    let (scheme, default_port) = if secure { ("wss", 443) } else { ("ws", 80) };
    let port = url.port().unwrap_or(default_port);

    Ok(format!("{scheme}://{host}:{port}{}", url.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_yaml() {
        let yaml = r#"
base_url: https://chat.example.com
token: secret
"#;
        let options: RealtimeOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options, RealtimeOptions::new("https://chat.example.com", "secret"));
        assert_eq!(options.heartbeat_interval(), Duration::from_millis(4000));
        assert_eq!(options.pending_frames, 1024);
    }

    #[test]
    fn test_duration_setters_saturate() {
        let options = RealtimeOptions::new("https://chat.example.com", "t")
            .with_heartbeat_interval(Duration::MAX)
            .with_connect_timeout(Duration::MAX)
            .with_reply_timeout(Duration::from_millis(1500));
        assert_eq!(options.heartbeat_interval_ms, u64::MAX);
        assert_eq!(options.connect_timeout_ms, u64::MAX);
        assert_eq!(options.reply_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_discovery_url() {
        let options = RealtimeOptions::new("https://chat.example.com/", "a b");
        assert_eq!(
            options.discovery_url().unwrap().as_str(),
            "https://chat.example.com/session/start?token=a+b"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let options = RealtimeOptions::new("not a url", "t");
        assert!(matches!(
            options.discovery_url(),
            Err(AdapterError::ConnectionFailed { .. })
        ));
    }

    #[test]
    fn test_push_endpoint_ports() {
        assert_eq!(
            push_endpoint("wss://push.example.com/websocket/abc?x=1", true).unwrap(),
            "wss://push.example.com:443/websocket/abc"
        );
        assert_eq!(
            push_endpoint("ws://push.example.com/ws", false).unwrap(),
            "ws://push.example.com:80/ws"
        );
        assert_eq!(
            push_endpoint("wss://push.example.com:8443/ws", true).unwrap(),
            "wss://push.example.com:8443/ws"
        );
    }

    #[test]
    fn test_push_endpoint_malformed() {
        assert!(matches!(
            push_endpoint("nonsense", true),
            Err(AdapterError::MalformedPayload { .. })
        ));
    }
}
