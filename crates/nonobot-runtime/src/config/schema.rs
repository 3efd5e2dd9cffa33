//! Configuration schema definitions.
//!
//! # Example
//!
//! ```toml
//! [bot]
//! name = "nono"
//! aliases = ["bb8"]
//! reply_timeout_ms = 30000
//!
//! [realtime]
//! enabled = true
//! base_url = "https://chat.example.com"
//! token = "xoxb-…"
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [logging.filters]
//! nonobot_adapter_realtime = "trace"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use nonobot_adapter_realtime::RealtimeOptions;
use nonobot_framework::{BotOptions, DEFAULT_BOT_NAME};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NonobotConfig {
    /// The bot itself.
    #[serde(default)]
    pub bot: BotConfig,

    /// Realtime backend connection.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot identity and behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Name the bot answers to; also names its router.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Additional names the bot answers to.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// How long a command may wait for an answer, in milliseconds.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Whether to install the `ping` and `help` handlers.
    #[serde(default = "default_true")]
    pub builtin_handlers: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            aliases: Vec::new(),
            reply_timeout_ms: default_reply_timeout_ms(),
            builtin_handlers: true,
        }
    }
}

impl BotConfig {
    /// Reply timeout as a duration.
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Converts to framework bot options.
    pub fn to_options(&self) -> BotOptions {
        self.aliases
            .iter()
            .fold(BotOptions::default().with_name(&self.name), |options, alias| {
                options.with_alias(alias)
            })
    }
}

fn default_bot_name() -> String {
    DEFAULT_BOT_NAME.to_string()
}

fn default_reply_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Realtime
// =============================================================================

/// Realtime backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Whether the runtime connects to the backend.
    #[serde(default)]
    pub enabled: bool,

    /// Backend base URL.
    #[serde(default)]
    pub base_url: String,

    /// Bearer token.
    #[serde(default)]
    pub token: String,

    /// Path of the session-start endpoint.
    #[serde(default = "default_discovery_path")]
    pub discovery_path: String,

    /// Interval between heartbeat ticks in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Maximum frames held back while the bot starts.
    #[serde(default = "default_pending_frames")]
    pub pending_frames: usize,

    /// Upper bound on opening the push connection, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            token: String::new(),
            discovery_path: default_discovery_path(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            pending_frames: default_pending_frames(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RealtimeConfig {
    /// Converts to adapter options; commands wait up to `reply_timeout`.
    pub fn to_options(&self, reply_timeout: Duration) -> RealtimeOptions {
        let mut options = RealtimeOptions::new(&self.base_url, &self.token)
            .with_discovery_path(&self.discovery_path)
            .with_heartbeat_interval(Duration::from_millis(self.heartbeat_interval_ms))
            .with_pending_frames(self.pending_frames)
            .with_reply_timeout(reply_timeout);
        options.connect_timeout_ms = self.connect_timeout_ms;
        options
    }
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

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; otherwise logs in the full format.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Requires `file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file for [`LogOutput::File`].
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module levels, e.g. `nonobot_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NonobotConfig::default();
        assert_eq!(config.bot.name, "nono");
        assert!(config.bot.builtin_handlers);
        assert!(!config.realtime.enabled);
        assert_eq!(config.realtime.heartbeat_interval_ms, 4000);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_bot_options() {
        let bot = BotConfig {
            name: "r2".into(),
            aliases: vec!["bb8".into(), "c3po".into()],
            ..Default::default()
        };
        let options = bot.to_options();
        assert_eq!(options.name, "r2");
        assert_eq!(options.aliases, vec!["bb8".to_string(), "c3po".to_string()]);
    }

    #[test]
    fn test_realtime_options() {
        let realtime = RealtimeConfig {
            enabled: true,
            base_url: "https://chat.example.com".into(),
            token: "t".into(),
            heartbeat_interval_ms: 1000,
            pending_frames: 8,
            ..Default::default()
        };
        let options = realtime.to_options(Duration::from_secs(5));
        assert_eq!(options.base_url, "https://chat.example.com");
        assert_eq!(options.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(options.pending_frames, 8);
        assert_eq!(options.reply_timeout(), Duration::from_secs(5));
        assert_eq!(options.discovery_path, "/session/start");
    }

    #[test]
    fn test_log_level_serde() {
        let level: LogLevel = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
        assert_eq!(level.to_tracing_level(), tracing::Level::WARN);
        assert!(serde_json::from_str::<LogLevel>("\"loud\"").is_err());
    }
}
