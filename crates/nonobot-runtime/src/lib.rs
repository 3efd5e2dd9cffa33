//! nonobot Runtime - Orchestration layer for the nonobot chat-bot runtime.
//!
//! This crate provides:
//! - Layered configuration loading and validation (`figment`)
//! - Logging configuration (`tracing-subscriber`, `tracing-appender`)
//! - Runtime orchestration (`NonobotRuntime`): bus, router registry, bot,
//!   built-in handlers and the realtime adapter
//!
//! # Transport Features
//!
//! The realtime adapter needs both client capabilities:
//!
//! - `http-client`: session discovery
//! - `ws-client`: the push connection
//! - `full-transport`: both
//!
//! Without them, capabilities can be injected with
//! [`NonobotRuntime::with_http_client`] and [`NonobotRuntime::with_ws_client`].
//!
//! ```ignore
//! use nonobot_runtime::NonobotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = NonobotRuntime::builder().build()?;
//!     runtime.chat_router().respond("hello", |msg| async move {
//!         msg.reply("hi there");
//!     })?;
//!
//!     // Run until Ctrl+C or the backend hangs up
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, NonobotConfig,
    RealtimeConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{NonobotRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
