//! # nonobot
//!
//! A chat-bot runtime: text arrives from a chat backend, is matched against
//! ordered regex handlers, and handler replies flow back to the chat.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────┐     ┌──────────┐     ┌──────────────┐
//! │   Realtime   │────▶│ BotClient │────▶│ EventBus │────▶│  ChatRouter  │──▶ handlers
//! │   Adapter    │◀────│           │◀────│          │◀────│ (per bot)    │
//! └──────────────┘     └───────────┘     └──────────┘     └──────────────┘
//! ```
//!
//! - **Adapter**: discovers a push endpoint, keeps the WebSocket alive and
//!   turns chat frames into commands
//! - **BotClient**: the ingestion interface; detects whether text is
//!   addressed to the bot by name or alias
//! - **EventBus**: in-process addressed messaging with request/reply
//! - **ChatRouter**: one per bot name, shared through the [`RouterRegistry`](framework::RouterRegistry)
//! - **Handlers**: async closures receiving a [`Message`](framework::Message)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nonobot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = NonobotRuntime::builder().build()?;
//!
//!     runtime.chat_router().respond(r"echo\s+(.+)", |msg| async move {
//!         let text = msg.matched_group(1).unwrap_or_default().to_string();
//!         msg.reply(text);
//!     })?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-client`, `ws-client`, `full-transport`: network transports for
//!   the realtime adapter

pub use nonobot_adapter_realtime as realtime;
pub use nonobot_core as core;
pub use nonobot_framework as framework;
pub use nonobot_runtime as runtime;
pub use nonobot_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use nonobot::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use nonobot_runtime::{NonobotConfig, NonobotRuntime, RuntimeBuilder};

    // Routing - for registering handlers
    pub use nonobot_framework::{
        AddressMode, Bot, BotOptions, ChatHandler, ChatRouter, Message, RouterRegistry,
    };

    // Client contract - for feeding text into a bot
    pub use nonobot_core::{BotClient, OutboundMessage, ReceiveOptions, SendOptions};

    // Adapter
    pub use nonobot_adapter_realtime::{RealtimeAdapter, RealtimeOptions};
}
