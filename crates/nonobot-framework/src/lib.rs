//! # nonobot Framework
//!
//! Command routing for nonobot bots.
//!
//! This layer provides:
//! - [`ChatRouter`]: ordered pattern handlers with exactly-once replies
//! - [`RouterRegistry`]: one shared router per (bus, name)
//! - [`Message`]: the handler's view of a matched envelope
//! - [`BusBotClient`] and [`Bot`]: the ingestion side adapters talk to
//! - Built-in `ping` and `help` handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use nonobot_framework::{Bot, BotOptions, RouterRegistry};
//! use nonobot_core::EventBus;
//! use std::sync::Arc;
//!
//! let bot = Bot::new(EventBus::new(), Arc::new(RouterRegistry::new()), BotOptions::default());
//!
//! bot.chat_router().respond(r"echo\s+(.+)", |msg| async move {
//!     let text = msg.matched_group(1).unwrap_or_default().to_string();
//!     msg.reply(text);
//! })?;
//!
//! let client = bot.create_client().await?;
//! assert_eq!(client.process("echo hi").await?, Some("hi".into()));
//! ```

pub mod bot;
pub mod builtin;
pub mod client;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod router;

pub use bot::{Bot, BotOptions, DEFAULT_BOT_NAME};
pub use builtin::{HelpHandler, PingHandler, install_builtin_handlers};
pub use client::BusBotClient;
pub use envelope::{InboundEnvelope, inbound_address, outbound_address};
pub use error::{RouterError, RouterResult};
pub use handler::{AddressMode, HandlerFn, HandlerInfo, into_handler};
pub use message::{DEFAULT_ACK_TIMEOUT, Message, ReplyLatch};
pub use registry::{RouterKey, RouterRegistry};
pub use router::{ChatHandler, ChatRouter, InitCallback, WeakChatRouter};
