//! # nonobot Realtime Adapter
//!
//! Connects a bot to a chat backend speaking a realtime push protocol.
//!
//! ## Overview
//!
//! The adapter:
//!
//! - discovers the push endpoint with an authenticated HTTP call
//! - opens the push connection and tracks channel membership
//! - forwards commands (mentions in member channels, anything in direct
//!   conversations) to a [`BotClient`](nonobot_core::BotClient)
//! - writes replies back and keeps the connection alive with pings
//!
//! Frames that arrive before the bot pipeline is ready are held back and
//! replayed in order.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nonobot_adapter_realtime::{RealtimeAdapter, RealtimeOptions};
//! use nonobot_transport::{HttpClientCapabilityImpl, WsClientCapabilityImpl};
//!
//! let adapter = RealtimeAdapter::new(
//!     RealtimeOptions::new("https://chat.example.com", token),
//!     Arc::new(HttpClientCapabilityImpl::new()?),
//!     Arc::new(WsClientCapabilityImpl),
//!     Arc::new(bot),
//! );
//! adapter.connect()?.await?;
//! ```
//!
//! ## Protocol
//!
//! ```text
//! GET {base}/session/start?token=…   -> {"url", "self": {"id"}, "channels": [...]}
//! push  <- {"type": "message", "channel": "C1", "text": "<@U1> ping"}
//! push  <- {"type": "channel_joined", "channel": {"id": "C2"}}
//! push  <- {"type": "channel_left", "channel": "C2"}
//! push  -> {"type": "message", "id": "…", "channel": "C1", "text": "pong"}
//! push  -> {"type": "ping", "id": "…"}
//! ```

mod adapter;
pub mod config;
mod gate;
mod heartbeat;
pub mod membership;
pub mod model;

#[cfg(test)]
mod testing;

pub use adapter::{CloseHandler, Connecting, ConnectionState, RealtimeAdapter};
pub use config::{RealtimeOptions, push_endpoint};
pub use membership::{ChannelKind, ChannelMembership};
pub use model::{ChannelInfo, InboundFrame, OutboundFrame, SelfInfo, SessionStart};
