//! # nonobot Transport
//!
//! Network transport capability implementations for nonobot.
//!
//! This crate provides concrete implementations of the capability traits
//! defined in `nonobot-core`, gated by feature flags.
//!
//! ## Features
//!
//! - `ws-client`: WebSocket client capability
//! - `http-client`: HTTP client capability
//! - `full`: All capabilities
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Adapter Layer      │  (realtime)
//! │  (uses capabilities)│
//! ├─────────────────────┤
//! │  nonobot-core       │  (capability traits)
//! ├─────────────────────┤
//! │  nonobot-transport  │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nonobot_transport::{HttpClientCapabilityImpl, WsClientCapabilityImpl};
//! use nonobot_core::{ClientConfig, HttpClientCapability, WsClientCapability};
//!
//! let http = HttpClientCapabilityImpl::new()?;
//! let response = http.get("https://chat.example.com/session/start?token=t", Some("t")).await?;
//!
//! let ws = WsClientCapabilityImpl::new();
//! let handle = ws.connect("wss://push.example.com/", handler, ClientConfig::default()).await?;
//! ```

#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "ws-client")]
pub mod websocket;

#[cfg(feature = "ws-client")]
pub use websocket::WsClientCapabilityImpl;

#[cfg(feature = "http-client")]
pub use http::HttpClientCapabilityImpl;
