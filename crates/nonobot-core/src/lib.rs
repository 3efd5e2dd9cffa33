//! # nonobot Core
//!
//! The core engine of the nonobot chat-bot runtime.
//!
//! This crate provides the pieces every other layer builds on:
//!
//! - **Event Bus**: the in-process execution domain ([`EventBus`], [`Consumer`], [`Delivery`])
//! - **Bot Client Contract**: the ingestion interface adapters depend on ([`BotClient`], [`ClientProvider`])
//! - **Transport Capabilities**: network seams implemented by `nonobot-transport`
//!   ([`HttpClientCapability`], [`WsClientCapability`], [`ConnectionHandle`])
//! - **Errors**: the shared error taxonomy ([`BusError`], [`TransportError`], [`AdapterError`], [`ClientError`])
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌──────────┐     ┌───────────┐
//! │  Transport  │────▶│  Adapter   │────▶│  Client  │────▶│  Router   │
//! │ (ws / http) │◀────│ (realtime) │◀────│  (bus)   │◀────│ (handler) │
//! └─────────────┘     └────────────┘     └──────────┘     └───────────┘
//! ```
//!
//! Clients and routers never reference each other: they exchange JSON bodies
//! over [`EventBus`] addresses.

pub mod bus;
pub mod client;
pub mod error;
pub mod transport;

pub use bus::{BusId, Consumer, Delivery, EventBus};
pub use client::{
    BotClient, BoxedBotClient, ClientProvider, DEFAULT_CHAT_ID, DEFAULT_RECEIVE_TIMEOUT,
    OutboundHandler, OutboundMessage, ReceiveOptions, SendOptions,
};
pub use error::{
    AdapterError, AdapterResult, BusError, BusResult, ClientError, ClientResult, TransportError,
    TransportResult,
};
pub use transport::{
    ClientConfig, ConnectionHandle, ConnectionHandler, HttpClientCapability, HttpResponse,
    OUTGOING_QUEUE_CAPACITY, WsClientCapability,
};

/// A boxed future, re-exported for handler signatures.
pub use futures::future::BoxFuture;
