//! Transport abstractions.
//!
//! Adapters talk to the network only through the capability traits defined
//! here; `nonobot-transport` provides the concrete implementations.

mod capability;
mod connection;

pub use capability::{HttpClientCapability, HttpResponse, WsClientCapability};
pub use connection::{ClientConfig, ConnectionHandle, ConnectionHandler, OUTGOING_QUEUE_CAPACITY};
