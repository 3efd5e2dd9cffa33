//! HTTP transport capabilities.

mod client;
pub use client::HttpClientCapabilityImpl;
