//! The wire contract between bot clients and routers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns the address a router named `name` consumes envelopes on.
pub fn inbound_address(name: &str) -> String {
    format!("bots.{name}.inbound")
}

/// Returns the address a router named `name` broadcasts proactive messages on.
pub fn outbound_address(name: &str) -> String {
    format!("bots.{name}.outbound")
}

/// A normalized inbound message.
///
/// Serialized as `{respond, content, replyAddress, chatId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    /// Conversation the text came from.
    #[serde(default)]
    pub chat_id: String,
    /// Text with any name/mention prefix already stripped.
    pub content: String,
    /// Whether the text was explicitly directed at the bot.
    #[serde(rename = "respond")]
    pub addressed: bool,
    /// Where the reply (or empty acknowledgement) must be sent.
    pub reply_address: String,
}

impl InboundEnvelope {
    /// Creates an envelope.
    pub fn new(
        chat_id: impl Into<String>,
        content: impl Into<String>,
        addressed: bool,
        reply_address: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            addressed,
            reply_address: reply_address.into(),
        }
    }

    /// Encodes the envelope as a bus body.
    pub fn to_json(&self) -> Value {
        // Plain string and bool fields always serialize.
        serde_json::to_value(self).unwrap_or_default()
    }
}
