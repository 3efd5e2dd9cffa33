//! Wire types of the realtime protocol.
//!
//! Discovery answers `GET <base>/session/start?token=…` with
//!
//! ```json
//! {"url": "wss://…", "self": {"id": "U1"}, "channels": [{"id": "C1", "is_member": true}]}
//! ```
//!
//! after which every push frame is a JSON text with a `type` discriminator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Discovery
// =============================================================================

/// Session-start payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionStart {
    /// Push connection URL.
    pub url: String,
    /// The bot's own identity.
    #[serde(rename = "self")]
    pub self_info: SelfInfo,
    /// Channels visible to the bot.
    pub channels: Vec<ChannelInfo>,
}

/// The bot's own identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelfInfo {
    /// User id, used in mentions as `<@id>`.
    pub id: String,
}

/// A channel listed at discovery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelInfo {
    /// Channel id.
    pub id: String,
    /// Whether the bot belongs to the channel.
    #[serde(default)]
    pub is_member: bool,
}

// =============================================================================
// Push frames
// =============================================================================

/// Channel object carried by `channel_joined`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelRef {
    /// Channel id.
    pub id: String,
}

/// A frame received on the push connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// The bot joined a channel.
    ChannelJoined {
        /// The joined channel.
        channel: ChannelRef,
    },
    /// The bot left a channel.
    ChannelLeft {
        /// The channel id.
        channel: String,
    },
    /// A chat message.
    Message {
        /// Channel the message was posted in.
        channel: String,
        /// Message text; absent for edits, joins and similar events.
        #[serde(default)]
        text: Option<String>,
    },
    /// Anything else (`ping`, `pong`, `hello`, …).
    #[serde(other)]
    Other,
}

/// A frame written to the push connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A chat message.
    Message {
        /// Unique frame id.
        id: String,
        /// Target channel.
        channel: String,
        /// Message text.
        text: String,
    },
    /// A keep-alive.
    Ping {
        /// Unique frame id.
        id: String,
    },
}

impl OutboundFrame {
    /// A message frame with a fresh id.
    pub fn message(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Message {
            id: Uuid::new_v4().to_string(),
            channel: channel.into(),
            text: text.into(),
        }
    }

    /// A ping frame with a fresh id.
    pub fn ping() -> Self {
        Self::Ping {
            id: Uuid::new_v4().to_string(),
        }
    }
}
