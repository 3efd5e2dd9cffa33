//! Bot client contract.
//!
//! A [`BotClient`] is the ingestion side of a bot: adapters feed it the text
//! they receive and write back whatever it answers. Adapters only depend on
//! this trait, never on a concrete client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::ClientResult;

/// Default time a caller waits for a router to answer.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat id used when the caller does not provide one.
pub const DEFAULT_CHAT_ID: &str = "default";

// =============================================================================
// Options & Messages
// =============================================================================

/// Options for [`BotClient::receive_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// The conversation the text came from.
    pub chat_id: String,
    /// How long to wait for the router's answer.
    pub timeout: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            chat_id: DEFAULT_CHAT_ID.to_string(),
            timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

impl ReceiveOptions {
    /// Creates options for the given chat.
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            ..Default::default()
        }
    }

    /// Sets the receive timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options for proactive sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// The conversation to send to.
    pub chat_id: String,
}

impl SendOptions {
    /// Creates send options for the given chat.
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
        }
    }
}

/// A proactive message broadcast by a router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Target conversation.
    pub chat_id: String,
    /// Message text.
    pub body: String,
}

/// Callback receiving proactive messages.
pub type OutboundHandler = Arc<dyn Fn(OutboundMessage) + Send + Sync>;

// =============================================================================
// BotClient
// =============================================================================

/// The ingestion side of a bot.
///
/// Both [`process`](BotClient::process) and
/// [`receive_message`](BotClient::receive_message) resolve to `Ok(Some(reply))`
/// when a handler answered and `Ok(None)` when nothing matched.
#[async_trait]
pub trait BotClient: Send + Sync {
    /// The bot's name.
    fn name(&self) -> &str;

    /// Replaces the aliases the bot also answers to.
    fn alias(&self, aliases: Vec<String>);

    /// Forwards `text` as a command addressed to the bot, without any
    /// name parsing.
    async fn process(&self, text: &str) -> ClientResult<Option<String>> {
        self.process_with(ReceiveOptions::default(), text).await
    }

    /// Like [`process`](BotClient::process), for a given chat.
    async fn process_with(
        &self,
        options: ReceiveOptions,
        text: &str,
    ) -> ClientResult<Option<String>>;

    /// Forwards `text` from a chat, detecting whether it is addressed to
    /// the bot by its name or one of its aliases.
    async fn receive_message(
        &self,
        options: ReceiveOptions,
        text: &str,
    ) -> ClientResult<Option<String>>;

    /// Installs the handler for proactive messages, replacing any previous one.
    fn message_handler(&self, handler: OutboundHandler);

    /// The runtime the client schedules its work on.
    fn handle(&self) -> &tokio::runtime::Handle;

    /// Closes the client.
    fn close(&self);
}

/// Shared bot client.
pub type BoxedBotClient = Arc<dyn BotClient>;

/// Source of a [`BotClient`], resolved once the processing pipeline is ready.
pub trait ClientProvider: Send + Sync {
    /// Resolves to a ready client.
    fn client(&self) -> BoxFuture<'static, ClientResult<BoxedBotClient>>;
}

impl ClientProvider for BoxedBotClient {
    fn client(&self) -> BoxFuture<'static, ClientResult<BoxedBotClient>> {
        let client = self.clone();
        Box::pin(async move { Ok(client) })
    }
}

impl fmt::Debug for dyn BotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotClient").field("name", &self.name()).finish()
    }
}
