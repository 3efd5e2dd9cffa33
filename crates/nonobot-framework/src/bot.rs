//! Bot facade.
//!
//! A [`Bot`] ties a name and aliases to a bus and a router registry. It is
//! the [`ClientProvider`] adapters wait on: a client is only handed out once
//! the bot's router is consuming.

use std::sync::Arc;

use futures::future::BoxFuture;
use nonobot_core::{BotClient, BoxedBotClient, ClientError, ClientProvider, ClientResult, EventBus};
use tracing::debug;

use crate::client::BusBotClient;
use crate::registry::RouterRegistry;
use crate::router::ChatRouter;

/// Name used when none is configured.
pub const DEFAULT_BOT_NAME: &str = "nono";

/// Bot identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotOptions {
    /// The bot's name.
    pub name: String,
    /// Other names the bot answers to.
    pub aliases: Vec<String>,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_BOT_NAME.to_string(),
            aliases: Vec::new(),
        }
    }
}

impl BotOptions {
    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// A named bot on a bus.
#[derive(Debug, Clone)]
pub struct Bot {
    bus: EventBus,
    registry: Arc<RouterRegistry>,
    options: BotOptions,
}

impl Bot {
    /// Creates a bot.
    pub fn new(bus: EventBus, registry: Arc<RouterRegistry>, options: BotOptions) -> Self {
        Self {
            bus,
            registry,
            options,
        }
    }

    /// The bot's name.
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// The bot's options.
    pub fn options(&self) -> &BotOptions {
        &self.options
    }

    /// The bus the bot lives on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The shared router for this bot's name.
    pub fn chat_router(&self) -> ChatRouter {
        self.registry.get_or_create(&self.bus, &self.options.name)
    }

    /// Waits for the router to be ready, then creates a client.
    pub async fn create_client(&self) -> ClientResult<BusBotClient> {
        self.chat_router()
            .initialized()
            .await
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;

        let client = BusBotClient::new(
            self.bus.clone(),
            self.options.name.clone(),
            tokio::runtime::Handle::current(),
        );
        client.alias(self.options.aliases.clone());
        debug!(bot = %self.options.name, "Bot client created");
        Ok(client)
    }
}

impl ClientProvider for Bot {
    fn client(&self) -> BoxFuture<'static, ClientResult<BoxedBotClient>> {
        let bot = self.clone();
        Box::pin(async move {
            let client = bot.create_client().await?;
            Ok(Arc::new(client) as BoxedBotClient)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nonobot_core::ReceiveOptions;

    #[tokio::test]
    async fn test_default_name() {
        let bot = Bot::new(
            EventBus::new(),
            Arc::new(RouterRegistry::new()),
            BotOptions::default(),
        );
        assert_eq!(bot.name(), "nono");
    }

    #[tokio::test]
    async fn test_provider_yields_ready_client() {
        let registry = Arc::new(RouterRegistry::new());
        let bot = Bot::new(
            EventBus::new(),
            registry.clone(),
            BotOptions::default().with_alias("bb8"),
        );
        bot.chat_router()
            .respond("ping", |msg| async move { msg.reply("pong") })
            .unwrap();

        let client = ClientProvider::client(&bot).await.unwrap();
        let reply = client
            .receive_message(ReceiveOptions::default(), "bb8 ping")
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("pong"));
        assert_eq!(registry.len(), 1);
    }
}
