//! Built-in handlers.

use tracing::debug;

use crate::error::RouterResult;
use crate::handler::{AddressMode, into_handler};
use crate::router::{ChatHandler, ChatRouter};

/// Answers `ping` with `pong`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

impl PingHandler {
    /// Registers the handler on `router`.
    pub fn install(self, router: &ChatRouter) -> RouterResult<ChatHandler> {
        router.register(
            AddressMode::Addressed,
            "ping",
            Some("ping - check that the bot is alive".into()),
            into_handler(|msg| async move { msg.reply("pong") }),
        )
    }
}

/// Answers `help` with one line per registered handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelpHandler;

impl HelpHandler {
    /// Registers the handler on `router`.
    pub fn install(self, router: &ChatRouter) -> RouterResult<ChatHandler> {
        let weak = router.downgrade();
        router.register(
            AddressMode::Addressed,
            "help",
            Some("help - list what the bot understands".into()),
            into_handler(move |msg| {
                let weak = weak.clone();
                async move {
                    let Some(router) = weak.upgrade() else {
                        return;
                    };
                    let lines: Vec<String> =
                        router.handlers().iter().map(ToString::to_string).collect();
                    msg.reply(lines.join("\n"));
                }
            }),
        )
    }
}

/// Installs [`HelpHandler`] and [`PingHandler`] on `router`.
pub fn install_builtin_handlers(router: &ChatRouter) -> RouterResult<Vec<ChatHandler>> {
    let handlers = vec![HelpHandler.install(router)?, PingHandler.install(router)?];
    debug!(router = %router.name(), "Built-in handlers installed");
    Ok(handlers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nonobot_core::{BotClient, EventBus};
    use tokio::runtime::Handle;

    use crate::client::BusBotClient;

    #[tokio::test]
    async fn test_ping_and_help() {
        let bus = EventBus::new();
        let router = ChatRouter::new(bus.clone(), "nono");
        router.initialized().await.unwrap();
        install_builtin_handlers(&router).unwrap();
        router.when("foo", |_| async {}).unwrap();

        let client = BusBotClient::new(bus, "nono", Handle::current());
        assert_eq!(client.process("ping").await.unwrap().as_deref(), Some("pong"));

        let help = client.process("help").await.unwrap().unwrap();
        assert_eq!(
            help,
            "@ help - list what the bot understands\n@ ping - check that the bot is alive\n* foo"
        );
    }
}
