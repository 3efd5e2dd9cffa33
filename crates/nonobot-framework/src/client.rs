//! Bus-backed bot client.
//!
//! [`BusBotClient`] turns raw chat text into [`InboundEnvelope`]s for the
//! router named after the bot, then waits on a private reply address for the
//! answer.
//!
//! A text is *addressed* when it starts with the bot's name or one of its
//! aliases, optionally preceded by `@` and followed by `:` or whitespace:
//!
//! ```text
//! nono echo hi     -> addressed, "echo hi"
//! @nono:echo hi    -> addressed, "echo hi"
//! nonobot echo hi  -> not addressed
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use nonobot_core::{
    BotClient, ClientError, ClientResult, EventBus, OutboundHandler, OutboundMessage,
    ReceiveOptions,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::envelope::{InboundEnvelope, inbound_address, outbound_address};

struct ClientInner {
    name: String,
    aliases: RwLock<Vec<String>>,
    bus: EventBus,
    inbound_address: String,
    outbound_address: String,
    handle: Handle,
    subscription: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// A [`BotClient`] talking to its router over an [`EventBus`].
#[derive(Clone)]
pub struct BusBotClient {
    inner: Arc<ClientInner>,
}

impl BusBotClient {
    /// Creates a client for the bot `name`, scheduling its work on `handle`.
    pub fn new(bus: EventBus, name: impl Into<String>, handle: Handle) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(ClientInner {
                inbound_address: inbound_address(&name),
                outbound_address: outbound_address(&name),
                name,
                aliases: RwLock::new(Vec::new()),
                bus,
                handle,
                subscription: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Current aliases.
    pub fn aliases(&self) -> Vec<String> {
        self.inner.aliases.read().clone()
    }

    /// Splits the name/alias prefix off `text`, returning the remainder
    /// when the text is addressed to the bot.
    pub fn strip_address<'a>(&self, text: &'a str) -> Option<&'a str> {
        let rest = text.strip_prefix('@').unwrap_or(text);
        let aliases = self.inner.aliases.read();

        std::iter::once(self.inner.name.as_str())
            .chain(aliases.iter().map(String::as_str))
            .filter(|candidate| !candidate.is_empty())
            .find_map(|candidate| {
                let after = rest.strip_prefix(candidate)?;
                if after.is_empty() {
                    Some(after)
                } else if let Some(after) = after.strip_prefix(':') {
                    Some(after.trim_start())
                } else if after.starts_with(char::is_whitespace) {
                    Some(after.trim_start())
                } else {
                    None
                }
            })
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(ClientError::Closed)
        } else {
            Ok(())
        }
    }

    async fn forward(
        &self,
        options: ReceiveOptions,
        addressed: bool,
        content: &str,
    ) -> ClientResult<Option<String>> {
        self.ensure_open()?;

        let reply_address = format!("bots.{}.reply.{}", self.inner.name, Uuid::new_v4());
        let mut replies = self.inner.bus.consumer(reply_address.as_str())?;

        let envelope = InboundEnvelope::new(options.chat_id, content, addressed, reply_address);
        trace!(
            bot = %self.inner.name,
            chat_id = %envelope.chat_id,
            addressed,
            "Forwarding text to router"
        );
        self.inner
            .bus
            .send(&self.inner.inbound_address, envelope.to_json())?;

        let delivery = match tokio::time::timeout(options.timeout, replies.recv()).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return Err(ClientError::Closed),
            Err(_) => {
                return Err(ClientError::Timeout {
                    timeout: options.timeout,
                });
            }
        };

        let body = if delivery.expects_reply() {
            let body = delivery.body().clone();
            delivery.reply(Value::Null);
            body
        } else {
            delivery.into_body()
        };

        Ok(match body {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
    }
}

#[async_trait]
impl BotClient for BusBotClient {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn alias(&self, aliases: Vec<String>) {
        *self.inner.aliases.write() = aliases;
    }

    async fn process_with(
        &self,
        options: ReceiveOptions,
        text: &str,
    ) -> ClientResult<Option<String>> {
        self.forward(options, true, text).await
    }

    async fn receive_message(
        &self,
        options: ReceiveOptions,
        text: &str,
    ) -> ClientResult<Option<String>> {
        match self.strip_address(text) {
            Some(content) => self.forward(options, true, content).await,
            None => self.forward(options, false, text).await,
        }
    }

    fn message_handler(&self, handler: OutboundHandler) {
        if self.ensure_open().is_err() {
            return;
        }

        let mut consumer = match self.inner.bus.consumer(self.inner.outbound_address.as_str()) {
            Ok(consumer) => consumer,
            Err(e) => {
                warn!(bot = %self.inner.name, error = %e, "Cannot subscribe to outbound messages");
                return;
            }
        };

        let bot = self.inner.name.clone();
        let task = self.inner.handle.spawn(async move {
            while let Some(delivery) = consumer.recv().await {
                match serde_json::from_value::<OutboundMessage>(delivery.into_body()) {
                    Ok(message) => handler(message),
                    Err(e) => debug!(bot = %bot, error = %e, "Ignoring malformed outbound message"),
                }
            }
        });

        if let Some(previous) = self.inner.subscription.lock().replace(task) {
            previous.abort();
        }
    }

    fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(bot = %self.inner.name, "Closing bot client");
        if let Some(task) = self.inner.subscription.lock().take() {
            task.abort();
        }
    }
}

impl fmt::Debug for BusBotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusBotClient")
            .field("name", &self.inner.name)
            .field("aliases", &*self.inner.aliases.read())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}
