//! The command router.
//!
//! A [`ChatRouter`] consumes [`InboundEnvelope`]s on `bots.<name>.inbound`
//! and hands each one to the first registered handler that accepts it:
//!
//! 1. Handlers are tried in registration order
//! 2. A handler whose [`AddressMode`] disagrees with the envelope is skipped
//! 3. The first full pattern match wins and no other handler is called
//!
//! When nothing matches, an empty acknowledgement (`null`) is sent to the
//! envelope's reply address so the waiting client never blocks past its
//! deadline.
//!
//! # Example
//!
//! ```rust,ignore
//! let router = registry.get_or_create(&bus, "nono");
//!
//! router.respond(r"echo\s+(.+)", |msg: Message| async move {
//!     let text = msg.matched_group(1).unwrap_or_default().to_string();
//!     msg.reply(text);
//! })?;
//!
//! router.when("good morning", |msg: Message| async move {
//!     msg.reply("morning!");
//! })?;
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use nonobot_core::{Consumer, EventBus, SendOptions};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::envelope::{InboundEnvelope, inbound_address, outbound_address};
use crate::error::{RouterError, RouterResult};
use crate::handler::{AddressMode, HandlerFn, HandlerInfo, PatternHandler, into_handler};
use crate::message::Message;

/// Callback receiving a router's initialization outcome.
pub type InitCallback = Box<dyn FnOnce(RouterResult<()>) + Send>;

enum InitState {
    Pending(Vec<InitCallback>),
    Complete(RouterResult<()>),
}

struct RouterInner {
    name: String,
    bus: EventBus,
    inbound_address: String,
    outbound_address: String,
    /// Copy-on-write: dispatch iterates a snapshot.
    handlers: RwLock<Arc<Vec<Arc<PatternHandler>>>>,
    next_handler_id: AtomicU64,
    init: Mutex<InitState>,
    cancel: CancellationToken,
}

impl RouterInner {
    fn complete_init(&self, outcome: RouterResult<()>) {
        let callbacks = {
            let mut state = self.init.lock();
            match &mut *state {
                InitState::Pending(callbacks) => {
                    let callbacks = std::mem::take(callbacks);
                    *state = InitState::Complete(outcome.clone());
                    callbacks
                }
                InitState::Complete(_) => return,
            }
        };

        for callback in callbacks {
            callback(outcome.clone());
        }
    }
}

impl Drop for RouterInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A shared command router.
///
/// Cloning is cheap; all clones share handlers and lifecycle.
#[derive(Clone)]
pub struct ChatRouter {
    inner: Arc<RouterInner>,
}

impl ChatRouter {
    /// Creates a router and starts consuming its inbound address.
    ///
    /// Registration completes asynchronously; observe it with
    /// [`on_init`](Self::on_init) or [`initialized`](Self::initialized).
    /// Outside of a tokio runtime the router fails initialization with
    /// [`RouterError::NoRuntime`].
    pub fn new(bus: EventBus, name: impl Into<String>) -> Self {
        let name = name.into();
        let router = Self {
            inner: Arc::new(RouterInner {
                inbound_address: inbound_address(&name),
                outbound_address: outbound_address(&name),
                name,
                bus,
                handlers: RwLock::new(Arc::new(Vec::new())),
                next_handler_id: AtomicU64::new(1),
                init: Mutex::new(InitState::Pending(Vec::new())),
                cancel: CancellationToken::new(),
            }),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_inbound(
                    Arc::downgrade(&router.inner),
                    router.inner.bus.clone(),
                    router.inner.inbound_address.clone(),
                    router.inner.cancel.clone(),
                ));
            }
            Err(_) => {
                warn!(router = %router.inner.name, "Router created outside of a runtime");
                router.inner.complete_init(Err(RouterError::NoRuntime));
            }
        }

        router
    }

    /// The router's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The bus this router consumes from.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// The address envelopes are consumed on.
    pub fn inbound_address(&self) -> &str {
        &self.inner.inbound_address
    }

    /// The address proactive messages are broadcast on.
    pub fn outbound_address(&self) -> &str {
        &self.inner.outbound_address
    }

    // =========================================================================
    // Handler registration
    // =========================================================================

    /// Registers a handler for messages overheard in a conversation.
    pub fn when<F, Fut>(&self, pattern: &str, handler: F) -> RouterResult<ChatHandler>
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(AddressMode::Unaddressed, pattern, None, into_handler(handler))
    }

    /// Registers a handler for messages directed at the bot.
    pub fn respond<F, Fut>(&self, pattern: &str, handler: F) -> RouterResult<ChatHandler>
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(AddressMode::Addressed, pattern, None, into_handler(handler))
    }

    /// Registers a handler, appending it after every existing one.
    pub fn register(
        &self,
        mode: AddressMode,
        pattern: &str,
        description: Option<String>,
        callback: HandlerFn,
    ) -> RouterResult<ChatHandler> {
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        let handler = PatternHandler::compile(id, mode, pattern, description, callback)?;

        let mut handlers = self.inner.handlers.write();
        Arc::make_mut(&mut *handlers).push(Arc::new(handler));

        debug!(router = %self.inner.name, handler = id, ?mode, pattern, "Handler registered");

        Ok(ChatHandler {
            id,
            router: Arc::downgrade(&self.inner),
        })
    }

    /// Descriptions of the registered handlers, in dispatch order.
    pub fn handlers(&self) -> Vec<HandlerInfo> {
        self.inner.handlers.read().iter().map(|h| h.info()).collect()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches one envelope, returning whether a handler took it.
    ///
    /// The matched handler runs to completion before this returns. Handler
    /// removal during dispatch does not affect an envelope already being
    /// dispatched. A panicking handler is logged; if it had not replied yet
    /// an empty acknowledgement is sent in its place.
    pub async fn dispatch(&self, envelope: InboundEnvelope) -> bool {
        let snapshot = self.inner.handlers.read().clone();

        for handler in snapshot.iter() {
            let Some(groups) = handler.captures(envelope.addressed, &envelope.content) else {
                continue;
            };

            debug!(
                router = %self.inner.name,
                handler = handler.id,
                chat_id = %envelope.chat_id,
                "Handler matched"
            );

            let message = Message::new(
                self.inner.bus.clone(),
                envelope.chat_id,
                envelope.content,
                groups,
                envelope.reply_address,
            );
            let callback = handler.callback.clone();
            let running = message.clone();
            let outcome = AssertUnwindSafe(async move { callback(running).await })
                .catch_unwind()
                .await;

            if let Err(panic) = outcome {
                warn!(
                    router = %self.inner.name,
                    handler = handler.id,
                    panic = %panic_message(panic.as_ref()),
                    "Handler panicked"
                );
                if !message.replied() {
                    self.acknowledge(message.reply_address());
                }
            }
            return true;
        }

        debug!(
            router = %self.inner.name,
            addressed = envelope.addressed,
            "No handler matched"
        );
        self.acknowledge(&envelope.reply_address);
        false
    }

    fn acknowledge(&self, reply_address: &str) {
        if let Err(e) = self.inner.bus.send(reply_address, Value::Null) {
            debug!(address = %reply_address, error = %e, "Empty acknowledgement not delivered");
        }
    }

    /// Broadcasts `body` to `options.chat_id` on the outbound address.
    pub fn send_message(&self, options: &SendOptions, body: impl Into<String>) -> RouterResult<()> {
        trace!(router = %self.inner.name, chat_id = %options.chat_id, "Broadcasting message");
        let value = serde_json::json!({
            "chatId": options.chat_id,
            "body": body.into(),
        });
        self.inner
            .bus
            .publish(&self.inner.outbound_address, value)
            .map_err(RouterError::from)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Invokes `callback` with the initialization outcome, immediately if it
    /// is already known.
    pub fn on_init<F>(&self, callback: F)
    where
        F: FnOnce(RouterResult<()>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.inner.init.lock();
            match &mut *state {
                InitState::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                InitState::Complete(outcome) => outcome.clone(),
            }
        };
        callback(outcome);
    }

    /// Waits for the initialization outcome.
    pub async fn initialized(&self) -> RouterResult<()> {
        let (tx, rx) = oneshot::channel();
        self.on_init(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap_or(Err(RouterError::Closed))
    }

    /// Whether initialization has completed, successfully or not.
    pub fn is_initialized(&self) -> bool {
        matches!(*self.inner.init.lock(), InitState::Complete(_))
    }

    /// Stops consuming inbound envelopes.
    ///
    /// Envelopes still in flight are dropped without any notice.
    pub fn close(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!(router = %self.inner.name, "Closing router");
            self.inner.cancel.cancel();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Creates a non-owning reference, for handlers that need their router.
    pub fn downgrade(&self) -> WeakChatRouter {
        WeakChatRouter {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A non-owning reference to a [`ChatRouter`].
#[derive(Clone)]
pub struct WeakChatRouter {
    inner: Weak<RouterInner>,
}

impl WeakChatRouter {
    /// Returns the router if it is still alive.
    pub fn upgrade(&self) -> Option<ChatRouter> {
        self.inner.upgrade().map(|inner| ChatRouter { inner })
    }
}

impl fmt::Debug for ChatRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRouter")
            .field("name", &self.inner.name)
            .field("bus", &self.inner.bus.id())
            .field("handlers", &self.inner.handlers.read().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Consumes the inbound address until the router is closed or dropped.
///
/// However the task ends, the router is marked closed so that the registry
/// replaces it instead of handing out a router nobody consumes for.
async fn run_inbound(
    router: Weak<RouterInner>,
    bus: EventBus,
    address: String,
    cancel: CancellationToken,
) {
    let _closed_on_exit = cancel.clone().drop_guard();
    let registration = if cancel.is_cancelled() {
        Err(RouterError::Closed)
    } else {
        bus.consumer(address.as_str()).map_err(RouterError::from)
    };

    let mut consumer: Consumer = {
        let Some(inner) = router.upgrade() else {
            return;
        };
        match registration {
            Ok(consumer) => {
                info!(router = %inner.name, address = %address, "Router ready");
                inner.complete_init(Ok(()));
                consumer
            }
            Err(e) => {
                warn!(router = %inner.name, error = %e, "Router failed to start");
                inner.complete_init(Err(e));
                return;
            }
        }
    };

    loop {
        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            delivery = consumer.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        let Some(inner) = router.upgrade() else {
            break;
        };
        let router = ChatRouter { inner };

        match serde_json::from_value::<InboundEnvelope>(delivery.into_body()) {
            Ok(envelope) => {
                router.dispatch(envelope).await;
            }
            Err(e) => {
                warn!(router = %router.name(), error = %e, "Dropping malformed envelope");
            }
        }
    }

    trace!(address = %address, "Inbound consumer stopped");
}

// =============================================================================
// ChatHandler
// =============================================================================

/// Handle to a registered handler.
#[derive(Debug, Clone)]
pub struct ChatHandler {
    id: u64,
    router: Weak<RouterInner>,
}

impl ChatHandler {
    /// The handler's id, unique within its router.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the handler from its router.
    ///
    /// Returns `false` if it was already removed or the router is gone.
    pub fn close(&self) -> bool {
        let Some(router) = self.router.upgrade() else {
            return false;
        };
        let mut handlers = router.handlers.write();
        let before = handlers.len();
        Arc::make_mut(&mut *handlers).retain(|h| h.id != self.id);
        let removed = handlers.len() != before;
        if removed {
            debug!(router = %router.name, handler = self.id, "Handler removed");
        }
        removed
    }
}
