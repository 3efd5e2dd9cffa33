//! In-process event bus.
//!
//! The [`EventBus`] is the execution domain shared by routers, bot clients and
//! adapters. Parties never hold references to each other; they exchange JSON
//! bodies through string addresses:
//!
//! - [`EventBus::send`] delivers to exactly one consumer (round-robin)
//! - [`EventBus::publish`] delivers to every consumer of the address
//! - [`EventBus::request`] delivers to one consumer and waits for its reply
//!
//! Every bus carries a process-unique [`BusId`], which is how shared state
//! keyed "per execution domain" tells two buses apart.
//!
//! # Example
//!
//! ```rust,ignore
//! use nonobot_core::EventBus;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let bus = EventBus::new();
//! let mut consumer = bus.consumer("greeter")?;
//!
//! tokio::spawn(async move {
//!     while let Some(delivery) = consumer.recv().await {
//!         delivery.reply(json!("hello"));
//!     }
//! });
//!
//! let answer = bus.request("greeter", json!(null), Duration::from_secs(1)).await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::error::{BusError, BusResult};

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an [`EventBus`], stable across clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(u64);

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus-{}", self.0)
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// A body delivered to a [`Consumer`], with an optional reply slot.
pub struct Delivery {
    address: String,
    body: Value,
    reply_tx: Option<oneshot::Sender<Value>>,
}

impl Delivery {
    /// The address this body was sent to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The delivered body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Consumes the delivery, returning its body.
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Whether the sender is waiting for a reply.
    pub fn expects_reply(&self) -> bool {
        self.reply_tx.is_some()
    }

    /// Answers the sender of a request.
    ///
    /// Returns `false` when the sender did not ask for a reply or has
    /// stopped waiting.
    pub fn reply(mut self, body: Value) -> bool {
        match self.reply_tx.take() {
            Some(tx) => tx.send(body).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("address", &self.address)
            .field("body", &self.body)
            .field("expects_reply", &self.reply_tx.is_some())
            .finish()
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// A registration on one bus address.
///
/// The registration is removed when the consumer is dropped or
/// [`unregister`](Consumer::unregister)ed.
pub struct Consumer {
    id: u64,
    address: String,
    rx: mpsc::UnboundedReceiver<Delivery>,
    bus: Weak<BusInner>,
}

impl Consumer {
    /// The address this consumer listens on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Waits for the next delivery.
    ///
    /// Returns `None` once the consumer is unregistered or the bus is closed.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Removes this registration from the bus.
    pub fn unregister(self) {}
}

impl Drop for Consumer {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.address, self.id);
        }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish()
    }
}

// =============================================================================
// EventBus
// =============================================================================

struct Registration {
    id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct AddressEntry {
    consumers: Vec<Registration>,
    cursor: usize,
}

struct BusInner {
    id: BusId,
    addresses: Mutex<HashMap<String, AddressEntry>>,
    next_consumer: AtomicU64,
    closed: AtomicBool,
}

impl BusInner {
    fn remove(&self, address: &str, id: u64) {
        let mut addresses = self.addresses.lock();
        if let Some(entry) = addresses.get_mut(address) {
            entry.consumers.retain(|r| r.id != id);
            if entry.consumers.is_empty() {
                addresses.remove(address);
            }
        }
    }

    /// Hands `delivery` to the next live consumer of `address`.
    fn deliver_one(&self, address: &str, mut delivery: Delivery) -> BusResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }

        let mut addresses = self.addresses.lock();
        let Some(entry) = addresses.get_mut(address) else {
            return Err(BusError::NoHandlers {
                address: address.to_string(),
            });
        };

        while !entry.consumers.is_empty() {
            let index = entry.cursor % entry.consumers.len();
            match entry.consumers[index].tx.send(delivery) {
                Ok(()) => {
                    entry.cursor = index + 1;
                    return Ok(());
                }
                Err(mpsc::error::SendError(returned)) => {
                    entry.consumers.remove(index);
                    delivery = returned;
                }
            }
        }

        addresses.remove(address);
        Err(BusError::NoHandlers {
            address: address.to_string(),
        })
    }
}

/// Address-based in-process message bus.
///
/// Cloning is cheap; all clones share the same registrations and [`BusId`].
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a new bus with a fresh identity.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                id: BusId(NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed)),
                addresses: Mutex::new(HashMap::new()),
                next_consumer: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the identity of this bus.
    pub fn id(&self) -> BusId {
        self.inner.id
    }

    /// Registers a consumer on `address`.
    pub fn consumer(&self, address: impl Into<String>) -> BusResult<Consumer> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let address = address.into();
        let id = self.inner.next_consumer.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner
            .addresses
            .lock()
            .entry(address.clone())
            .or_default()
            .consumers
            .push(Registration { id, tx });

        trace!(bus = %self.inner.id, address = %address, consumer = id, "Consumer registered");

        Ok(Consumer {
            id,
            address,
            rx,
            bus: Arc::downgrade(&self.inner),
        })
    }

    /// Sends `body` to one consumer of `address`.
    pub fn send(&self, address: &str, body: Value) -> BusResult<()> {
        trace!(bus = %self.inner.id, address = %address, "Send");
        self.inner.deliver_one(
            address,
            Delivery {
                address: address.to_string(),
                body,
                reply_tx: None,
            },
        )
    }

    /// Delivers `body` to every consumer of `address`.
    ///
    /// Publishing to an address nobody listens on is not an error.
    pub fn publish(&self, address: &str, body: Value) -> BusResult<()> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let mut addresses = self.inner.addresses.lock();
        let Some(entry) = addresses.get_mut(address) else {
            return Ok(());
        };

        entry.consumers.retain(|r| {
            r.tx.send(Delivery {
                address: address.to_string(),
                body: body.clone(),
                reply_tx: None,
            })
            .is_ok()
        });
        if entry.consumers.is_empty() {
            addresses.remove(address);
        }
        Ok(())
    }

    /// Sends `body` to one consumer of `address` and waits up to `timeout`
    /// for its reply.
    pub async fn request(&self, address: &str, body: Value, timeout: Duration) -> BusResult<Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.deliver_one(
            address,
            Delivery {
                address: address.to_string(),
                body,
                reply_tx: Some(reply_tx),
            },
        )?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(BusError::ReplyDropped {
                address: address.to_string(),
            }),
            Err(_) => Err(BusError::Timeout {
                address: address.to_string(),
                timeout,
            }),
        }
    }

    /// Returns the number of consumers currently registered on `address`.
    pub fn consumer_count(&self, address: &str) -> usize {
        self.inner
            .addresses
            .lock()
            .get(address)
            .map_or(0, |e| e.consumers.len())
    }

    /// Closes the bus, ending every consumer's stream.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.addresses.lock().clear();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
