//! The view a handler gets of a dispatched envelope.
//!
//! A [`Message`] owns the envelope's reply route, guarded by a [`ReplyLatch`]:
//! at most one reply ever leaves a message, however many clones of it exist.
//!
//! # Example
//!
//! ```rust,ignore
//! router.respond(r"echo\s+(.+)", |msg: Message| async move {
//!     let text = msg.matched_group(1).unwrap_or_default().to_string();
//!     if let Err(e) = msg.reply_with_ack(text).await {
//!         warn!(error = %e, "Echo was not delivered");
//!     }
//! })?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nonobot_core::EventBus;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{RouterError, RouterResult};

/// Default time to wait for a reply acknowledgement.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// One-shot flag guarding a reply route.
#[derive(Debug, Default)]
pub struct ReplyLatch(AtomicBool);

impl ReplyLatch {
    /// Creates an open latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the latch, returning `true` only for the first caller.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the latch has been claimed.
    pub fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct MessageInner {
    chat_id: String,
    body: String,
    groups: Vec<Option<String>>,
    bus: EventBus,
    reply_address: String,
    latch: ReplyLatch,
}

/// A matched inbound message.
///
/// Cloning is cheap and clones share the reply latch.
#[derive(Clone)]
pub struct Message {
    inner: Arc<MessageInner>,
}

impl Message {
    /// `groups` holds the captures of the matching pattern, group 1 first.
    pub(crate) fn new(
        bus: EventBus,
        chat_id: String,
        body: String,
        groups: Vec<Option<String>>,
        reply_address: String,
    ) -> Self {
        Self {
            inner: Arc::new(MessageInner {
                chat_id,
                body,
                groups,
                bus,
                reply_address,
                latch: ReplyLatch::new(),
            }),
        }
    }

    /// The conversation the message came from.
    pub fn chat_id(&self) -> &str {
        &self.inner.chat_id
    }

    /// The matched content.
    pub fn body(&self) -> &str {
        &self.inner.body
    }

    /// Returns capture group `index` of the matching pattern.
    ///
    /// Group `0` (the whole match) and indices past the last group yield
    /// `None`, as do groups that did not participate in the match.
    pub fn matched_group(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.inner.groups.get(index - 1)?.as_deref()
    }

    /// Number of capture groups in the matching pattern.
    pub fn group_count(&self) -> usize {
        self.inner.groups.len()
    }

    pub(crate) fn reply_address(&self) -> &str {
        &self.inner.reply_address
    }

    /// Whether a reply has already been sent.
    pub fn replied(&self) -> bool {
        self.inner.latch.is_claimed()
    }

    /// Sends `body` as the reply, without waiting for an acknowledgement.
    ///
    /// Only the first reply is transmitted; later calls do nothing.
    pub fn reply(&self, body: impl Into<String>) {
        if !self.inner.latch.try_claim() {
            trace!(chat_id = %self.inner.chat_id, "Reply already sent, ignoring");
            return;
        }
        let address = &self.inner.reply_address;
        if let Err(e) = self.inner.bus.send(address, Value::String(body.into())) {
            debug!(address = %address, error = %e, "Reply not delivered");
        }
    }

    /// Sends `body` as the reply and waits for it to be acknowledged,
    /// up to [`DEFAULT_ACK_TIMEOUT`].
    pub async fn reply_with_ack(&self, body: impl Into<String>) -> RouterResult<()> {
        self.reply_with_timeout(body, DEFAULT_ACK_TIMEOUT).await
    }

    /// Sends `body` as the reply and waits up to `timeout` for it to be
    /// acknowledged.
    ///
    /// Fails with [`RouterError::AlreadyReplied`] if a reply was already
    /// sent.
    pub async fn reply_with_timeout(
        &self,
        body: impl Into<String>,
        timeout: Duration,
    ) -> RouterResult<()> {
        if !self.inner.latch.try_claim() {
            return Err(RouterError::AlreadyReplied);
        }
        self.inner
            .bus
            .request(&self.inner.reply_address, Value::String(body.into()), timeout)
            .await
            .map(|_| ())
            .map_err(RouterError::Ack)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("chat_id", &self.inner.chat_id)
            .field("body", &self.inner.body)
            .field("groups", &self.inner.groups)
            .field("replied", &self.replied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nonobot_core::BusError;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn message(bus: &EventBus, groups: Vec<Option<String>>) -> Message {
        Message::new(
            bus.clone(),
            "chat".into(),
            "echo hello".into(),
            groups,
            "reply".into(),
        )
    }

    #[test]
    fn test_latch() {
        let latch = ReplyLatch::new();
        assert!(!latch.is_claimed());
        assert!(latch.try_claim());
        assert!(!latch.try_claim());
        assert!(latch.is_claimed());
    }

    #[test]
    fn test_matched_group_bounds() {
        let bus = EventBus::new();
        let msg = message(&bus, vec![Some("a".into()), None, Some("c".into())]);

        assert_eq!(msg.group_count(), 3);
        assert_eq!(msg.matched_group(0), None);
        assert_eq!(msg.matched_group(1), Some("a"));
        assert_eq!(msg.matched_group(2), None);
        assert_eq!(msg.matched_group(3), Some("c"));
        assert_eq!(msg.matched_group(4), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_once() {
        let bus = EventBus::new();
        let mut consumer = bus.consumer("reply").unwrap();
        let msg = message(&bus, vec![]);

        msg.reply("first");
        msg.clone().reply("second");

        assert_eq!(consumer.recv().await.unwrap().into_body(), json!("first"));
        assert_err!(tokio::time::timeout(Duration::from_millis(50), consumer.recv()).await);
    }

    #[tokio::test]
    async fn test_reply_with_ack() {
        let bus = EventBus::new();
        let mut consumer = bus.consumer("reply").unwrap();
        tokio::spawn(async move {
            while let Some(d) = consumer.recv().await {
                d.reply(Value::Null);
            }
        });

        let msg = message(&bus, vec![]);
        assert_ok!(msg.reply_with_ack("hello").await);

        let again = msg.reply_with_ack("again").await;
        assert!(matches!(again, Err(RouterError::AlreadyReplied)));
    }

    #[tokio::test]
    async fn test_ack_after_fire_and_forget() {
        let bus = EventBus::new();
        let _consumer = bus.consumer("reply").unwrap();
        let msg = message(&bus, vec![]);

        msg.reply("first");
        let err = msg
            .reply_with_timeout("second", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::AlreadyReplied));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_timeout() {
        let bus = EventBus::new();
        let _consumer = bus.consumer("reply").unwrap();
        let msg = message(&bus, vec![]);

        let err = msg
            .reply_with_timeout("hello", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Ack(BusError::Timeout { .. })));
        assert!(msg.replied());
    }
}
