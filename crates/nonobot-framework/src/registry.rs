//! Router registry.
//!
//! Hands out one shared [`ChatRouter`] per (bus, name) pair. The registry is
//! an explicit object: the host builds one and passes it to whoever needs
//! shared routers.

use std::collections::HashMap;
use std::fmt;

use nonobot_core::{BusId, EventBus};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::RouterResult;
use crate::router::ChatRouter;

/// Identifies a shared router.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouterKey {
    /// The bus the router consumes from.
    pub bus: BusId,
    /// The router's name.
    pub name: String,
}

impl RouterKey {
    /// Creates a key.
    pub fn new(bus: BusId, name: impl Into<String>) -> Self {
        Self {
            bus,
            name: name.into(),
        }
    }
}

impl fmt::Display for RouterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bus, self.name)
    }
}

/// Table of shared routers.
#[derive(Default)]
pub struct RouterRegistry {
    routers: Mutex<HashMap<RouterKey, ChatRouter>>,
}

impl RouterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the router for (`bus`, `name`), creating it on first use.
    ///
    /// Concurrent callers with the same key always get the same router. A
    /// router that has been closed is replaced by a fresh one.
    pub fn get_or_create(&self, bus: &EventBus, name: &str) -> ChatRouter {
        let key = RouterKey::new(bus.id(), name);
        let mut routers = self.routers.lock();

        if let Some(router) = routers.get(&key) {
            if !router.is_closed() {
                return router.clone();
            }
            debug!(key = %key, "Replacing closed router");
        }

        let router = ChatRouter::new(bus.clone(), name);
        routers.insert(key.clone(), router.clone());
        debug!(key = %key, "Router created");
        router
    }

    /// Returns the router for `key`, if one exists.
    pub fn get(&self, key: &RouterKey) -> Option<ChatRouter> {
        self.routers.lock().get(key).cloned()
    }

    /// Invokes `callback` with `router`'s initialization outcome.
    ///
    /// The callback runs immediately when the outcome is already known and
    /// is queued otherwise. With a `handle`, it is spawned onto that runtime
    /// instead of running on the caller's thread.
    pub fn register_for_init<F>(&self, router: &ChatRouter, callback: F, handle: Option<&Handle>)
    where
        F: FnOnce(RouterResult<()>) + Send + 'static,
    {
        match handle {
            Some(handle) => {
                let handle = handle.clone();
                router.on_init(move |outcome| {
                    handle.spawn(async move { callback(outcome) });
                });
            }
            None => router.on_init(callback),
        }
    }

    /// Number of routers in the table.
    pub fn len(&self) -> usize {
        self.routers.lock().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routers.lock().is_empty()
    }

    /// Closes and forgets every router.
    pub fn close_all(&self) {
        let routers: Vec<ChatRouter> = self.routers.lock().drain().map(|(_, r)| r).collect();
        for router in routers {
            router.close();
        }
    }
}

impl fmt::Debug for RouterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterRegistry")
            .field("routers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;
    use tokio_test::assert_ok;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create() {
        let registry = Arc::new(RouterRegistry::new());
        let bus = EventBus::new();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let bus = bus.clone();
            tasks.push(tokio::spawn(async move {
                let router = registry.get_or_create(&bus, "nono");
                router.respond("x", |_| async {}).unwrap();
                router
            }));
        }

        let mut routers = Vec::new();
        for task in tasks {
            routers.push(task.await.unwrap());
        }

        assert_eq!(registry.len(), 1);
        assert_eq!(routers[0].handlers().len(), 16);
        for router in &routers {
            assert_eq!(router.handlers().len(), 16);
        }
    }

    #[tokio::test]
    async fn test_router_without_consumer_is_replaced() {
        let registry = RouterRegistry::new();
        let bus = EventBus::new();
        let router = registry.get_or_create(&bus, "nono");
        assert_ok!(router.initialized().await);

        bus.close();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !router.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let replacement = registry.get_or_create(&bus, "nono");
        assert!(replacement.initialized().await.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_distinct() {
        let registry = RouterRegistry::new();
        let bus_a = EventBus::new();
        let bus_b = EventBus::new();

        let a = registry.get_or_create(&bus_a, "nono");
        let b = registry.get_or_create(&bus_b, "nono");
        let c = registry.get_or_create(&bus_a, "r2d2");
        a.respond("a", |_| async {}).unwrap();

        assert_eq!(registry.len(), 3);
        assert!(b.handlers().is_empty());
        assert!(c.handlers().is_empty());
        assert_eq!(registry.get_or_create(&bus_a, "nono").handlers().len(), 1);
        assert!(registry.get(&RouterKey::new(bus_b.id(), "nono")).is_some());
    }

    #[tokio::test]
    async fn test_register_for_init_after_ready() {
        let registry = RouterRegistry::new();
        let bus = EventBus::new();
        let router = registry.get_or_create(&bus, "nono");
        assert_ok!(router.initialized().await);

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        registry.register_for_init(
            &router,
            move |outcome| {
                assert!(outcome.is_ok());
                c.fetch_add(1, Ordering::SeqCst);
            },
            None,
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_for_init_queued_and_marshalled() {
        let registry = RouterRegistry::new();
        let bus = EventBus::new();
        let router = registry.get_or_create(&bus, "nono");

        let (tx, rx) = oneshot::channel();
        registry.register_for_init(
            &router,
            move |outcome| {
                let _ = tx.send(outcome.is_ok());
            },
            Some(&Handle::current()),
        );
        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_router_is_replaced() {
        let registry = RouterRegistry::new();
        let bus = EventBus::new();

        let first = registry.get_or_create(&bus, "nono");
        first.respond("x", |_| async {}).unwrap();
        first.close();

        let second = registry.get_or_create(&bus, "nono");
        assert!(!second.is_closed());
        assert!(second.handlers().is_empty());
        assert_eq!(registry.len(), 1);
    }
}
