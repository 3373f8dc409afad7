//! Process-wide event stream.
//!
//! A simple typed pub/sub used for observability events: dead letters,
//! ledger notifications, supervision decisions. Publishing is synchronous
//! on the publisher's thread.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Handler = Box<dyn Fn(&dyn Any) + Send + Sync>;

/// Identifier returned by [`EventStream::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Typed publish/subscribe bus.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventStream {
    inner: Arc<EventStreamInner>,
}

#[derive(Default)]
struct EventStreamInner {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<u64, Handler>>,
}

impl EventStream {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type `E`. The handler runs on the publishing
    /// thread; keep it quick.
    pub fn subscribe<E: Any>(
        &self,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let erased: Handler = Box::new(move |event| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.inner.handlers.write().insert(id, erased);
        SubscriptionId(id)
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.handlers.write().remove(&id.0);
    }

    /// Deliver `event` to every subscriber of its type.
    pub fn publish<E: Any>(&self, event: &E) {
        let handlers = self.inner.handlers.read();
        for handler in handlers.values() {
            handler(event);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.read().len()
    }
}
