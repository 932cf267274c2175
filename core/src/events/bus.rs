//! Publish-subscribe registry with handle-based unsubscription.
//!
//! An effect that is stopped mid-update must be able to detach its handlers
//! without leaving anything dangling, so subscriptions are identified by a
//! monotonically increasing handle rather than by handler identity.
//!
//! Handlers run under the registry lock and must not publish back into the
//! bus.

use std::sync::Mutex;

use super::GameEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type Handler = Box<dyn FnMut(&GameEvent) + Send>;

#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        handler: impl FnMut(&GameEvent) + Send + 'static,
    ) -> SubscriptionHandle {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, Box::new(handler)));
        SubscriptionHandle(id)
    }

    /// Remove a subscription. Unknown handles are ignored, so unsubscribing
    /// twice is safe.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.handlers.retain(|(id, _)| *id != handle.0);
    }

    pub fn publish(&self, event: &GameEvent) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        for (_, handler) in inner.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("event bus lock poisoned").handlers.len()
    }
}
