//! The notification channel: a minimal in-process broadcast bus.
//!
//! Subscribers are callbacks invoked synchronously after every registry
//! cache mutation. Delivery order is unspecified; callbacks must be cheap
//! and must not block. Callbacks are invoked outside the subscriber lock,
//! so a callback may re-enter the registry (the usual pattern: recompute a
//! snapshot via `access`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Callback = Arc<dyn Fn() + Send + Sync>;

/// The live subscriber set. Ephemeral: grows as observers attach, shrinks
/// as they detach; no persistence.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    callbacks: Mutex<HashMap<u64, Callback>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub(crate) fn add(&self, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, callback);
        id
    }

    /// Remove a subscriber. Removing an id that is already gone is a no-op,
    /// which makes unsubscription idempotent.
    pub(crate) fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Invoke every currently-subscribed callback, in unspecified order.
    ///
    /// Callbacks are cloned out first and invoked with the lock released:
    /// a callback that re-enters the registry (or subscribes/unsubscribes)
    /// must not deadlock against us.
    pub(crate) fn notify(&self) {
        let callbacks: Vec<Callback> = self.lock().values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Callback>> {
        // A poisoned subscriber set only means some callback panicked;
        // the map itself is still coherent.
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII guard for a registry subscription.
///
/// Dropping the guard unsubscribes, so a subscription cannot outlive the
/// observer that holds it. [`Subscription::unsubscribe`] is available for
/// explicit early release and is safe to combine with the drop.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    subscribers: Arc<SubscriberSet>,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(subscribers: Arc<SubscriberSet>, id: u64) -> Self {
        Self { subscribers, id }
    }

    /// Stop delivery to this subscriber. Idempotent.
    pub fn unsubscribe(&self) {
        self.subscribers.remove(self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscribers.remove(self.id);
    }
}
