// ── Change observers ──
//
// Presentation layers register plain callbacks and are told "something
// changed"; they re-read whatever snapshot they render. Subscriptions are
// identified by handle, so the same callback may be registered twice and
// removed independently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Callback invoked on every change notification.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`ObserverHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of subscribers with handle-based removal.
#[derive(Default)]
pub struct ObserverHub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.subscribe_arc(Arc::new(callback))
    }

    /// Register an already shared callback.
    pub fn subscribe_arc(&self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, callback));
        id
    }

    /// Remove one subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Invoke every subscriber in registration order.
    ///
    /// The list is copied first, so callbacks may subscribe or
    /// unsubscribe without deadlocking.
    pub fn notify(&self) {
        let callbacks: Vec<Callback> = self.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Callback)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        let cb: Callback = Arc::new(move || {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });
        (hits, cb)
    }

    #[test]
    fn notifies_every_subscriber() {
        let hub = ObserverHub::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        hub.subscribe_arc(cb_a);
        hub.subscribe_arc(cb_b);

        hub.notify();
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn same_callback_twice_is_two_subscriptions() {
        let hub = ObserverHub::new();
        let (hits, cb) = counter();
        let first = hub.subscribe_arc(Arc::clone(&cb));
        let _second = hub.subscribe_arc(cb);

        hub.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(hub.unsubscribe(first));
        hub.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn unsubscribe_unknown_handle_is_noop() {
        let hub = ObserverHub::new();
        let id = hub.subscribe(|| {});
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert!(hub.is_empty());
    }

    #[test]
    fn callbacks_may_unsubscribe_themselves() {
        let hub = Arc::new(ObserverHub::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let hub_cb = Arc::clone(&hub);
        let slot_cb = Arc::clone(&slot);
        let id = hub.subscribe(move || {
            if let Some(id) = *slot_cb.lock().unwrap_or_else(PoisonError::into_inner) {
                hub_cb.unsubscribe(id);
            }
        });
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);

        hub.notify();
        assert!(hub.is_empty());
    }
}
