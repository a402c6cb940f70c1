use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub(crate) type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered subscriber registry of a single store.
pub(crate) struct SubscriberList<T> {
    next_id: u64,
    entries: Vec<(u64, Subscriber<T>)>,
}

impl<T> SubscriberList<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, subscriber: Subscriber<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, subscriber));
        id
    }

    /// Copy of the current subscribers, in insertion order.
    pub(crate) fn snapshot(&self) -> Vec<Subscriber<T>> {
        self.entries
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Type-erased removal so [`Subscription`] need not carry the value type.
pub(crate) trait RemoveSubscriber: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

impl<T: 'static> RemoveSubscriber for Mutex<SubscriberList<T>> {
    fn remove(&self, id: u64) -> bool {
        let mut list = self.lock();
        let before = list.entries.len();
        list.entries.retain(|(entry_id, _)| *entry_id != id);
        list.entries.len() != before
    }
}

/// Capability to remove one subscriber from a store.
///
/// Dropping a `Subscription` leaves the subscriber registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[must_use = "dropping a Subscription keeps the subscriber registered forever"]
pub struct Subscription {
    id: u64,
    list: Weak<dyn RemoveSubscriber>,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(id: u64, list: Weak<dyn RemoveSubscriber>) -> Self {
        Self {
            id,
            list,
            active: AtomicBool::new(true),
        }
    }

    /// Remove the subscriber. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(list) = self.list.upgrade() {
            list.remove(self.id);
        }
    }

    /// Whether `unsubscribe` has not yet been called and the store is alive.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && self.list.strong_count() > 0
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
