use parking_lot::{Mutex, ReentrantMutex, RwLock, RwLockUpgradableReadGuard};
use std::any::{Any, TypeId};
use std::cell::Cell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use super::selector::{Selector, SelectorKey};
use super::subscription::{RemoveSubscriber, Subscriber, SubscriberList, Subscription};

type Equality<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;
type DerivedCache = HashMap<(SelectorKey, TypeId), Box<dyn Any + Send + Sync>>;

/// Maximum nesting of notification passes on one thread.
///
/// A subscriber that writes to a store re-enters notification synchronously.
/// Past this depth the write is still committed but its pass is skipped.
pub const MAX_NOTIFY_DEPTH: usize = 64;

thread_local! {
    static NOTIFY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Option<Self> {
        NOTIFY_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= MAX_NOTIFY_DEPTH {
                None
            } else {
                depth.set(current + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        NOTIFY_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

struct StoreInner<T> {
    // Held from compute through the end of the notification pass.
    commit: ReentrantMutex<()>,
    state: RwLock<T>,
    equality: Equality<T>,
    subscribers: Arc<Mutex<SubscriberList<T>>>,
    derived: Mutex<DerivedCache>,
}

/// A thread-safe observable value cell.
///
/// Every change is pushed synchronously to the store's subscribers before
/// `set` returns. Writes that compare equal to the current value under the
/// store's equality policy are dropped without notifying anyone.
///
/// `Store` is a handle: clones share the same value and subscribers.
///
/// # Examples
///
/// ```
/// use statemesh::Store;
/// use std::sync::{Arc, Mutex};
///
/// let store = Store::new(0);
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = log.clone();
/// let _subscription = store.subscribe(move |v| sink.lock().unwrap().push(*v));
///
/// store.set(5);
/// store.update(|n| n + 1);
/// assert_eq!(*log.lock().unwrap(), vec![0, 5, 6]);
/// ```
pub struct Store<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Store<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new store that suppresses writes equal to the current value.
    pub fn new(initial: T) -> Self {
        Self::with_equality(initial, |a: &T, b: &T| a == b)
    }
}

impl<T> Store<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a store with a custom equality policy.
    ///
    /// `equal(current, next)` returning `true` turns a write into a no-op.
    /// The policy may read the store but must not write to it.
    pub fn with_equality<F>(initial: T, equal: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(StoreInner {
                commit: ReentrantMutex::new(()),
                state: RwLock::new(initial),
                equality: Arc::new(equal),
                subscribers: Arc::new(Mutex::new(SubscriberList::new())),
                derived: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a store that notifies on every write.
    pub fn always_notify(initial: T) -> Self {
        Self::with_equality(initial, |_: &T, _: &T| false)
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.state.read().clone()
    }

    /// Read the current value without cloning.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let state = self.inner.state.read();
        f(&state)
    }

    /// Replace the value.
    ///
    /// Returns `true` if the value changed and subscribers were notified.
    pub fn set(&self, next: T) -> bool {
        self.update(move |_| next)
    }

    /// Compute the next value from the current one.
    ///
    /// The updater may read the store (`get`, `read`) but writes from other
    /// threads wait until this change has been committed and every
    /// subscriber has seen it. If the updater panics, the store keeps its
    /// previous value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        match self.try_update(|current| Ok::<T, Infallible>(f(current))) {
            Ok(changed) => changed,
            Err(never) => match never {},
        }
    }

    /// Like [`update`](Store::update), but the updater may fail.
    ///
    /// An error leaves the value untouched and is returned to the caller.
    pub fn try_update<F, E>(&self, f: F) -> Result<bool, E>
    where
        F: FnOnce(&T) -> Result<T, E>,
    {
        let _commit = self.inner.commit.lock();

        let changed = {
            let state = self.inner.state.upgradable_read();
            let next = f(&state)?;
            if (self.inner.equality)(&state, &next) {
                false
            } else {
                let mut state = RwLockUpgradableReadGuard::upgrade(state);
                *state = next;
                true
            }
        };

        if changed {
            self.notify();
        }
        Ok(changed)
    }

    /// Subscribe to changes.
    ///
    /// The callback runs once immediately with the current value, then after
    /// every change until the returned [`Subscription`] is unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _commit = self.inner.commit.lock();
        let callback: Subscriber<T> = Arc::new(callback);
        let id = self.inner.subscribers.lock().insert(Arc::clone(&callback));

        let value = self.get();
        callback(&value);

        let list: Arc<dyn RemoveSubscriber> = self.inner.subscribers.clone();
        Subscription::new(id, Arc::downgrade(&list))
    }

    /// Get the store derived from this one through `selector`.
    ///
    /// The first call for a given selector key creates a store seeded with
    /// the projected value and keeps it in sync; later calls with the same
    /// key return that same store without subscribing again.
    pub fn derive<R>(&self, selector: &Selector<T, R>) -> Store<R>
    where
        R: Clone + PartialEq + Send + Sync + 'static,
    {
        let cache_key = (selector.key().clone(), TypeId::of::<R>());
        if let Some(existing) = self.cached_derived::<R>(&cache_key) {
            return existing;
        }

        // Seed and replay happen between passes, so the seed is never stale.
        let _commit = self.inner.commit.lock();
        let store = Store::new(selector.apply(&self.get()));
        let target = store.clone();
        let project = selector.clone();

        // Lives as long as the source; derived stores are never torn down.
        let subscription = self.subscribe(move |value| {
            target.set(project.apply(value));
        });

        let mut derived = self.inner.derived.lock();
        if let Some(existing) = derived
            .get(&cache_key)
            .and_then(|entry| entry.downcast_ref::<Store<R>>())
        {
            // Created by another caller while this one waited or seeded.
            subscription.unsubscribe();
            return existing.clone();
        }

        tracing::trace!(selector = %selector.key(), "created derived store");
        derived.insert(cache_key, Box::new(store.clone()));
        store
    }

    fn cached_derived<R>(&self, cache_key: &(SelectorKey, TypeId)) -> Option<Store<R>>
    where
        R: Clone + Send + Sync + 'static,
    {
        self.inner
            .derived
            .lock()
            .get(cache_key)
            .and_then(|entry| entry.downcast_ref::<Store<R>>())
            .cloned()
    }

    /// Shorthand for `derive(&Selector::new(key, f))`.
    pub fn derive_with<K, R, F>(&self, key: K, f: F) -> Store<R>
    where
        K: Into<SelectorKey>,
        R: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.derive(&Selector::new(key, f))
    }

    /// Number of registered subscribers, derived-store updaters included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Number of memoized derived stores.
    pub fn derived_count(&self) -> usize {
        self.inner.derived.lock().len()
    }

    /// Whether two handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Notify all subscribers of a state change.
    ///
    /// Iterates a snapshot so subscribers added or removed mid-pass do not
    /// affect it. Each subscriber sees the value current at its own call, so
    /// a nested write made by an earlier subscriber is visible to later ones.
    fn notify(&self) {
        let Some(_depth) = DepthGuard::enter() else {
            tracing::error!(
                max_depth = MAX_NOTIFY_DEPTH,
                "Notification depth exceeded, skipping nested pass (cyclic subscriber wiring?)"
            );
            return;
        };

        let snapshot = self.inner.subscribers.lock().snapshot();
        tracing::trace!(subscribers = snapshot.len(), "notifying subscribers");

        for subscriber in snapshot {
            let value = self.get();
            subscriber(&value);
        }
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &*self.inner.state.read())
            .field("subscribers", &self.inner.subscribers.lock().len())
            .finish()
    }
}
