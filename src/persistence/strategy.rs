use std::sync::Arc;

use super::adapter::PersistenceAdapter;
use crate::error::PersistenceError;
use crate::store::{Store, Subscription};
use crate::strategy::{Attachment, StateValue};

/// Mirrors a store into a [`PersistenceAdapter`].
///
/// On attach the persisted payload, if any, replaces the store's value. From
/// then on every notification (the subscribe-time replay included) is
/// written back. All adapter and serialization failures are logged and
/// absorbed.
#[derive(Clone)]
pub struct PersistenceStrategy {
    adapter: Arc<dyn PersistenceAdapter>,
}

impl PersistenceStrategy {
    /// Persist through `adapter`.
    pub fn new(adapter: Arc<dyn PersistenceAdapter>) -> Self {
        Self { adapter }
    }

    /// The backend in use.
    pub fn adapter(&self) -> &Arc<dyn PersistenceAdapter> {
        &self.adapter
    }

    /// Restore `store` from `key` and start writing its changes back.
    pub fn attach<T: StateValue>(&self, key: &str, store: &Store<T>) -> PersistenceAttachment {
        self.restore(key, store);

        let adapter = Arc::clone(&self.adapter);
        let storage_key = key.to_string();
        let subscription = store.subscribe(move |value| {
            if let Err(e) = save(adapter.as_ref(), &storage_key, value) {
                tracing::warn!(key = %storage_key, error = %e, "Failed to persist state");
            }
        });

        PersistenceAttachment {
            key: key.to_string(),
            subscription,
        }
    }

    fn restore<T: StateValue>(&self, key: &str, store: &Store<T>) {
        let raw = match self.adapter.load_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "No persisted state, keeping initial value");
                return;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read persisted state");
                return;
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                store.set(value);
                tracing::debug!(key, "Restored persisted state");
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to load persisted state, keeping initial value");
            }
        }
    }
}

fn save<T: StateValue>(
    adapter: &dyn PersistenceAdapter,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let payload = serde_json::to_string(value).map_err(|source| PersistenceError::Encode {
        key: key.to_string(),
        source,
    })?;
    adapter.save_raw(key, &payload)
}

/// Live persistence hook on one store.
pub struct PersistenceAttachment {
    key: String,
    subscription: Subscription,
}

impl PersistenceAttachment {
    /// Storage key this attachment writes to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether changes are still being saved.
    pub fn is_attached(&self) -> bool {
        self.subscription.is_active()
    }
}

impl Attachment for PersistenceAttachment {
    fn strategy(&self) -> &'static str {
        "persistence"
    }

    fn detach(&self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryAdapter;

    struct BrokenAdapter;

    impl PersistenceAdapter for BrokenAdapter {
        fn load_raw(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Err(PersistenceError::Unavailable("offline".to_string()))
        }

        fn save_raw(&self, _key: &str, _payload: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".to_string()))
        }

        fn remove_raw(&self, _key: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[test]
    fn attach_writes_current_value() {
        let adapter = MemoryAdapter::new();
        let strategy = PersistenceStrategy::new(Arc::new(adapter.clone()));
        let store = Store::new(3);

        let _attachment = strategy.attach("n", &store);

        assert_eq!(adapter.get("n").as_deref(), Some("3"));
        store.set(4);
        assert_eq!(adapter.get("n").as_deref(), Some("4"));
    }

    #[test]
    fn persisted_value_wins_over_initial() {
        let adapter = MemoryAdapter::new();
        adapter.insert("n", "99");
        let strategy = PersistenceStrategy::new(Arc::new(adapter));
        let store = Store::new(0);

        let _attachment = strategy.attach("n", &store);

        assert_eq!(store.get(), 99);
    }

    #[test]
    fn malformed_payload_keeps_initial_value() {
        let adapter = MemoryAdapter::new();
        adapter.insert("n", "{not json");
        let strategy = PersistenceStrategy::new(Arc::new(adapter.clone()));
        let store = Store::new(5);

        let _attachment = strategy.attach("n", &store);

        assert_eq!(store.get(), 5);
        // Replay overwrites the corrupt payload.
        assert_eq!(adapter.get("n").as_deref(), Some("5"));
    }

    #[test]
    fn adapter_failures_do_not_reach_the_writer() {
        let strategy = PersistenceStrategy::new(Arc::new(BrokenAdapter));
        let store = Store::new(1);

        let _attachment = strategy.attach("n", &store);

        assert!(store.set(2));
        assert_eq!(store.get(), 2);
    }

    #[test]
    fn detach_stops_writes() {
        let adapter = MemoryAdapter::new();
        let strategy = PersistenceStrategy::new(Arc::new(adapter.clone()));
        let store = Store::new(1);

        let attachment = strategy.attach("n", &store);
        attachment.detach();
        attachment.detach();
        store.set(2);

        assert!(!attachment.is_attached());
        assert_eq!(adapter.get("n").as_deref(), Some("1"));
        assert_eq!(attachment.strategy(), "persistence");
    }
}
