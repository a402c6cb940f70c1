use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::config::StateConfig;
use crate::error::{ConfigError, StateError};
use crate::persistence::{PersistenceAdapter, PersistenceStrategy};
use crate::store::Store;
use crate::strategy::{Attachment, StateValue};
use crate::sync::{SyncStrategy, SyncTransport};

struct StoreEntry {
    store: Box<dyn Any + Send + Sync>,
    attachments: Vec<Box<dyn Attachment>>,
}

impl StoreEntry {
    fn detach(&mut self) -> bool {
        let had_any = !self.attachments.is_empty();
        for attachment in self.attachments.drain(..) {
            attachment.detach();
        }
        had_any
    }
}

struct ManagerInner {
    config: StateConfig,
    stores: RwLock<HashMap<String, StoreEntry>>,
    persistence: Option<PersistenceStrategy>,
    sync: Option<SyncStrategy>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        for entry in self.stores.get_mut().values_mut() {
            entry.detach();
        }
    }
}

/// Keyed registry handing out one [`Store`] per key.
///
/// Stores are created on first request and wired to the configured
/// persistence and sync strategies. `StateManager` is a handle: clones share
/// the same registry. When the last handle drops, every strategy is
/// detached.
///
/// # Examples
///
/// ```
/// use statemesh::StateManager;
///
/// let manager = StateManager::new();
/// let a = manager.store("count", 1).unwrap();
/// let b = manager.store("count", 2).unwrap();
///
/// assert!(a.ptr_eq(&b));
/// assert_eq!(b.get(), 1);
/// ```
#[derive(Clone)]
pub struct StateManager {
    inner: Arc<ManagerInner>,
}

impl StateManager {
    /// A manager with no persistence and no sync.
    pub fn new() -> Self {
        Self::from_parts(StateConfig::default(), None, None)
    }

    /// Start building a manager with strategies.
    pub fn builder() -> StateManagerBuilder {
        StateManagerBuilder::default()
    }

    fn from_parts(
        config: StateConfig,
        persistence: Option<PersistenceStrategy>,
        sync: Option<SyncStrategy>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                stores: RwLock::new(HashMap::new()),
                persistence,
                sync,
            }),
        }
    }

    /// The config this manager was built with.
    pub fn config(&self) -> &StateConfig {
        &self.inner.config
    }

    /// Get the store for `key`, creating it with `initial` if needed.
    ///
    /// `initial` is ignored when the store already exists. A newly created
    /// store is attached to persistence first (which may replace `initial`
    /// with the persisted value) and then to sync.
    ///
    /// Fails only if `key` already holds a store of a different value type.
    pub fn store<T: StateValue>(&self, key: &str, initial: T) -> Result<Store<T>, StateError> {
        if let Some(existing) = self.lookup::<T>(key) {
            return existing;
        }

        let mut stores = self.inner.stores.write();
        if let Some(entry) = stores.get(key) {
            return downcast(key, entry);
        }

        let store = Store::new(initial);
        let qualified = self.inner.config.qualify(key);
        let mut attachments: Vec<Box<dyn Attachment>> = Vec::new();

        if let Some(persistence) = &self.inner.persistence {
            attachments.push(Box::new(persistence.attach(&qualified, &store)));
        }
        if let Some(sync) = &self.inner.sync {
            if let Some(attachment) = sync.attach(&qualified, &store) {
                attachments.push(Box::new(attachment));
            }
        }

        let strategies: Vec<&'static str> = attachments.iter().map(|a| a.strategy()).collect();
        tracing::debug!(key, ?strategies, "Created store");

        stores.insert(
            key.to_string(),
            StoreEntry {
                store: Box::new(store.clone()),
                attachments,
            },
        );
        Ok(store)
    }

    fn lookup<T: StateValue>(&self, key: &str) -> Option<Result<Store<T>, StateError>> {
        let stores = self.inner.stores.read();
        stores.get(key).map(|entry| downcast(key, entry))
    }

    /// Whether a store exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.stores.read().contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.stores.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.inner.stores.read().len()
    }

    /// Whether no store has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.inner.stores.read().is_empty()
    }

    /// Tear down the strategies attached to `key`.
    ///
    /// The store stays registered and usable; it just stops persisting and
    /// syncing. Returns `false` if nothing was attached.
    pub fn detach(&self, key: &str) -> bool {
        let mut stores = self.inner.stores.write();
        match stores.get_mut(key) {
            Some(entry) => {
                let detached = entry.detach();
                if detached {
                    tracing::debug!(key, "Detached store strategies");
                }
                detached
            }
            None => false,
        }
    }

    /// Tear down the strategies of every store.
    pub fn detach_all(&self) {
        let mut stores = self.inner.stores.write();
        for entry in stores.values_mut() {
            entry.detach();
        }
    }
}

fn downcast<T: StateValue>(key: &str, entry: &StoreEntry) -> Result<Store<T>, StateError> {
    entry
        .store
        .downcast_ref::<Store<T>>()
        .cloned()
        .ok_or_else(|| StateError::TypeMismatch {
            key: key.to_string(),
            requested: std::any::type_name::<T>(),
        })
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateManager")
            .field("config", &self.inner.config)
            .field("stores", &self.keys())
            .finish()
    }
}

/// Builder for [`StateManager`].
///
/// The config decides which strategies run; an adapter or transport supplied
/// for a disabled strategy is ignored.
#[derive(Default)]
pub struct StateManagerBuilder {
    config: StateConfig,
    adapter: Option<Arc<dyn PersistenceAdapter>>,
    transport: Option<Arc<dyn SyncTransport>>,
}

impl StateManagerBuilder {
    /// Set the config deciding which strategies run.
    pub fn config(mut self, config: StateConfig) -> Self {
        self.config = config;
        self
    }

    /// Backend for the persistence strategy.
    pub fn persistence<A: PersistenceAdapter + 'static>(mut self, adapter: A) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    /// Transport for the sync strategy.
    pub fn transport<S: SyncTransport + 'static>(mut self, transport: S) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Validate the config and build the manager.
    pub fn build(self) -> Result<StateManager, StateError> {
        self.config.validate()?;

        let persistence = match (self.config.persistence, self.adapter) {
            (true, Some(adapter)) => Some(PersistenceStrategy::new(adapter)),
            (true, None) => {
                return Err(ConfigError::ValidationError {
                    message: "persistence is enabled but no adapter was supplied".to_string(),
                }
                .into())
            }
            (false, Some(_)) => {
                tracing::debug!("Persistence disabled, ignoring supplied adapter");
                None
            }
            (false, None) => None,
        };

        let sync = match (self.config.sync, self.transport) {
            (true, Some(transport)) => Some(SyncStrategy::new(transport)),
            (true, None) => {
                return Err(ConfigError::ValidationError {
                    message: "sync is enabled but no transport was supplied".to_string(),
                }
                .into())
            }
            (false, Some(_)) => {
                tracing::debug!("Sync disabled, ignoring supplied transport");
                None
            }
            (false, None) => None,
        };

        Ok(StateManager::from_parts(self.config, persistence, sync))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryAdapter;
    use crate::sync::LocalTransport;

    fn persistent(adapter: &MemoryAdapter) -> StateManager {
        StateManager::builder()
            .config(StateConfig::default().with_persistence(true))
            .persistence(adapter.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn first_initial_value_wins() {
        let manager = StateManager::new();
        let a = manager.store("k", "A".to_string()).unwrap();
        let b = manager.store("k", "B".to_string()).unwrap();

        assert!(a.ptr_eq(&b));
        assert_eq!(b.get(), "A");
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let manager = StateManager::new();
        manager.store("k", 1i32).unwrap();

        let err = manager.store("k", "text".to_string()).unwrap_err();
        assert!(matches!(err, StateError::TypeMismatch { ref key, .. } if key == "k"));
    }

    #[test]
    fn keys_are_sorted() {
        let manager = StateManager::new();
        manager.store("b", 1).unwrap();
        manager.store("a", 2).unwrap();

        assert_eq!(manager.keys(), vec!["a".to_string(), "b".to_string()]);
        assert!(manager.contains("a"));
        assert!(!manager.contains("c"));
    }

    #[test]
    fn clones_share_the_registry() {
        let manager = StateManager::new();
        let other = manager.clone();

        let a = manager.store("k", 1).unwrap();
        let b = other.store("k", 2).unwrap();

        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn persistence_uses_namespaced_keys() {
        let adapter = MemoryAdapter::new();
        let manager = persistent(&adapter);

        let store = manager.store("count", 1).unwrap();
        store.set(2);

        assert_eq!(adapter.get("statemesh:count").as_deref(), Some("2"));
    }

    #[test]
    fn detach_stops_persistence_but_keeps_store() {
        let adapter = MemoryAdapter::new();
        let manager = persistent(&adapter);
        let store = manager.store("count", 1).unwrap();

        assert!(manager.detach("count"));
        assert!(!manager.detach("count"));
        assert!(!manager.detach("missing"));
        store.set(5);

        assert_eq!(adapter.get("statemesh:count").as_deref(), Some("1"));
        assert_eq!(manager.store("count", 0).unwrap().get(), 5);
    }

    #[test]
    fn dropping_the_manager_detaches() {
        let adapter = MemoryAdapter::new();
        let manager = persistent(&adapter);
        let store = manager.store("count", 1).unwrap();

        drop(manager);
        store.set(3);

        assert_eq!(adapter.get("statemesh:count").as_deref(), Some("1"));
    }

    #[test]
    fn enabled_strategy_requires_backend() {
        let err = StateManager::builder()
            .config(StateConfig::default().with_persistence(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, StateError::Config(_)));

        let err = StateManager::builder()
            .config(StateConfig::default().with_sync(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, StateError::Config(_)));
    }

    #[test]
    fn disabled_strategy_ignores_backend() {
        let adapter = MemoryAdapter::new();
        let manager = StateManager::builder()
            .persistence(adapter.clone())
            .transport(LocalTransport::new())
            .build()
            .unwrap();

        manager.store("k", 1).unwrap().set(2);

        assert!(adapter.is_empty());
    }

    #[test]
    fn detach_all_closes_channels() {
        let transport = LocalTransport::new();
        let manager = StateManager::builder()
            .config(StateConfig::default().with_sync(true))
            .transport(transport.clone())
            .build()
            .unwrap();

        manager.store("a", 1).unwrap();
        manager.store("b", 1).unwrap();
        assert_eq!(transport.endpoint_count("statemesh:a"), 1);

        manager.detach_all();

        assert_eq!(transport.endpoint_count("statemesh:a"), 0);
        assert_eq!(transport.endpoint_count("statemesh:b"), 0);
    }
}
