use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::adapter::PersistenceAdapter;
use crate::error::PersistenceError;

/// In-memory persistence backend.
///
/// Clones share the same backing map, so two managers handed clones of one
/// adapter see each other's writes.
#[derive(Clone, Default, Debug)]
pub struct MemoryAdapter {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryAdapter {
    /// An empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw payload under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Seed a raw payload, bypassing serialization.
    pub fn insert(&self, key: impl Into<String>, payload: impl Into<String>) {
        self.entries.write().insert(key.into(), payload.into());
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl PersistenceAdapter for MemoryAdapter {
    fn load_raw(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get(key))
    }

    fn save_raw(&self, key: &str, payload: &str) -> Result<(), PersistenceError> {
        self.insert(key, payload);
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), PersistenceError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_backing() {
        let adapter = MemoryAdapter::new();
        let other = adapter.clone();

        adapter.save_raw("k", "42").unwrap();

        assert_eq!(other.load_raw("k").unwrap().as_deref(), Some("42"));
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn remove_missing_key_succeeds() {
        let adapter = MemoryAdapter::new();
        adapter.remove_raw("missing").unwrap();
        assert!(adapter.is_empty());
    }
}
