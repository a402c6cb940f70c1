use crate::error::PersistenceError;

/// Durable key to string storage.
///
/// Keys arrive already namespaced by the manager. Implementations decide
/// their own retry policy; the strategy logs and drops every error.
pub trait PersistenceAdapter: Send + Sync {
    /// Load the payload stored under `key`, if any.
    fn load_raw(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `payload` under `key`, replacing any previous payload.
    fn save_raw(&self, key: &str, payload: &str) -> Result<(), PersistenceError>;

    /// Remove the payload under `key`. Removing a missing key succeeds.
    fn remove_raw(&self, key: &str) -> Result<(), PersistenceError>;
}
