//! Side-effect strategies attached to managed stores.
//!
//! A strategy hooks into a store when the manager creates it and hands back
//! an [`Attachment`] that can tear the hook down again.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Values a [`StateManager`](crate::StateManager) can hold.
///
/// Persistence and sync both move values through JSON, so managed values
/// must round-trip through serde.
pub trait StateValue: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A live strategy hook on one store.
pub trait Attachment: Send + Sync {
    /// Strategy name, for diagnostics.
    fn strategy(&self) -> &'static str;

    /// Remove every subscription and listener this attachment installed.
    ///
    /// Must be idempotent.
    fn detach(&self);
}
