//! # Statemesh
//!
//! Observable state cells with derived values, durable persistence and
//! cross-context sync.
//!
//! ## Store (Value cells)
//!
//! - `Store<T>` - Thread-safe value cell that notifies subscribers synchronously
//! - `Selector<T, R>` - Keyed projection used to derive memoized sub-stores
//! - `Subscription` - Explicit capability to remove a subscriber
//!
//! ## StateManager (Keyed registry)
//!
//! - One store per key, created on first request
//! - Optional persistence through a `PersistenceAdapter`
//! - Optional mirroring through a `SyncTransport`
//!
//! ```
//! use statemesh::{MemoryAdapter, StateConfig, StateManager};
//!
//! let adapter = MemoryAdapter::new();
//! let manager = StateManager::builder()
//!     .config(StateConfig::default().with_persistence(true))
//!     .persistence(adapter.clone())
//!     .build()
//!     .unwrap();
//!
//! let todos = manager.store("todos", Vec::<String>::new()).unwrap();
//! let count = todos.derive_with("count", |t: &Vec<String>| t.len());
//!
//! todos.update(|t| {
//!     let mut t = t.clone();
//!     t.push("write docs".to_string());
//!     t
//! });
//!
//! assert_eq!(count.get(), 1);
//! assert_eq!(adapter.get("statemesh:todos").as_deref(), Some(r#"["write docs"]"#));
//! ```

pub mod error;
pub mod manager;
pub mod persistence;
pub mod store;
pub mod strategy;
pub mod sync;

// Re-export main types for convenience
pub use error::{ConfigError, PersistenceError, StateError, SyncError};
pub use manager::{StateConfig, StateManager, StateManagerBuilder};
pub use persistence::{FileAdapter, MemoryAdapter, PersistenceAdapter};
pub use store::{Selector, SelectorKey, Store, Subscription};
pub use strategy::{Attachment, StateValue};
pub use sync::{LocalTransport, SyncChannel, SyncTransport};
