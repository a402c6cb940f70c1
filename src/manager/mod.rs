//! Keyed store registry.
//!
//! [`StateManager`] hands out exactly one [`Store`](crate::Store) per key and
//! wires the strategies selected by [`StateConfig`] onto each new store.

mod config;
mod manager;

pub use config::StateConfig;
pub use manager::{StateManager, StateManagerBuilder};
