//! Durable mirroring of store values.
//!
//! - [`PersistenceAdapter`] - the key to string backend contract
//! - [`MemoryAdapter`] / [`FileAdapter`] - bundled backends
//! - [`PersistenceStrategy`] - restores a store on attach and saves each change

mod adapter;
mod file;
mod memory;
mod strategy;

pub use adapter::PersistenceAdapter;
pub use file::{FileAdapter, MAX_PLAIN_KEY_LEN};
pub use memory::MemoryAdapter;
pub use strategy::{PersistenceAttachment, PersistenceStrategy};
