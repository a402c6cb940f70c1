//! Cross-context mirroring of store values.
//!
//! - [`SyncTransport`] / [`SyncChannel`] - the broadcast contract
//! - [`LocalTransport`] - in-process hub honoring that contract
//! - [`SyncStrategy`] - publishes local changes and applies validated remote ones

mod local;
mod strategy;
mod transport;

pub use local::{LocalChannel, LocalTransport};
pub use strategy::{SyncAttachment, SyncStrategy};
pub use transport::{MessageHandler, SyncChannel, SyncTransport};
