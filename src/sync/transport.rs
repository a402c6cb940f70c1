use serde_json::Value;
use std::sync::Arc;

use crate::error::SyncError;

/// Callback invoked for every message delivered to a channel.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// One endpoint on a named broadcast channel.
///
/// A channel must never deliver its own publications to its own handler.
/// Without that guarantee an outbound write would come straight back as an
/// inbound write.
pub trait SyncChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Broadcast `payload` to every other endpoint on the channel.
    fn publish(&self, payload: Value) -> Result<(), SyncError>;

    /// Install the inbound handler, replacing any previous one.
    fn on_message(&self, handler: MessageHandler);

    /// Leave the channel. Must be idempotent.
    fn close(&self);
}

/// Factory for broadcast channels shared across execution contexts.
pub trait SyncTransport: Send + Sync {
    /// Open (or join) the channel called `name`.
    fn open_channel(&self, name: &str) -> Result<Arc<dyn SyncChannel>, SyncError>;
}
