//! In-process broadcast transport.
//!
//! A shared hub routes messages between every [`LocalChannel`] opened on the
//! same name. Delivery is synchronous and skips the publishing endpoint.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::transport::{MessageHandler, SyncChannel, SyncTransport};
use crate::error::SyncError;

struct Endpoint {
    id: u64,
    handler: Option<MessageHandler>,
}

#[derive(Default)]
struct Hub {
    next_id: AtomicU64,
    channels: RwLock<HashMap<String, Vec<Endpoint>>>,
}

impl Hub {
    fn join(&self, name: &str) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels
            .write()
            .entry(name.to_string())
            .or_default()
            .push(Endpoint { id, handler: None });
        id
    }

    fn leave(&self, name: &str, id: u64) {
        let mut channels = self.channels.write();
        if let Some(endpoints) = channels.get_mut(name) {
            endpoints.retain(|endpoint| endpoint.id != id);
            if endpoints.is_empty() {
                channels.remove(name);
            }
        }
    }

    fn set_handler(&self, name: &str, id: u64, handler: MessageHandler) {
        let mut channels = self.channels.write();
        if let Some(endpoint) = channels
            .get_mut(name)
            .and_then(|endpoints| endpoints.iter_mut().find(|endpoint| endpoint.id == id))
        {
            endpoint.handler = Some(handler);
        }
    }

    /// Handlers of every endpoint on `name` except `from`.
    fn peers(&self, name: &str, from: u64) -> Vec<MessageHandler> {
        self.channels
            .read()
            .get(name)
            .map(|endpoints| {
                endpoints
                    .iter()
                    .filter(|endpoint| endpoint.id != from)
                    .filter_map(|endpoint| endpoint.handler.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-process [`SyncTransport`].
///
/// Clones share one hub; hand clones to several managers to let their
/// stores mirror each other.
#[derive(Clone, Default)]
pub struct LocalTransport {
    hub: Arc<Hub>,
}

impl LocalTransport {
    /// A transport with its own empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open endpoints on `name`.
    pub fn endpoint_count(&self, name: &str) -> usize {
        self.hub.channels.read().get(name).map_or(0, Vec::len)
    }
}

impl SyncTransport for LocalTransport {
    fn open_channel(&self, name: &str) -> Result<Arc<dyn SyncChannel>, SyncError> {
        Ok(Arc::new(LocalChannel::open(Arc::clone(&self.hub), name)))
    }
}

/// Endpoint handed out by [`LocalTransport`].
pub struct LocalChannel {
    id: u64,
    name: String,
    hub: Arc<Hub>,
    closed: AtomicBool,
}

impl LocalChannel {
    fn open(hub: Arc<Hub>, name: &str) -> Self {
        let id = hub.join(name);
        Self {
            id,
            name: name.to_string(),
            hub,
            closed: AtomicBool::new(false),
        }
    }
}

impl SyncChannel for LocalChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, payload: Value) -> Result<(), SyncError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Closed {
                name: self.name.clone(),
            });
        }

        // Handlers run without the hub lock; they may publish in turn.
        for handler in self.hub.peers(&self.name, self.id) {
            handler(payload.clone());
        }
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) {
        if !self.closed.load(Ordering::SeqCst) {
            self.hub.set_handler(&self.name, self.id, handler);
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.hub.leave(&self.name, self.id);
        }
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.close();
    }
}
