use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::transport::{SyncChannel, SyncTransport};
use crate::error::SyncError;
use crate::store::{Store, Subscription};
use crate::strategy::{Attachment, StateValue};

/// Mirrors a store across contexts through a [`SyncTransport`].
///
/// Local changes are published on the channel named by the store key.
/// Inbound payloads are checked against the store's value type before being
/// applied; mismatches are logged and dropped.
#[derive(Clone)]
pub struct SyncStrategy {
    transport: Arc<dyn SyncTransport>,
}

impl SyncStrategy {
    /// Sync through `transport`.
    pub fn new(transport: Arc<dyn SyncTransport>) -> Self {
        Self { transport }
    }

    /// Join the channel for `key` and start mirroring `store`.
    ///
    /// Returns `None` if the channel cannot be opened; the store keeps
    /// working unsynchronized.
    pub fn attach<T: StateValue>(&self, key: &str, store: &Store<T>) -> Option<SyncAttachment> {
        let channel = match self.transport.open_channel(key) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to open sync channel");
                return None;
            }
        };

        let inbound = store.clone();
        let channel_name = key.to_string();
        channel.on_message(Arc::new(move |payload: serde_json::Value| {
            match serde_json::from_value::<T>(payload) {
                Ok(value) => {
                    inbound.set(value);
                }
                Err(e) => {
                    tracing::warn!(channel = %channel_name, error = %e, "Rejected sync payload");
                }
            }
        }));

        // The subscribe-time replay is not a change; peers keep their value.
        let armed = Arc::new(AtomicBool::new(false));
        let outbound = Arc::clone(&channel);
        let gate = Arc::clone(&armed);
        let subscription = store.subscribe(move |value| {
            if !gate.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = publish(outbound.as_ref(), value) {
                tracing::warn!(channel = %outbound.name(), error = %e, "Failed to publish state");
            }
        });
        armed.store(true, Ordering::SeqCst);

        tracing::debug!(key, "Attached sync channel");
        Some(SyncAttachment {
            channel,
            subscription,
        })
    }
}

fn publish<T: StateValue>(channel: &dyn SyncChannel, value: &T) -> Result<(), SyncError> {
    let payload = serde_json::to_value(value).map_err(|source| SyncError::Encode {
        name: channel.name().to_string(),
        source,
    })?;
    channel.publish(payload)
}

/// Live sync hook on one store.
pub struct SyncAttachment {
    channel: Arc<dyn SyncChannel>,
    subscription: Subscription,
}

impl SyncAttachment {
    /// Name of the joined channel.
    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }
}

impl Attachment for SyncAttachment {
    fn strategy(&self) -> &'static str {
        "sync"
    }

    fn detach(&self) {
        self.subscription.unsubscribe();
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::LocalTransport;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
    }

    struct OfflineTransport;

    impl SyncTransport for OfflineTransport {
        fn open_channel(&self, name: &str) -> Result<Arc<dyn SyncChannel>, SyncError> {
            Err(SyncError::Closed {
                name: name.to_string(),
            })
        }
    }

    #[test]
    fn changes_reach_the_peer() {
        let transport = LocalTransport::new();
        let strategy = SyncStrategy::new(Arc::new(transport));
        let a = Store::new(0);
        let b = Store::new(0);

        let _a = strategy.attach("k", &a).unwrap();
        let _b = strategy.attach("k", &b).unwrap();

        a.set(7);
        assert_eq!(b.get(), 7);

        b.set(9);
        assert_eq!(a.get(), 9);
    }

    #[test]
    fn joining_does_not_clobber_peers() {
        let transport = LocalTransport::new();
        let strategy = SyncStrategy::new(Arc::new(transport));
        let a = Store::new(5);
        let b = Store::new(0);

        let _a = strategy.attach("k", &a).unwrap();
        let _b = strategy.attach("k", &b).unwrap();

        assert_eq!(a.get(), 5);
        assert_eq!(b.get(), 0);
    }

    #[test]
    fn late_joiner_receives_next_change() {
        let transport = LocalTransport::new();
        let strategy = SyncStrategy::new(Arc::new(transport));
        let a = Store::new(0);
        let _a = strategy.attach("k", &a).unwrap();
        a.set(4);

        let b = Store::new(0);
        let _b = strategy.attach("k", &b).unwrap();
        assert_eq!(a.get(), 4);
        assert_eq!(b.get(), 0);

        a.set(6);
        assert_eq!(b.get(), 6);

        b.set(8);
        assert_eq!(a.get(), 8);
    }

    #[test]
    fn mismatched_payload_is_dropped() {
        let transport = LocalTransport::new();
        let strategy = SyncStrategy::new(Arc::new(transport.clone()));
        let profile = Profile {
            name: "ada".to_string(),
            age: 36,
        };
        let store = Store::new(profile.clone());
        let _attachment = strategy.attach("profile", &store).unwrap();

        let rogue = transport.open_channel("profile").unwrap();
        rogue.publish(json!({ "name": 12 })).unwrap();
        assert_eq!(store.get(), profile);

        rogue.publish(json!({ "name": "grace", "age": 45 })).unwrap();
        assert_eq!(store.get().name, "grace");
    }

    #[test]
    fn detach_closes_the_channel() {
        let transport = LocalTransport::new();
        let strategy = SyncStrategy::new(Arc::new(transport.clone()));
        let a = Store::new(0);
        let b = Store::new(0);

        let attachment = strategy.attach("k", &a).unwrap();
        let _b = strategy.attach("k", &b).unwrap();
        assert_eq!(transport.endpoint_count("k"), 2);

        attachment.detach();
        attachment.detach();
        a.set(3);

        assert_eq!(b.get(), 0);
        assert_eq!(transport.endpoint_count("k"), 1);
        assert_eq!(attachment.channel_name(), "k");
    }

    #[test]
    fn unavailable_transport_leaves_store_unsynced() {
        let strategy = SyncStrategy::new(Arc::new(OfflineTransport));
        let store = Store::new(1);

        assert!(strategy.attach("k", &store).is_none());
        assert!(store.set(2));
    }
}
