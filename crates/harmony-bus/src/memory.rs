//! In-memory state bus
//!
//! Backs the engine's tests and serves as the embedded default when no
//! host bus is wired in. Writes are broadcast to watchers the same way a
//! host bus would deliver its subscription callbacks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::{BusResult, BusWrite, ObjectKind, ObjectMeta, StateBus, StateValue};

/// Broadcast capacity for bus watchers
const WATCH_CAPACITY: usize = 256;

/// A stored state entry with its timestamps
#[derive(Debug, Clone)]
struct StoredState {
    value: StateValue,
    /// Last time the value itself changed
    last_changed: DateTime<Utc>,
    /// Last time the entry was written, even if unchanged
    last_updated: DateTime<Utc>,
}

/// In-memory implementation of [`StateBus`]
pub struct MemoryBus {
    states: DashMap<String, StoredState>,
    objects: DashMap<String, ObjectMeta>,
    watch_tx: broadcast::Sender<BusWrite>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (watch_tx, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            states: DashMap::new(),
            objects: DashMap::new(),
            watch_tx,
        }
    }

    /// Write a command value the way a user would (`ack: false`)
    pub async fn write_command(&self, key: &str, val: impl Into<serde_json::Value>) {
        // MemoryBus::set_state is infallible
        let _ = self.set_state(key, StateValue::command(val)).await;
    }

    /// When the entry's value last changed (not merely re-written)
    pub fn last_changed(&self, key: &str) -> Option<DateTime<Utc>> {
        self.states.get(key).map(|s| s.last_changed)
    }

    /// Number of objects in the tree
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBus for MemoryBus {
    fn watch(&self) -> broadcast::Receiver<BusWrite> {
        self.watch_tx.subscribe()
    }

    async fn get_state(&self, key: &str) -> BusResult<Option<StateValue>> {
        Ok(self.states.get(key).map(|s| s.value.clone()))
    }

    async fn set_state(&self, key: &str, value: StateValue) -> BusResult<()> {
        let now = Utc::now();
        trace!(key, ack = value.ack, "setting state");

        let mut entry = self
            .states
            .entry(key.to_string())
            .or_insert_with(|| StoredState {
                value: value.clone(),
                last_changed: now,
                last_updated: now,
            });
        if entry.value.val != value.val {
            entry.last_changed = now;
        }
        entry.last_updated = now;
        entry.value = value.clone();
        drop(entry);

        // No active watchers is fine
        let _ = self.watch_tx.send(BusWrite {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn get_object(&self, key: &str) -> BusResult<Option<ObjectMeta>> {
        Ok(self.objects.get(key).map(|o| o.clone()))
    }

    async fn set_object(&self, key: &str, meta: ObjectMeta) -> BusResult<()> {
        trace!(key, kind = ?meta.kind, "setting object");
        self.objects.insert(key.to_string(), meta);
        Ok(())
    }

    async fn channels_of(&self, root: &str) -> BusResult<Vec<String>> {
        let prefix = format!("{root}.");
        Ok(self
            .objects
            .iter()
            .filter(|entry| {
                entry.value().kind == ObjectKind::Channel
                    && entry.key().starts_with(&prefix)
                    && !entry.key()[prefix.len()..].contains('.')
            })
            .map(|entry| entry.value().name.clone())
            .collect())
    }

    async fn states_under(&self, prefix: &str) -> BusResult<Vec<String>> {
        let prefix = format!("{prefix}.");
        Ok(self
            .objects
            .iter()
            .filter(|entry| {
                entry.value().kind == ObjectKind::State && entry.key().starts_with(&prefix)
            })
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete_state(&self, key: &str) -> BusResult<()> {
        trace!(key, "deleting state");
        self.objects.remove(key);
        self.states.remove(key);
        Ok(())
    }

    async fn delete_channel(&self, root: &str, channel: &str) -> BusResult<()> {
        let channel_key = format!("{root}.{channel}");
        trace!(key = %channel_key, "deleting channel");
        let prefix = format!("{channel_key}.");
        let doomed: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for key in doomed {
            self.objects.remove(&key);
            self.states.remove(&key);
        }
        self.objects.remove(&channel_key);
        self.states.remove(&channel_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueType;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get_state() {
        let bus = MemoryBus::new();
        bus.set_state("hub.TV.VolumeUp", StateValue::acked(0))
            .await
            .unwrap();

        let value = bus.get_state("hub.TV.VolumeUp").await.unwrap().unwrap();
        assert_eq!(value.val, json!(0));
        assert!(value.ack);
        assert!(bus.get_state("hub.missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_watch_delivers_writes() {
        let bus = MemoryBus::new();
        let mut rx = bus.watch();

        bus.write_command("hub.TV.VolumeUp", 250).await;

        let write = rx.recv().await.unwrap();
        assert_eq!(write.key, "hub.TV.VolumeUp");
        assert_eq!(write.value.val, json!(250));
        assert!(!write.value.ack);
    }

    #[tokio::test]
    async fn test_last_changed_preserved_on_same_value() {
        let bus = MemoryBus::new();
        bus.set_state("hub.x", StateValue::acked(1)).await.unwrap();
        let first = bus.last_changed("hub.x").unwrap();

        bus.set_state("hub.x", StateValue::acked(1)).await.unwrap();
        assert_eq!(bus.last_changed("hub.x").unwrap(), first);

        bus.set_state("hub.x", StateValue::acked(2)).await.unwrap();
        assert!(bus.last_changed("hub.x").unwrap() >= first);
    }

    #[tokio::test]
    async fn test_channels_of_lists_direct_children_only() {
        let bus = MemoryBus::new();
        bus.set_object("hub", ObjectMeta::device("hub")).await.unwrap();
        bus.set_object("hub.activities", ObjectMeta::channel("activities", "media.activities"))
            .await
            .unwrap();
        bus.set_object("hub.TV", ObjectMeta::channel("TV", "media.device"))
            .await
            .unwrap();
        // A nested channel under another root must not appear
        bus.set_object("other.Stereo", ObjectMeta::channel("Stereo", "media.device"))
            .await
            .unwrap();

        let mut channels = bus.channels_of("hub").await.unwrap();
        channels.sort();
        assert_eq!(channels, vec!["TV", "activities"]);
    }

    #[tokio::test]
    async fn test_states_under_prefix() {
        let bus = MemoryBus::new();
        for key in ["hub.activities.Watch_TV", "hub.activities.currentStatus"] {
            bus.set_object(
                key,
                ObjectMeta::state(key, "switch", ValueType::Number),
            )
            .await
            .unwrap();
        }
        bus.set_object("hub.TV.VolumeUp", ObjectMeta::state("v", "button", ValueType::Number))
            .await
            .unwrap();

        let mut keys = bus.states_under("hub.activities").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["hub.activities.Watch_TV", "hub.activities.currentStatus"]
        );
    }

    #[tokio::test]
    async fn test_delete_channel_cascades() {
        let bus = MemoryBus::new();
        bus.set_object("hub.TV", ObjectMeta::channel("TV", "media.device"))
            .await
            .unwrap();
        bus.set_object("hub.TV.VolumeUp", ObjectMeta::state("v", "button", ValueType::Number))
            .await
            .unwrap();
        bus.set_state("hub.TV.VolumeUp", StateValue::acked(0))
            .await
            .unwrap();

        bus.delete_channel("hub", "TV").await.unwrap();

        assert!(bus.get_object("hub.TV").await.unwrap().is_none());
        assert!(bus.get_object("hub.TV.VolumeUp").await.unwrap().is_none());
        assert!(bus.get_state("hub.TV.VolumeUp").await.unwrap().is_none());
    }
}
