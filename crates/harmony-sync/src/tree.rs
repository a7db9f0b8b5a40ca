//! The persisted mirror of hub entities in the state bus

use std::collections::HashSet;

use tracing::info;

use harmony_bus::{StateBus, StateValue};
use harmony_core::ident;

use crate::SyncResult;

/// Channel name grouping activity entries
pub const ACTIVITIES_CHANNEL: &str = "activities";

/// Tracks the bridge's view of the mirrored state tree: its root, whether
/// the indicator entries exist yet, and which activity/device identifiers
/// were present before the current sync pass.
#[derive(Debug)]
pub struct LocalTree {
    root: String,
    initialized: bool,
    known_activities: HashSet<String>,
    known_devices: HashSet<String>,
}

impl LocalTree {
    pub fn new(hub_name: &str) -> Self {
        Self {
            root: ident(hub_name),
            initialized: false,
            known_activities: HashSet::new(),
            known_devices: HashSet::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Whether the indicator entries already exist in the bus
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn connected_key(&self) -> String {
        format!("{}.hubConnected", self.root)
    }

    pub fn blocked_key(&self) -> String {
        format!("{}.hubBlocked", self.root)
    }

    pub fn activities_key(&self) -> String {
        format!("{}.{ACTIVITIES_CHANNEL}", self.root)
    }

    pub fn current_activity_key(&self) -> String {
        format!("{}.currentActivity", self.activities_key())
    }

    pub fn current_status_key(&self) -> String {
        format!("{}.currentStatus", self.activities_key())
    }

    pub fn activity_key(&self, activity_ident: &str) -> String {
        format!("{}.{activity_ident}", self.activities_key())
    }

    pub fn device_key(&self, device_ident: &str) -> String {
        format!("{}.{device_ident}", self.root)
    }

    pub fn command_key(&self, device_ident: &str, command_ident: &str) -> String {
        format!("{}.{device_ident}.{command_ident}", self.root)
    }

    pub fn knows_activity(&self, activity_ident: &str) -> bool {
        self.known_activities.contains(activity_ident)
    }

    pub fn knows_device(&self, device_ident: &str) -> bool {
        self.known_devices.contains(device_ident)
    }

    /// Replace the known sets after a sync pass, returning the previously
    /// known identifiers the pass did not touch (the entries to delete).
    pub fn replace_known(
        &mut self,
        activities: HashSet<String>,
        devices: HashSet<String>,
    ) -> (Vec<String>, Vec<String>) {
        let stale_activities = self
            .known_activities
            .difference(&activities)
            .cloned()
            .collect();
        let stale_devices = self.known_devices.difference(&devices).cloned().collect();
        self.known_activities = activities;
        self.known_devices = devices;
        (stale_activities, stale_devices)
    }

    /// Load the previously persisted mirror, if any: seeds the known
    /// identifier sets from existing channels and activity entries and
    /// reflects blocked=true / connected=false for an initialized tree.
    ///
    /// Returns whether a persisted mirror was found.
    pub async fn bootstrap(&mut self, bus: &dyn StateBus) -> SyncResult<bool> {
        if bus.get_state(&self.connected_key()).await?.is_none() {
            info!("hub not initialized, starting from an empty tree");
            return Ok(false);
        }

        for channel in bus.channels_of(&self.root).await? {
            if channel == ACTIVITIES_CHANNEL {
                self.initialized = true;
            } else {
                self.known_devices.insert(channel);
            }
        }

        for key in bus.states_under(&self.activities_key()).await? {
            if let Some(name) = key.rsplit('.').next() {
                if name != "currentStatus" && name != "currentActivity" {
                    self.known_activities.insert(name.to_string());
                }
            }
        }

        if self.initialized {
            self.set_blocked(bus, true).await?;
            self.set_connected(bus, false).await?;
            info!(
                activities = self.known_activities.len(),
                devices = self.known_devices.len(),
                "hub initialized from persisted tree"
            );
        }
        Ok(self.initialized)
    }

    /// Reflect the connected indicator; a no-op until the indicator
    /// entries exist.
    pub async fn set_connected(&self, bus: &dyn StateBus, value: bool) -> SyncResult<()> {
        if self.initialized {
            bus.set_state(&self.connected_key(), StateValue::acked(value))
                .await?;
        }
        Ok(())
    }

    /// Reflect the blocked indicator; a no-op until the indicator
    /// entries exist.
    pub async fn set_blocked(&self, bus: &dyn StateBus, value: bool) -> SyncResult<()> {
        if self.initialized {
            bus.set_state(&self.blocked_key(), StateValue::acked(value))
                .await?;
        }
        Ok(())
    }
}
