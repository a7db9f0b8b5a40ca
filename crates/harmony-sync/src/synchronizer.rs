//! Config-diff synchronization
//!
//! Runs once per successful connect. Reconciles the fresh catalog
//! against the previously known mirror: newly seen activities/devices
//! are created, vanished ones deleted, everything else left alone so
//! reconnects cause no churn. The identifier maps are rebuilt from
//! scratch on every pass that runs.

use std::collections::HashSet;

use tracing::{debug, info};

use harmony_bus::{ObjectMeta, StateBus, StateValue, ValueType};
use harmony_core::{ident, HubCatalog};
use harmony_discovery::HubInfo;

use crate::tree::ACTIVITIES_CHANNEL;
use crate::{IdentifierMaps, LocalTree, SyncResult};

/// What a synchronization pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub created_activities: Vec<String>,
    pub removed_activities: Vec<String>,
    pub created_devices: Vec<String>,
    pub removed_devices: Vec<String>,
    /// Whether the fast path skipped the pass entirely
    pub skipped: bool,
}

impl SyncOutcome {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Whether the pass changed the tree at all
    pub fn is_noop(&self) -> bool {
        self.created_activities.is_empty()
            && self.removed_activities.is_empty()
            && self.created_devices.is_empty()
            && self.removed_devices.is_empty()
    }
}

/// Reconciles hub catalogs against the local mirror
#[derive(Debug, Default)]
pub struct ConfigSynchronizer {
    synced: bool,
}

impl ConfigSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this process has completed a synchronization pass.
    ///
    /// Gates the fast path: a reconnect within one process skips the
    /// full reconciliation while the maps are still populated. The flag
    /// is process-local, so a restart always resyncs.
    pub fn is_synchronized(&self) -> bool {
        self.synced
    }

    pub async fn synchronize(
        &mut self,
        bus: &dyn StateBus,
        tree: &mut LocalTree,
        maps: &mut IdentifierMaps,
        hub: &HubInfo,
        catalog: &HubCatalog,
    ) -> SyncResult<SyncOutcome> {
        if self.synced && !maps.is_empty() {
            debug!("config already synchronized, fast path");
            tree.set_blocked(bus, false).await?;
            tree.set_connected(bus, true).await?;
            return Ok(SyncOutcome::skipped());
        }

        info!("creating activities and devices");

        let root = tree.root().to_string();
        bus.set_object(
            &root,
            ObjectMeta::device(root.as_str())
                .with_native(serde_json::to_value(hub).unwrap_or_default()),
        )
        .await?;

        if !tree.is_initialized() {
            bus.set_object(
                &tree.connected_key(),
                ObjectMeta::state(
                    format!("{root}:hubConnected"),
                    "indicator.hubConnected",
                    ValueType::Boolean,
                ),
            )
            .await?;
            bus.set_object(
                &tree.blocked_key(),
                ObjectMeta::state(
                    format!("{root}:hubBlocked"),
                    "indicator.hubBlocked",
                    ValueType::Boolean,
                ),
            )
            .await?;
        }
        bus.set_state(&tree.connected_key(), StateValue::acked(true))
            .await?;
        bus.set_state(&tree.blocked_key(), StateValue::acked(true))
            .await?;

        bus.set_object(
            &tree.activities_key(),
            ObjectMeta::channel(ACTIVITIES_CHANNEL, "media.activities"),
        )
        .await?;
        if !tree.is_initialized() {
            bus.set_object(
                &tree.current_activity_key(),
                ObjectMeta::state("activity:currentActivity", "indicator.activity", ValueType::String)
                    .writable(),
            )
            .await?;
            bus.set_object(
                &tree.current_status_key(),
                ObjectMeta::state("activity:currentStatus", "indicator.status", ValueType::Number)
                    .writable()
                    .with_min(0)
                    .with_max(3),
            )
            .await?;
        }

        maps.clear();

        let mut outcome = SyncOutcome::default();
        let mut touched_activities = HashSet::new();
        for activity in &catalog.activities {
            let activity_ident = ident(&activity.label);
            maps.insert_activity(&activity.id, &activity_ident);
            if activity.is_power_off() {
                continue;
            }
            if !tree.knows_activity(&activity_ident) {
                info!(activity = %activity_ident, "found new activity");
                bus.set_object(
                    &tree.activity_key(&activity_ident),
                    ObjectMeta::state(
                        format!("activity:{activity_ident}"),
                        "switch",
                        ValueType::Number,
                    )
                    .writable()
                    .with_min(0)
                    .with_max(3)
                    .with_native(activity.storage_metadata()),
                )
                .await?;
                outcome.created_activities.push(activity_ident.clone());
            }
            touched_activities.insert(activity_ident);
        }

        let mut touched_devices = HashSet::new();
        for device in &catalog.devices {
            let device_ident = ident(&device.label);
            maps.insert_device(&device.id, &device_ident);
            if !tree.knows_device(&device_ident) {
                info!(device = %device_ident, "found new device");
                bus.set_object(
                    &tree.device_key(&device_ident),
                    ObjectMeta::channel(device_ident.as_str(), "media.device")
                        .with_native(device.storage_metadata()),
                )
                .await?;
                for group in &device.control_groups {
                    for command in &group.commands {
                        let command_ident = ident(&command.name);
                        let key = tree.command_key(&device_ident, &command_ident);
                        bus.set_object(
                            &key,
                            ObjectMeta::state(
                                format!("{device_ident}:{command_ident}"),
                                "button",
                                ValueType::Number,
                            )
                            .writable()
                            .with_min(0)
                            .with_native(command.storage_metadata(&group.name, &device.id)),
                        )
                        .await?;
                        bus.set_state(&key, StateValue::acked(0)).await?;
                    }
                }
                outcome.created_devices.push(device_ident.clone());
            }
            touched_devices.insert(device_ident);
        }

        // Deletions key off the previous pass's identifiers
        let (stale_activities, stale_devices) =
            tree.replace_known(touched_activities, touched_devices);
        for activity_ident in stale_activities {
            info!(activity = %activity_ident, "deleting old activity");
            bus.delete_state(&tree.activity_key(&activity_ident)).await?;
            outcome.removed_activities.push(activity_ident);
        }
        for device_ident in stale_devices {
            info!(device = %device_ident, "deleting old device");
            bus.delete_channel(&root, &device_ident).await?;
            outcome.removed_devices.push(device_ident);
        }

        tree.mark_initialized();
        tree.set_blocked(bus, false).await?;
        tree.set_connected(bus, true).await?;
        self.synced = true;
        info!("synced hub config");
        Ok(outcome)
    }
}
