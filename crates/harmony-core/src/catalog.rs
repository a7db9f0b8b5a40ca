//! Hub catalog model
//!
//! The catalog is the hub's snapshot of configured activities and devices,
//! fetched fresh on every successful connect. Field names follow the hub
//! wire protocol (`activity`, `device`, `controlGroup`, `function`); the
//! remainder of each wire object is kept as opaque metadata so it can be
//! passed through to storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::POWER_OFF_ACTIVITY;

/// Activity fields too bulky to mirror into storage
const PRUNED_ACTIVITY_FIELDS: &[&str] = &["sequences", "controlGroup", "fixit", "rules"];

/// Snapshot of the hub's configured activities and devices
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubCatalog {
    #[serde(rename = "activity", default)]
    pub activities: Vec<Activity>,

    #[serde(rename = "device", default)]
    pub devices: Vec<Device>,
}

/// A hub-defined named operating mode, e.g. "Watch TV"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,

    pub label: String,

    /// Remainder of the wire object, opaque to the bridge
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// Whether this is the reserved "power off" sentinel activity
    pub fn is_power_off(&self) -> bool {
        self.id == POWER_OFF_ACTIVITY
    }

    /// Metadata stored with the activity's tree entry.
    ///
    /// The hub ships full macro sequences and control-group listings with
    /// every activity; those are pruned before storage.
    pub fn storage_metadata(&self) -> Value {
        let mut meta = self.extra.clone();
        for field in PRUNED_ACTIVITY_FIELDS {
            meta.remove(*field);
        }
        meta.insert("id".to_string(), Value::String(self.id.clone()));
        meta.insert("label".to_string(), Value::String(self.label.clone()));
        Value::Object(meta)
    }
}

/// A controllable device with its command groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,

    pub label: String,

    #[serde(rename = "controlGroup", default)]
    pub control_groups: Vec<ControlGroup>,

    /// Remainder of the wire object, opaque to the bridge
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Metadata stored with the device's tree grouping (control groups
    /// are mirrored as individual command entries instead).
    pub fn storage_metadata(&self) -> Value {
        let mut meta = self.extra.clone();
        meta.insert("id".to_string(), Value::String(self.id.clone()));
        meta.insert("label".to_string(), Value::String(self.label.clone()));
        Value::Object(meta)
    }
}

/// A device's named group of discrete button-press commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlGroup {
    pub name: String,

    #[serde(rename = "function", default)]
    pub commands: Vec<Command>,
}

/// A single button-press command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub name: String,

    /// Encoded action string, opaque to the bridge
    pub action: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Command {
    /// Metadata stored with the command's tree entry
    pub fn storage_metadata(&self, control_group: &str, device_id: &str) -> Value {
        let mut meta = self.extra.clone();
        meta.insert("name".to_string(), Value::String(self.name.clone()));
        meta.insert("action".to_string(), Value::String(self.action.clone()));
        meta.insert(
            "controlGroup".to_string(),
            Value::String(control_group.to_string()),
        );
        meta.insert("deviceId".to_string(), Value::String(device_id.to_string()));
        Value::Object(meta)
    }
}

/// Escape an action string for the hold-action wire payload (`:` → `::`)
pub fn encode_action(action: &str) -> String {
    action.replace(':', "::")
}
