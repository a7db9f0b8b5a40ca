//! id ↔ label-identifier lookup tables
//!
//! Rebuilt atomically on every successful catalog fetch; the forward and
//! reverse tables are mutually inverse and cover exactly the most recent
//! catalog.

use std::collections::HashMap;

/// Lookup tables translating between hub ids and label-derived
/// storage identifiers
#[derive(Debug, Clone, Default)]
pub struct IdentifierMaps {
    activities: HashMap<String, String>,
    activities_reverse: HashMap<String, String>,
    devices: HashMap<String, String>,
    devices_reverse: HashMap<String, String>,
}

impl IdentifierMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every mapping (start of a full rebuild)
    pub fn clear(&mut self) {
        self.activities.clear();
        self.activities_reverse.clear();
        self.devices.clear();
        self.devices_reverse.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.devices.is_empty()
    }

    pub fn insert_activity(&mut self, id: &str, ident: &str) {
        self.activities_reverse
            .insert(ident.to_string(), id.to_string());
        self.activities.insert(id.to_string(), ident.to_string());
    }

    pub fn insert_device(&mut self, id: &str, ident: &str) {
        self.devices_reverse
            .insert(ident.to_string(), id.to_string());
        self.devices.insert(id.to_string(), ident.to_string());
    }

    /// Storage identifier of an activity by hub id
    pub fn activity_ident(&self, id: &str) -> Option<&str> {
        self.activities.get(id).map(String::as_str)
    }

    /// Hub id of an activity by storage identifier
    pub fn activity_id(&self, ident: &str) -> Option<&str> {
        self.activities_reverse.get(ident).map(String::as_str)
    }

    pub fn device_ident(&self, id: &str) -> Option<&str> {
        self.devices.get(id).map(String::as_str)
    }

    pub fn device_id(&self, ident: &str) -> Option<&str> {
        self.devices_reverse.get(ident).map(String::as_str)
    }

    /// All known activity ids (including the power-off sentinel)
    pub fn activity_ids(&self) -> impl Iterator<Item = &str> {
        self.activities.keys().map(String::as_str)
    }
}
