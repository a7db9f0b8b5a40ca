//! State-bus interface for the Harmony hub bridge
//!
//! The host state bus is an external collaborator; this crate specifies
//! the slice of it the bridge consumes — a flat key/value tree of typed
//! entries with acknowledgement semantics — and provides [`MemoryBus`],
//! an in-memory implementation backing tests and embedders.
//!
//! Acknowledgement convention: a write with `ack: false` is a user
//! command for the bridge to execute; a write with `ack: true` is the
//! bridge's own reflection and is never re-processed as a command.

mod memory;

pub use memory::MemoryBus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// State-bus errors
#[derive(Debug, Error)]
pub enum BusError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("bus backend error: {0}")]
    Backend(String),
}

pub type BusResult<T> = Result<T, BusError>;

/// A state value with its acknowledgement flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValue {
    pub val: Value,
    pub ack: bool,
}

impl StateValue {
    /// An unacknowledged write, i.e. a command for the bridge
    pub fn command(val: impl Into<Value>) -> Self {
        Self {
            val: val.into(),
            ack: false,
        }
    }

    /// An acknowledged value, i.e. a reflection by the bridge
    pub fn acked(val: impl Into<Value>) -> Self {
        Self {
            val: val.into(),
            ack: true,
        }
    }
}

/// Kind of tree object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Root grouping for one physical device (the hub)
    Device,
    /// Grouping below a device (activities, one per mirrored device)
    Channel,
    /// Leaf entry holding a value
    State,
}

/// Value type carried by a state entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
    String,
}

/// Descriptor of a tree object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub kind: ObjectKind,

    /// Display name of the object
    pub name: String,

    /// Role hint for the host UI (e.g. "switch", "button", "indicator")
    pub role: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    #[serde(default)]
    pub write: bool,

    #[serde(default = "default_read")]
    pub read: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,

    /// Opaque metadata stored with the object (hub-side ids, actions)
    #[serde(default)]
    pub native: Value,
}

fn default_read() -> bool {
    true
}

impl ObjectMeta {
    pub fn device(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Device,
            name: name.into(),
            role: String::new(),
            value_type: None,
            write: false,
            read: true,
            min: None,
            max: None,
            native: Value::Null,
        }
    }

    pub fn channel(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Channel,
            name: name.into(),
            role: role.into(),
            value_type: None,
            write: false,
            read: true,
            min: None,
            max: None,
            native: Value::Null,
        }
    }

    pub fn state(
        name: impl Into<String>,
        role: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self {
            kind: ObjectKind::State,
            name: name.into(),
            role: role.into(),
            value_type: Some(value_type),
            write: false,
            read: true,
            min: None,
            max: None,
            native: Value::Null,
        }
    }

    pub fn writable(mut self) -> Self {
        self.write = true;
        self
    }

    pub fn with_min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_native(mut self, native: Value) -> Self {
        self.native = native;
        self
    }
}

/// A write observed on the bus
#[derive(Debug, Clone)]
pub struct BusWrite {
    pub key: String,
    pub value: StateValue,
}

/// The slice of the host state bus the bridge consumes
#[async_trait]
pub trait StateBus: Send + Sync {
    /// Subscribe to every write on the bus. Callers filter by key and
    /// acknowledgement flag.
    fn watch(&self) -> broadcast::Receiver<BusWrite>;

    async fn get_state(&self, key: &str) -> BusResult<Option<StateValue>>;

    async fn set_state(&self, key: &str, value: StateValue) -> BusResult<()>;

    async fn get_object(&self, key: &str) -> BusResult<Option<ObjectMeta>>;

    async fn set_object(&self, key: &str, meta: ObjectMeta) -> BusResult<()>;

    /// Names of channel-kind objects directly under a device root
    async fn channels_of(&self, root: &str) -> BusResult<Vec<String>>;

    /// Keys of state-kind objects under `prefix.`
    async fn states_under(&self, prefix: &str) -> BusResult<Vec<String>>;

    /// Delete a state entry and its value
    async fn delete_state(&self, key: &str) -> BusResult<()>;

    /// Delete a channel under a device root together with every entry
    /// below it
    async fn delete_channel(&self, root: &str, channel: &str) -> BusResult<()>;
}
