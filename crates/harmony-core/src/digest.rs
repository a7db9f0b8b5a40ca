//! Activity status and the hub's state digest event

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hub-defined activity status
///
/// At most one activity is `Running` at any instant; the digest handling
/// in the engine enforces that invariant on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityStatus {
    #[default]
    Off,
    Starting,
    Running,
    Stopping,
}

impl ActivityStatus {
    /// Numeric form used in the state tree (0–3)
    pub fn as_i64(self) -> i64 {
        match self {
            ActivityStatus::Off => 0,
            ActivityStatus::Starting => 1,
            ActivityStatus::Running => 2,
            ActivityStatus::Stopping => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(ActivityStatus::Off),
            1 => Some(ActivityStatus::Starting),
            2 => Some(ActivityStatus::Running),
            3 => Some(ActivityStatus::Stopping),
            _ => None,
        }
    }
}

impl Serialize for ActivityStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

// The hub reports status as either a number or a numeric string depending
// on firmware; accept both.
impl<'de> Deserialize<'de> for ActivityStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let num = match &value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        };
        num.and_then(ActivityStatus::from_i64)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid activity status: {value}")))
    }
}

/// Event pushed by the hub reporting the current activity and its status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDigest {
    #[serde(rename = "activityId")]
    pub activity_id: String,

    #[serde(rename = "activityStatus")]
    pub status: ActivityStatus,
}
