//! Typed state-change requests
//!
//! Incoming bus writes are classified exactly once, at the bus boundary,
//! into a discriminated request; nothing downstream re-parses key strings.

use serde_json::Value;

/// Minimum realized press/hold duration in milliseconds
pub const MIN_HOLD_MS: u64 = 100;

/// A classified state-bus write awaiting execution
#[derive(Debug, Clone, PartialEq)]
pub enum StateChangeRequest {
    /// Start an activity by label, or power off when `value == 0`.
    ///
    /// A write to `activities.currentStatus` classifies as a power-off
    /// request (`label: None, value: 0`).
    SwitchActivity { label: Option<String>, value: i64 },

    /// Write to `activities.currentActivity` — not supported, completed
    /// as a no-op
    CurrentActivityWrite { key: String },

    /// Timed press/hold/release of a device command.
    ///
    /// `duration` is `None` when the written value was zero/falsy (the
    /// entry is just acknowledged back to `0`); otherwise it is the
    /// requested hold time clamped to at least [`MIN_HOLD_MS`].
    DeviceCommand { key: String, duration: Option<u64> },

    /// Write whose key shape is not understood
    Unknown { key: String },
}

impl StateChangeRequest {
    /// Classify a bus write under the hub root.
    ///
    /// Keys have the shape `<root>.<channel>.<name>`; anything else is
    /// `Unknown`.
    pub fn classify(root: &str, key: &str, value: &Value) -> Self {
        let parts: Vec<&str> = key.split('.').collect();
        let (channel, name) = match parts.as_slice() {
            [r, channel, name] if *r == root => (*channel, *name),
            _ => {
                return StateChangeRequest::Unknown {
                    key: key.to_string(),
                }
            }
        };

        match channel {
            "activities" => match name {
                "currentStatus" => StateChangeRequest::SwitchActivity {
                    label: None,
                    value: 0,
                },
                "currentActivity" => StateChangeRequest::CurrentActivityWrite {
                    key: key.to_string(),
                },
                label => StateChangeRequest::SwitchActivity {
                    label: Some(label.to_string()),
                    value: coerce_int(value).unwrap_or(1),
                },
            },
            _ => StateChangeRequest::DeviceCommand {
                key: key.to_string(),
                duration: hold_duration(value),
            },
        }
    }
}

/// Interpret a written value as an integer, accepting numeric strings
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a written value counts as "no hold requested"
fn is_zero_or_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s.trim().parse::<f64>().map_or(false, |f| f == 0.0),
        _ => false,
    }
}

/// Requested hold duration: `None` for falsy/zero values, otherwise the
/// parsed value clamped to at least [`MIN_HOLD_MS`] (unparseable values
/// also clamp to the minimum).
fn hold_duration(value: &Value) -> Option<u64> {
    if is_zero_or_falsy(value) {
        return None;
    }
    let ms = coerce_int(value).unwrap_or(0).max(MIN_HOLD_MS as i64);
    Some(ms as u64)
}
