//! Bridge configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ident;

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_keep_alive_interval_ms() -> u64 {
    5000
}

fn default_browse_timeout_ms() -> u64 {
    5000
}

/// Configuration for one hub bridge instance
///
/// Loading this from files or flags is the host's concern; the bridge
/// only consumes the resolved values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Host name of the target hub as it appears in advertisements
    pub hub: String,

    /// Delay between seeing the target advertisement and connecting,
    /// so the hub's own startup is not raced
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Bound on every hub round trip (connect, catalog, activity fetch,
    /// keep-alive probe)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Cadence of the keep-alive probe while a session exists
    #[serde(default = "default_keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,

    /// Default wait for a `browse` request with no explicit timeout
    #[serde(default = "default_browse_timeout_ms")]
    pub browse_timeout_ms: u64,
}

impl BridgeConfig {
    pub fn new(hub: impl Into<String>) -> Self {
        Self {
            hub: hub.into(),
            settle_delay_ms: default_settle_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            keep_alive_interval_ms: default_keep_alive_interval_ms(),
            browse_timeout_ms: default_browse_timeout_ms(),
        }
    }

    /// Root segment of the hub's state tree
    pub fn hub_root(&self) -> String {
        ident(&self.hub)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::new("Harmony Hub");
        assert_eq!(config.settle_delay_ms, 1000);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.keep_alive_interval_ms, 5000);
        assert_eq!(config.browse_timeout_ms, 5000);
    }

    #[test]
    fn test_hub_root_is_ident_of_name() {
        let config = BridgeConfig::new("Harmony Hub");
        assert_eq!(config.hub_root(), "Harmony_Hub");
    }

    #[test]
    fn test_deserialize_with_partial_fields() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"hub": "Living Room", "settle_delay_ms": 250}"#).unwrap();
        assert_eq!(config.hub, "Living Room");
        assert_eq!(config.settle_delay_ms, 250);
        assert_eq!(config.request_timeout_ms, 5000);
    }
}
