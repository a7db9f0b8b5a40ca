//! Session phase state machine
//!
//! ```text
//! Disconnected → Connecting → SyncingConfig → Live
//!       ↑ ___________|______________|__________|
//! ```
//!
//! Any phase may fall back to `Disconnected` (failure or explicit stop).
//! "Blocked" is an orthogonal reflected flag, not a phase; it tracks
//! whether the command path is momentarily unusable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error when an invalid phase transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid session phase transition from {from:?} to {to:?}")]
pub struct InvalidPhaseTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

/// Lifecycle phase of the single hub session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session; waiting for a discovery advertisement
    #[default]
    Disconnected,
    /// Transport connect in flight
    Connecting,
    /// Session established, catalog fetch / tree reconciliation running
    SyncingConfig,
    /// Synchronized and listening for digests; command path usable
    Live,
}

impl SessionPhase {
    /// Attempt a transition to a new phase.
    pub fn try_transition(self, to: SessionPhase) -> Result<SessionPhase, InvalidPhaseTransition> {
        use SessionPhase::*;

        let valid = match (self, to) {
            // Cleanup is always reachable
            (_, Disconnected) => true,

            (Disconnected, Connecting) => true,
            (Connecting, SyncingConfig) => true,
            (SyncingConfig, Live) => true,

            _ => false,
        };

        if valid {
            Ok(to)
        } else {
            Err(InvalidPhaseTransition { from: self, to })
        }
    }

    /// Whether the command path is usable
    pub fn is_live(self) -> bool {
        self == SessionPhase::Live
    }
}
