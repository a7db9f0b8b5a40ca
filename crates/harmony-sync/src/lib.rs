//! LocalTree mirror and config-diff synchronization
//!
//! The bridge mirrors the hub's activities and devices into the state
//! bus. [`LocalTree`] tracks what the mirror contained before the
//! current sync pass; [`ConfigSynchronizer`] reconciles a freshly
//! fetched catalog against it — creating newly discovered entries,
//! deleting vanished ones, and leaving everything else untouched — and
//! rebuilds the [`IdentifierMaps`] the rest of the bridge translates
//! through.

mod maps;
mod synchronizer;
mod tree;

pub use maps::IdentifierMaps;
pub use synchronizer::{ConfigSynchronizer, SyncOutcome};
pub use tree::LocalTree;

use thiserror::Error;

/// Synchronization errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Bus(#[from] harmony_bus::BusError),
}

pub type SyncResult<T> = Result<T, SyncError>;
