//! Hub session and command-serialization engine
//!
//! This crate owns the part of the bridge with real state-machine and
//! concurrency content: the session lifecycle (connect → sync → listen
//! for digests → detect loss → reconnect), the single-slot command
//! queue, the press/hold/release timing protocol, and the activity
//! status reflection that keeps at most one activity running.

pub mod activity;
mod bridge;
mod context;
mod queue;
pub mod sender;
mod session;

pub use bridge::HarmonyBridge;
pub use context::SessionContext;
pub use queue::{CommandQueue, CommandReceiver};
pub use session::SessionManager;

use thiserror::Error;

/// Engine errors surfaced to the host
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Bus(#[from] harmony_bus::BusError),

    #[error(transparent)]
    Discovery(#[from] harmony_discovery::DiscoveryError),

    #[error(transparent)]
    Sync(#[from] harmony_sync::SyncError),
}

pub type EngineResult<T> = Result<T, EngineError>;
