//! Core types for the Harmony hub bridge
//!
//! This crate provides the fundamental types used throughout the bridge:
//! storage identifiers, the hub catalog model, activity digests, the
//! session phase state machine, typed state-change requests, and the
//! bridge configuration.

mod catalog;
mod config;
mod digest;
mod ident;
mod phase;
mod request;

pub use catalog::{encode_action, Activity, Command, ControlGroup, Device, HubCatalog};
pub use config::BridgeConfig;
pub use digest::{ActivityStatus, StateDigest};
pub use ident::ident;
pub use phase::{InvalidPhaseTransition, SessionPhase};
pub use request::StateChangeRequest;

/// Reserved activity id the hub uses for "power off / no activity"
pub const POWER_OFF_ACTIVITY: &str = "-1";

/// Wire channel used for press/hold/release pulses
pub const HOLD_ACTION_CHANNEL: &str = "holdAction";
