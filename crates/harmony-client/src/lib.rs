//! Hub wire-client interface
//!
//! The wire protocol itself (session establishment, authentication,
//! framing) is an external collaborator; this crate specifies the
//! interface the bridge drives and the payload format of hold-action
//! pulses. Every round trip the bridge issues is bounded with
//! [`bounded`]; a timeout is an ordinary failure, not a special case.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use harmony_core::{HubCatalog, StateDigest};

/// Wire-client errors
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("request '{method}' failed: {reason}")]
    Request { method: String, reason: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("session closed")]
    Closed,
}

pub type ClientResult<T> = Result<T, ClientError>;

/// One authenticated session with a hub
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Issue a request/response round trip by wire method name
    async fn request(&self, method: &str) -> ClientResult<serde_json::Value>;

    /// Fire-and-forget message on a wire channel
    async fn send(&self, channel: &str, payload: &str) -> ClientResult<()>;

    /// Fetch the hub's activity/device catalog
    async fn available_commands(&self) -> ClientResult<HubCatalog>;

    /// Ask the hub to start an activity by id
    async fn start_activity(&self, id: &str) -> ClientResult<()>;

    /// Ask the hub to power off (the `-1` sentinel activity)
    async fn turn_off(&self) -> ClientResult<()>;

    /// Subscribe to digest events pushed by the hub
    fn digests(&self) -> broadcast::Receiver<StateDigest>;

    /// Tear the session down; safe to call more than once
    async fn end(&self);
}

/// Establishes sessions; the bridge holds at most one at a time
#[async_trait]
pub trait HubConnector: Send + Sync {
    async fn connect(&self, ip: &str) -> ClientResult<Arc<dyn HubClient>>;
}

/// Bound a wire round trip with a timeout; elapsing maps to
/// [`ClientError::Timeout`].
pub async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = ClientResult<T>> + Send,
) -> ClientResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(timeout)),
    }
}

/// Payload of a `press` pulse on the hold-action channel.
///
/// `ts_ms` is milliseconds since the session started; the action string
/// must already be colon-escaped.
pub fn press_payload(ts_ms: u64, encoded_action: &str) -> String {
    format!("status=press:timestamp={ts_ms}:action={encoded_action}")
}

/// Payload of the trailing `release` pulse (the hub expects the leading
/// separator here).
pub fn release_payload(ts_ms: u64, encoded_action: &str) -> String {
    format!(":status=release:timestamp={ts_ms}:action={encoded_action}")
}
