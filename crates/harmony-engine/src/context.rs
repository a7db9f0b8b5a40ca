//! Shared session context
//!
//! All process-wide session state — the single client handle, the
//! identifier maps, the mirror bookkeeping, the session phase — lives in
//! one owned context handed to each component by reference. The Session
//! Manager and Config Synchronizer are the only writers; the command
//! path and the activity reflection only read.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::warn;

use harmony_bus::{StateBus, StateValue};
use harmony_client::HubClient;
use harmony_core::{BridgeConfig, SessionPhase};
use harmony_sync::{ConfigSynchronizer, IdentifierMaps, LocalTree};

pub struct SessionContext {
    config: BridgeConfig,
    bus: Arc<dyn StateBus>,
    client: RwLock<Option<Arc<dyn HubClient>>>,
    session_start: RwLock<Option<Instant>>,
    phase: RwLock<SessionPhase>,
    pub(crate) maps: RwLock<IdentifierMaps>,
    pub(crate) tree: Mutex<LocalTree>,
    pub(crate) synchronizer: Mutex<ConfigSynchronizer>,
}

impl SessionContext {
    pub fn new(config: BridgeConfig, bus: Arc<dyn StateBus>) -> Self {
        let tree = LocalTree::new(&config.hub);
        Self {
            config,
            bus,
            client: RwLock::new(None),
            session_start: RwLock::new(None),
            phase: RwLock::new(SessionPhase::Disconnected),
            maps: RwLock::new(IdentifierMaps::new()),
            tree: Mutex::new(tree),
            synchronizer: Mutex::new(ConfigSynchronizer::new()),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn bus(&self) -> &dyn StateBus {
        self.bus.as_ref()
    }

    /// Root segment of the hub's state tree
    pub fn hub_root(&self) -> String {
        self.config.hub_root()
    }

    /// The current client handle, if a session exists
    pub async fn client(&self) -> Option<Arc<dyn HubClient>> {
        self.client.read().await.clone()
    }

    /// Record a newly established session and its start instant
    pub async fn start_session(&self, client: Arc<dyn HubClient>) {
        *self.session_start.write().await = Some(Instant::now());
        *self.client.write().await = Some(client);
    }

    /// Drop the session handle, returning it for teardown
    pub async fn take_client(&self) -> Option<Arc<dyn HubClient>> {
        *self.session_start.write().await = None;
        self.client.write().await.take()
    }

    /// Milliseconds since the session started; pulse timestamps are
    /// relative to this
    pub async fn session_elapsed_ms(&self) -> u64 {
        match *self.session_start.read().await {
            Some(start) => start.elapsed().as_millis() as u64,
            None => 0,
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        *self.phase.read().await
    }

    /// Apply a phase transition; an invalid one is logged and ignored
    pub async fn transition(&self, to: SessionPhase) {
        let mut phase = self.phase.write().await;
        match phase.try_transition(to) {
            Ok(next) => *phase = next,
            Err(e) => warn!(error = %e, "ignoring session phase transition"),
        }
    }

    /// Reflect the connected indicator into the bus
    pub async fn set_connected(&self, value: bool) {
        let tree = self.tree.lock().await;
        if let Err(e) = tree.set_connected(self.bus(), value).await {
            warn!(error = %e, "could not reflect connected state");
        }
    }

    /// Reflect the blocked indicator into the bus
    pub async fn set_blocked(&self, value: bool) {
        let tree = self.tree.lock().await;
        if let Err(e) = tree.set_blocked(self.bus(), value).await {
            warn!(error = %e, "could not reflect blocked state");
        }
    }

    /// Acknowledge a state back to the bus with a neutral `0`
    pub async fn ack_zero(&self, key: &str) {
        if let Err(e) = self.bus.set_state(key, StateValue::acked(0)).await {
            warn!(key, error = %e, "could not acknowledge state");
        }
    }
}
