//! Session lifecycle
//!
//! Owns the connect → keep-alive → digest-listen → disconnect lifecycle
//! for exactly one hub session at a time. Any failure at any stage falls
//! back to `Disconnected` with full cleanup; the next discovery
//! advertisement triggers the retry.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use harmony_client::{bounded, HubConnector};
use harmony_core::{SessionPhase, StateDigest};
use harmony_discovery::HubInfo;

use crate::{activity, SessionContext};

/// Wire method polled by the keep-alive probe and the initial
/// current-activity fetch
const CURRENT_ACTIVITY_METHOD: &str = "getCurrentActivity";

pub struct SessionManager {
    ctx: Arc<SessionContext>,
    connector: Arc<dyn HubConnector>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(ctx: Arc<SessionContext>, connector: Arc<dyn HubConnector>) -> Self {
        Self {
            ctx,
            connector,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Establish a session with the advertised hub, synchronize the
    /// mirror, seed the activity reflection, and start listening for
    /// digests. On any failure the session is torn down and the phase
    /// returns to `Disconnected`.
    pub async fn connect(&self, hub: &HubInfo) {
        if self.ctx.phase().await != SessionPhase::Disconnected {
            debug!(hub = %hub.host_name, "session already in progress, ignoring advertisement");
            return;
        }
        self.ctx.transition(SessionPhase::Connecting).await;
        info!(hub = %hub.host_name, "connecting to hub");

        let timeout = self.ctx.config().request_timeout();
        let client = match bounded(timeout, self.connector.connect(&hub.ip)).await {
            Ok(client) => client,
            Err(e) => {
                warn!(hub = %hub.host_name, error = %e, "could not connect");
                self.stop().await;
                return;
            }
        };

        self.ctx.start_session(client.clone()).await;
        self.ctx.set_blocked(true).await;
        self.ctx.set_connected(true).await;
        info!(hub = %hub.host_name, "connected to hub");

        self.spawn_keep_alive().await;

        self.ctx.transition(SessionPhase::SyncingConfig).await;
        let catalog = match bounded(timeout, client.available_commands()).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "could not get config");
                self.stop().await;
                return;
            }
        };

        let sync_result = {
            let mut tree = self.ctx.tree.lock().await;
            let mut maps = self.ctx.maps.write().await;
            let mut synchronizer = self.ctx.synchronizer.lock().await;
            synchronizer
                .synchronize(self.ctx.bus(), &mut tree, &mut maps, hub, &catalog)
                .await
        };
        if let Err(e) = sync_result {
            error!(error = %e, "config sync failed");
            self.stop().await;
            return;
        }

        match bounded(timeout, client.request(CURRENT_ACTIVITY_METHOD)).await {
            Ok(response) => {
                if let Some(id) = activity_id_from_response(&response) {
                    activity::seed_current_activity(&self.ctx, &id).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "connection down");
                self.stop().await;
                return;
            }
        }

        // Digests subscribe only after synchronization has completed, so
        // none is processed against absent identifier maps.
        self.spawn_digest_listener(client.digests()).await;
        self.ctx.transition(SessionPhase::Live).await;
    }

    /// Probe the session every keep-alive tick. A failed probe is logged
    /// and retried on the next tick; it does not by itself tear the
    /// session down — wire-level disconnects and discovery loss are the
    /// failure detectors.
    async fn spawn_keep_alive(&self) {
        let ctx = self.ctx.clone();
        let handle = tokio::spawn(async move {
            let interval = ctx.config().keep_alive_interval();
            let timeout = ctx.config().request_timeout();
            loop {
                tokio::time::sleep(interval).await;
                let Some(client) = ctx.client().await else {
                    break;
                };
                if let Err(e) = bounded(timeout, client.request(CURRENT_ACTIVITY_METHOD)).await {
                    warn!(error = %e, "keep alive could not get current activity");
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    async fn spawn_digest_listener(&self, mut digests: broadcast::Receiver<StateDigest>) {
        let ctx = self.ctx.clone();
        let handle = tokio::spawn(async move {
            loop {
                match digests.recv().await {
                    Ok(digest) => {
                        debug!(activity_id = %digest.activity_id, status = ?digest.status, "digest received");
                        activity::apply_digest(&ctx, &digest).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "digest listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("digest stream closed");
                        break;
                    }
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    /// Tear the session down. Unconditionally reflects disconnected and
    /// unblocked, ends the wire session if one exists, and returns the
    /// phase to `Disconnected`. Safe to call with no session.
    pub async fn stop(&self) {
        self.ctx.set_connected(false).await;
        self.ctx.set_blocked(false).await;

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        if let Some(client) = self.ctx.take_client().await {
            client.end().await;
            warn!("session ended");
        }
        self.ctx.transition(SessionPhase::Disconnected).await;
    }
}

/// Pull the activity id out of a current-activity reply
fn activity_id_from_response(response: &serde_json::Value) -> Option<String> {
    match response.get("result") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
