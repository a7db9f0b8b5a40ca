//! Hub discovery
//!
//! The UDP broadcast listener is an external collaborator behind
//! [`DiscoveryTransport`]. The [`DiscoveryWatcher`] wraps it, filters
//! advertisements down to the configured target hub, and answers
//! `browse` requests with a snapshot of every hub currently known.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default wait before answering a browse request
pub const DEFAULT_BROWSE_TIMEOUT_MS: i64 = 5000;

/// Broadcast capacity for watcher subscribers
const EVENT_CAPACITY: usize = 16;

/// Discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery transport error: {0}")]
    Transport(String),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A hub as seen in a discovery advertisement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubInfo {
    pub uuid: Uuid,

    /// Host name the hub advertises; the bridge matches its configured
    /// target against this
    pub host_name: String,

    pub ip: String,

    /// Remainder of the advertisement, passed through to storage and
    /// browse replies
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HubInfo {
    pub fn new(uuid: Uuid, host_name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            uuid,
            host_name: host_name.into(),
            ip: ip.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Raw event from the discovery transport
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// An advertisement was seen
    Online(HubInfo),
    /// A previously seen hub stopped advertising
    Offline(HubInfo),
    /// Listener-level error; discovery keeps running
    Error(String),
}

/// The UDP advertisement listener, specified at its interface
pub trait DiscoveryTransport: Send + Sync {
    fn start(&self) -> DiscoveryResult<()>;

    /// Idempotent
    fn stop(&self);

    fn events(&self) -> broadcast::Receiver<DiscoveryEvent>;

    /// Snapshot of every hub currently advertising
    fn known_hubs(&self) -> Vec<HubInfo>;
}

/// Filtered event for the configured target hub
#[derive(Debug, Clone)]
pub enum HubEvent {
    Online(HubInfo),
    Lost(HubInfo),
}

/// Reply to a browse request
#[derive(Debug, Clone, Serialize)]
pub struct BrowseReply {
    pub error: u8,
    pub message: BrowseMessage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BrowseMessage {
    Hubs(Vec<HubInfo>),
    Text(String),
}

impl BrowseReply {
    fn hubs(hubs: Vec<HubInfo>) -> Self {
        Self {
            error: 0,
            message: BrowseMessage::Hubs(hubs),
        }
    }

    fn inactive() -> Self {
        Self {
            error: 1,
            message: BrowseMessage::Text("discovery not active, see logs".to_string()),
        }
    }
}

/// Wraps the discovery transport and forwards only the target hub's
/// advertisements as [`HubEvent`]s
pub struct DiscoveryWatcher {
    transport: Arc<dyn DiscoveryTransport>,
    target: String,
    active: Arc<AtomicBool>,
    event_tx: broadcast::Sender<HubEvent>,
    forward_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DiscoveryWatcher {
    pub fn new(transport: Arc<dyn DiscoveryTransport>, target: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transport,
            target: target.into(),
            active: Arc::new(AtomicBool::new(false)),
            event_tx,
            forward_task: std::sync::Mutex::new(None),
        }
    }

    /// Begin listening for advertisements. Calling this while already
    /// listening is a warned no-op.
    pub fn start(&self) -> DiscoveryResult<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            warn!("discovery already started");
            return Ok(());
        }

        if let Err(e) = self.transport.start() {
            self.active.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let mut rx = self.transport.events();
        let tx = self.event_tx.clone();
        let target = self.target.clone();
        let active = self.active.clone();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(DiscoveryEvent::Online(hub)) => {
                        info!(hub = %hub.host_name, "discovered hub");
                        if hub.host_name == target {
                            let _ = tx.send(HubEvent::Online(hub));
                        }
                    }
                    Ok(DiscoveryEvent::Offline(hub)) => {
                        warn!(hub = %hub.host_name, "lost hub");
                        if hub.host_name == target {
                            let _ = tx.send(HubEvent::Lost(hub));
                        }
                    }
                    Ok(DiscoveryEvent::Error(e)) => {
                        warn!(error = %e, "discovery error");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "discovery watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("discovery transport closed");
                        active.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });
        *self.forward_task.lock().unwrap() = Some(handle);

        debug!(target = %self.target, "discovery started");
        Ok(())
    }

    /// Stop listening; idempotent.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(task) = self.forward_task.lock().unwrap().take() {
                task.abort();
            }
            self.transport.stop();
            debug!("discovery stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Subscribe to target-hub events
    pub fn events(&self) -> broadcast::Receiver<HubEvent> {
        self.event_tx.subscribe()
    }

    /// Answer a browse request: wait out the timeout (default 5000 ms,
    /// clamped non-negative), then snapshot the known hubs. Replies
    /// immediately with `error: 1` when discovery is inactive.
    pub async fn browse(&self, timeout_ms: Option<i64>) -> BrowseReply {
        if !self.is_active() {
            return BrowseReply::inactive();
        }
        let timeout = timeout_ms.unwrap_or(DEFAULT_BROWSE_TIMEOUT_MS).max(0) as u64;
        tokio::time::sleep(Duration::from_millis(timeout)).await;
        BrowseReply::hubs(self.transport.known_hubs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted transport for watcher tests
    struct ScriptedTransport {
        event_tx: broadcast::Sender<DiscoveryEvent>,
        hubs: Mutex<Vec<HubInfo>>,
        started: AtomicBool,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            let (event_tx, _) = broadcast::channel(16);
            Self {
                event_tx,
                hubs: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
            }
        }

        fn advertise(&self, hub: HubInfo) {
            self.hubs.lock().unwrap().push(hub.clone());
            let _ = self.event_tx.send(DiscoveryEvent::Online(hub));
        }

        fn drop_hub(&self, hub: HubInfo) {
            self.hubs.lock().unwrap().retain(|h| h.uuid != hub.uuid);
            let _ = self.event_tx.send(DiscoveryEvent::Offline(hub));
        }
    }

    impl DiscoveryTransport for ScriptedTransport {
        fn start(&self) -> DiscoveryResult<()> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.started.store(false, Ordering::SeqCst);
        }

        fn events(&self) -> broadcast::Receiver<DiscoveryEvent> {
            self.event_tx.subscribe()
        }

        fn known_hubs(&self) -> Vec<HubInfo> {
            self.hubs.lock().unwrap().clone()
        }
    }

    fn hub(name: &str) -> HubInfo {
        HubInfo::new(Uuid::new_v4(), name, "192.168.1.20")
    }

    #[tokio::test]
    async fn test_forwards_only_target_hub() {
        let transport = Arc::new(ScriptedTransport::new());
        let watcher = DiscoveryWatcher::new(transport.clone(), "Living Room");
        watcher.start().unwrap();
        let mut events = watcher.events();

        transport.advertise(hub("Other Hub"));
        transport.advertise(hub("Living Room"));

        let event = events.recv().await.unwrap();
        match event {
            HubEvent::Online(h) => assert_eq!(h.host_name, "Living Room"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lost_target_hub_forwarded() {
        let transport = Arc::new(ScriptedTransport::new());
        let watcher = DiscoveryWatcher::new(transport.clone(), "Living Room");
        watcher.start().unwrap();
        let mut events = watcher.events();

        let target = hub("Living Room");
        transport.advertise(target.clone());
        transport.drop_hub(target);

        assert!(matches!(events.recv().await.unwrap(), HubEvent::Online(_)));
        assert!(matches!(events.recv().await.unwrap(), HubEvent::Lost(_)));
    }

    #[tokio::test]
    async fn test_double_start_is_noop() {
        let transport = Arc::new(ScriptedTransport::new());
        let watcher = DiscoveryWatcher::new(transport, "Living Room");
        watcher.start().unwrap();
        watcher.start().unwrap();
        assert!(watcher.is_active());
    }

    #[tokio::test]
    async fn test_stop_idempotent() {
        let transport = Arc::new(ScriptedTransport::new());
        let watcher = DiscoveryWatcher::new(transport.clone(), "Living Room");
        watcher.start().unwrap();
        watcher.stop();
        watcher.stop();
        assert!(!watcher.is_active());
        assert!(!transport.started.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_browse_inactive_replies_immediately() {
        let transport = Arc::new(ScriptedTransport::new());
        let watcher = DiscoveryWatcher::new(transport, "Living Room");

        let reply = watcher.browse(Some(0)).await;
        assert_eq!(reply.error, 1);
        assert!(matches!(reply.message, BrowseMessage::Text(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_browse_snapshots_after_timeout() {
        let transport = Arc::new(ScriptedTransport::new());
        let watcher = DiscoveryWatcher::new(transport.clone(), "Living Room");
        watcher.start().unwrap();

        transport.advertise(hub("Living Room"));
        transport.advertise(hub("Other Hub"));

        let reply = watcher.browse(Some(100)).await;
        assert_eq!(reply.error, 0);
        match reply.message {
            BrowseMessage::Hubs(hubs) => assert_eq!(hubs.len(), 2),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_browse_clamps_negative_timeout() {
        let transport = Arc::new(ScriptedTransport::new());
        let watcher = DiscoveryWatcher::new(transport, "Living Room");
        watcher.start().unwrap();

        let reply = watcher.browse(Some(-500)).await;
        assert_eq!(reply.error, 0);
    }
}
