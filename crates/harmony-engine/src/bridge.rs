//! Bridge wiring
//!
//! Connects the collaborators end to end: discovery advertisements drive
//! the session lifecycle, bus command writes flow through the queue to
//! the activity state machine or the command sender, and the queue's
//! busy signal is reflected as the hub-blocked indicator.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use harmony_bus::StateBus;
use harmony_client::HubConnector;
use harmony_core::{BridgeConfig, StateChangeRequest};
use harmony_discovery::{BrowseReply, DiscoveryTransport, DiscoveryWatcher, HubEvent};

use crate::queue::{CommandQueue, CommandReceiver};
use crate::{activity, sender, EngineResult, SessionContext, SessionManager};

pub struct HarmonyBridge {
    ctx: Arc<SessionContext>,
    session: Arc<SessionManager>,
    watcher: Arc<DiscoveryWatcher>,
    queue: CommandQueue,
    receiver: Mutex<Option<CommandReceiver>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HarmonyBridge {
    pub fn new(
        config: BridgeConfig,
        bus: Arc<dyn StateBus>,
        connector: Arc<dyn HubConnector>,
        transport: Arc<dyn DiscoveryTransport>,
    ) -> Self {
        let watcher = Arc::new(DiscoveryWatcher::new(transport, config.hub.clone()));
        let ctx = Arc::new(SessionContext::new(config, bus));
        let session = Arc::new(SessionManager::new(ctx.clone(), connector));
        let (queue, receiver) = CommandQueue::new();
        Self {
            ctx,
            session,
            watcher,
            queue,
            receiver: Mutex::new(Some(receiver)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Bootstrap the mirror, wire up the processing loops, and start
    /// discovery. Connecting happens once the target hub advertises.
    pub async fn start(&self) -> EngineResult<()> {
        let Some(receiver) = self.receiver.lock().await.take() else {
            warn!("bridge already started");
            return Ok(());
        };

        {
            let mut tree = self.ctx.tree.lock().await;
            tree.bootstrap(self.ctx.bus()).await?;
        }

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.spawn_write_loop());
        tasks.push(self.spawn_worker(receiver));
        tasks.push(self.spawn_blocked_reflection());
        tasks.push(self.spawn_discovery_loop());
        drop(tasks);

        self.watcher.start()?;
        info!(hub = %self.ctx.config().hub, "bridge started");
        Ok(())
    }

    /// Stop discovery and tear down the session and processing loops.
    pub async fn stop(&self) {
        info!("terminating");
        self.watcher.stop();
        self.session.stop().await;
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    /// Answer a browse request with the currently known hubs.
    pub async fn browse(&self, timeout_ms: Option<i64>) -> BrowseReply {
        let timeout = timeout_ms.unwrap_or(self.ctx.config().browse_timeout_ms as i64);
        self.watcher.browse(Some(timeout)).await
    }

    /// Classify command writes under the hub root and feed them to the
    /// queue. Reflections (`ack: true`) and other roots are ignored.
    fn spawn_write_loop(&self) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let queue_tx = self.queue_handle();
        let mut writes = self.ctx.bus().watch();
        tokio::spawn(async move {
            let root = ctx.hub_root();
            let prefix = format!("{root}.");
            loop {
                match writes.recv().await {
                    Ok(write) => {
                        if write.value.ack || !write.key.starts_with(&prefix) {
                            continue;
                        }
                        queue_tx.submit(StateChangeRequest::classify(
                            &root,
                            &write.key,
                            &write.value.val,
                        ));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "state change listener lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// The single execution slot: one request at a time, in arrival
    /// order.
    fn spawn_worker(&self, mut receiver: CommandReceiver) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            while let Some(request) = receiver.next().await {
                execute(&ctx, request).await;
                receiver.complete();
            }
        })
    }

    /// Reflect the queue's busy signal as the hub-blocked indicator.
    fn spawn_blocked_reflection(&self) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let mut busy = self.queue.busy_signal();
        tokio::spawn(async move {
            while busy.changed().await.is_ok() {
                let blocked = *busy.borrow_and_update();
                ctx.set_blocked(blocked).await;
            }
        })
    }

    /// React to target-hub advertisements: connect after the settle
    /// delay, tear down when the hub disappears.
    fn spawn_discovery_loop(&self) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let session = self.session.clone();
        let mut events = self.watcher.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(HubEvent::Online(hub)) => {
                        info!(hub = %hub.host_name, "target hub advertised, connecting shortly");
                        tokio::time::sleep(ctx.config().settle_delay()).await;
                        session.connect(&hub).await;
                    }
                    Ok(HubEvent::Lost(hub)) => {
                        warn!(hub = %hub.host_name, "target hub lost");
                        session.stop().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "discovery event listener lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn queue_handle(&self) -> CommandQueue {
        self.queue.clone()
    }
}

async fn execute(ctx: &SessionContext, request: StateChangeRequest) {
    match request {
        StateChangeRequest::SwitchActivity { label, value } => {
            activity::switch_activity(ctx, label.as_deref(), value).await;
        }
        StateChangeRequest::CurrentActivityWrite { .. } => {
            warn!("state change not implemented (currentActivity)");
        }
        StateChangeRequest::DeviceCommand { key, duration } => match duration {
            Some(ms) => sender::send_command(ctx, &key, ms).await,
            None => ctx.ack_zero(&key).await,
        },
        StateChangeRequest::Unknown { key } => {
            warn!(key, "unknown state change");
        }
    }
}
