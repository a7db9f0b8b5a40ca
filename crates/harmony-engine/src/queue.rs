//! Single-slot command queue
//!
//! The hub accepts one logical command interaction at a time; interleaved
//! presses corrupt hub state. The queue admits exactly one request for
//! execution, holds the rest in arrival order, and exposes a busy/idle
//! watch signal: asserted when work is pending, cleared only once the
//! queue drains to empty — a debounced "hub is momentarily idle" signal
//! rather than a per-request toggle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use harmony_core::StateChangeRequest;

/// Submission side of the queue
#[derive(Clone)]
pub struct CommandQueue {
    tx: mpsc::UnboundedSender<StateChangeRequest>,
    pending: Arc<AtomicUsize>,
    busy_tx: Arc<watch::Sender<bool>>,
}

/// Execution side; owned by the single worker
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<StateChangeRequest>,
    pending: Arc<AtomicUsize>,
    busy_tx: Arc<watch::Sender<bool>>,
}

impl CommandQueue {
    pub fn new() -> (Self, CommandReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let (busy_tx, _) = watch::channel(false);
        let busy_tx = Arc::new(busy_tx);
        (
            Self {
                tx,
                pending: pending.clone(),
                busy_tx: busy_tx.clone(),
            },
            CommandReceiver {
                rx,
                pending,
                busy_tx,
            },
        )
    }

    /// Admit a request. Requests arriving while one is in flight wait
    /// their turn in arrival order.
    pub fn submit(&self, request: StateChangeRequest) {
        let waiting = self.pending.fetch_add(1, Ordering::SeqCst);
        if waiting > 0 {
            info!(?request, "hub busy, state change queued");
        }
        let _ = self.busy_tx.send(true);
        if self.tx.send(request).is_err() {
            warn!("command worker gone, dropping request");
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Observe the busy/idle signal
    pub fn busy_signal(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }
}

impl CommandReceiver {
    /// Next request to execute; `None` once every submitter is gone
    pub async fn next(&mut self) -> Option<StateChangeRequest> {
        self.rx.recv().await
    }

    /// Mark the current request complete. Clears the busy signal only
    /// when no further work is pending.
    pub fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("command queue drained");
            let _ = self.busy_tx.send(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> StateChangeRequest {
        StateChangeRequest::DeviceCommand {
            key: key.to_string(),
            duration: Some(100),
        }
    }

    #[tokio::test]
    async fn test_requests_drain_in_arrival_order() {
        let (queue, mut receiver) = CommandQueue::new();
        queue.submit(request("hub.TV.a"));
        queue.submit(request("hub.TV.b"));
        queue.submit(request("hub.TV.c"));

        for expected in ["hub.TV.a", "hub.TV.b", "hub.TV.c"] {
            match receiver.next().await.unwrap() {
                StateChangeRequest::DeviceCommand { key, .. } => assert_eq!(key, expected),
                other => panic!("unexpected request: {other:?}"),
            }
            receiver.complete();
        }
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_busy_clears_only_on_drain() {
        let (queue, mut receiver) = CommandQueue::new();
        let busy = queue.busy_signal();

        queue.submit(request("hub.TV.a"));
        queue.submit(request("hub.TV.b"));
        assert!(*busy.borrow());

        receiver.next().await.unwrap();
        receiver.complete();
        // One request still pending: busy stays asserted
        assert!(*busy.borrow());

        receiver.next().await.unwrap();
        receiver.complete();
        assert!(!*busy.borrow());
    }

    #[tokio::test]
    async fn test_idle_queue_starts_unasserted() {
        let (queue, _receiver) = CommandQueue::new();
        assert!(queue.is_idle());
        assert!(!*queue.busy_signal().borrow());
    }
}
