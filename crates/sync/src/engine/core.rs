//! Engine state machine and sync pass.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use civiport_common::{epoch_millis, AppError, ErrorReporter, StorageError};

use crate::action::{ActionKind, PendingAction};
use crate::connectivity::ConnectivityMonitor;
use crate::dead_letter::{DeadLetter, DeadLetterStore};
use crate::engine::events::{ListenerId, SyncEvent};
use crate::queue::{ActionQueue, QueueError, QueueStats};
use crate::remote::RemoteApi;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Actions in the snapshot this pass worked through.
    pub attempted: usize,
    /// Applied remotely and removed from the queue.
    pub succeeded: usize,
    /// Failed this pass (dead-lettered ones included).
    pub failed: usize,
    /// Evicted to the dead-letter store after retry exhaustion.
    pub dead_lettered: usize,
}

type Listener = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Long-lived coordinator between the queue, the remote API, and the
/// connectivity signal.
///
/// At most one sync pass runs at a time; a trigger while a pass is in
/// flight is dropped, which is safe because a pass always works on a
/// fresh snapshot of the whole queue.
pub struct SyncEngine {
    queue: Arc<ActionQueue>,
    remote: Arc<dyn RemoteApi>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    reporter: Arc<ErrorReporter>,
    dead_letters: DeadLetterStore,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    syncing: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<ActionQueue>,
        remote: Arc<dyn RemoteApi>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        reporter: Arc<ErrorReporter>,
        dead_letters: DeadLetterStore,
    ) -> Self {
        Self {
            queue,
            remote,
            connectivity,
            reporter,
            dead_letters,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            syncing: AtomicBool::new(false),
        }
    }

    /// Capture an action and notify listeners. The action is durable
    /// before this returns; no sync is attempted here.
    pub async fn queue_action(
        &self,
        kind: ActionKind,
        payload: Value,
    ) -> Result<PendingAction, SyncError> {
        let action = self.queue.enqueue(kind, payload).await?;
        self.emit(SyncEvent::Queued);
        Ok(action)
    }

    /// Run one sync pass. A concurrent trigger is ignored and reported
    /// as an empty pass.
    #[instrument(skip(self))]
    pub async fn sync_pending_actions(&self) -> Result<SyncReport, SyncError> {
        if self.syncing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err()
        {
            debug!("sync already in progress, trigger ignored");
            return Ok(SyncReport::default());
        }

        let result = self.run_pass().await;
        self.syncing.store(false, Ordering::SeqCst);
        result
    }

    async fn run_pass(&self) -> Result<SyncReport, SyncError> {
        if !self.connectivity.is_online() {
            debug!("sync requested while offline");
            self.emit(SyncEvent::Offline);
            return Ok(SyncReport::default());
        }

        let snapshot = self.queue.list().await;
        if snapshot.is_empty() {
            return Ok(SyncReport::default());
        }

        self.emit(SyncEvent::Syncing);
        info!(pending = snapshot.len(), "sync pass started");

        let max_retries = self.queue.config().max_retries;
        let mut report = SyncReport { attempted: snapshot.len(), ..SyncReport::default() };

        for action in &snapshot {
            match self.remote.apply(action).await {
                Ok(()) => {
                    self.queue.remove(action.id).await?;
                    report.succeeded += 1;
                }
                Err(err) => {
                    report.failed += 1;
                    self.reporter
                        .report(
                            AppError::from_classified(&err)
                                .with_context("action_id", action.id.to_string())
                                .with_context("kind", action.kind.to_string()),
                        )
                        .await;

                    if action.retry_count >= max_retries {
                        let letter = DeadLetter {
                            action: action.clone(),
                            failed_at_ms: epoch_millis(),
                            last_error: err.to_string(),
                        };
                        // Park the action durably first; it leaves the
                        // queue only once the dead letter is persisted.
                        match self.dead_letters.push(letter).await {
                            Ok(()) => {
                                self.queue.remove(action.id).await?;
                                report.dead_lettered += 1;
                            }
                            Err(push_err) => {
                                warn!(
                                    action_id = %action.id,
                                    error = %push_err,
                                    "dead-letter persist failed, action stays queued"
                                );
                            }
                        }
                    } else {
                        self.queue.increment_retry(action.id).await?;
                    }
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            "sync pass finished"
        );

        if report.succeeded > 0 {
            self.emit(SyncEvent::SyncComplete);
        } else if report.failed > 0 {
            self.emit(SyncEvent::SyncFailed);
        }
        Ok(report)
    }

    /// Clear the queue without syncing and notify listeners.
    pub async fn clear_queue(&self) -> Result<usize, SyncError> {
        let discarded = self.queue.clear().await?;
        self.emit(SyncEvent::Cleared);
        Ok(discarded)
    }

    /// Register a listener; invoked synchronously, in registration
    /// order, for every emitted event.
    pub fn add_listener(&self, listener: impl Fn(SyncEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(listener_id, _)| *listener_id != id);
        }
    }

    fn emit(&self, event: SyncEvent) {
        // Clone handles out so listener code never runs under the lock.
        let snapshot: Vec<Listener> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => {
                warn!("listener registry lock poisoned, event dropped");
                return;
            }
        };
        debug!(event = %event, listeners = snapshot.len(), "emitting sync event");
        for listener in snapshot {
            listener(event);
        }
    }

    /// Spawn a background task that triggers a sync pass on every
    /// offline-to-online transition.
    pub fn spawn_connectivity_listener(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = self;
        let mut rx = engine.connectivity.subscribe();
        tokio::spawn(async move {
            let mut was_online = *rx.borrow();
            while rx.changed().await.is_ok() {
                let online = *rx.borrow();
                if online && !was_online {
                    info!("connectivity restored, triggering sync");
                    if let Err(err) = engine.sync_pending_actions().await {
                        warn!(error = %err, "connectivity-triggered sync failed");
                    }
                }
                was_online = online;
            }
        })
    }

    pub async fn stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    pub fn recent_errors(&self, n: usize) -> Vec<AppError> {
        self.reporter.recent_errors(n)
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, SyncError> {
        Ok(self.dead_letters.list().await?)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }
}
