//! Queue state and persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use civiport_common::{epoch_millis, PersistentStore};

use crate::action::{ActionKind, PendingAction};
use crate::queue::errors::{QueueError, QueueResult};

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Hard cap on pending actions; enqueue beyond this fails.
    pub max_capacity: usize,
    /// Store key the queue blob is written under.
    pub store_key: String,
    /// Store key the dead-letter blob is written under.
    pub dead_letter_key: String,
    /// Failed passes an action survives before it is dead-lettered.
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            store_key: "action_queue".to_string(),
            dead_letter_key: "dead_letters".to_string(),
            max_retries: 3,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> QueueResult<()> {
        if self.max_capacity == 0 {
            return Err(QueueError::InvalidConfig(
                "max_capacity must be greater than 0".to_string(),
            ));
        }
        if self.store_key.is_empty() {
            return Err(QueueError::InvalidConfig("store_key must not be empty".to_string()));
        }
        if self.store_key == self.dead_letter_key {
            return Err(QueueError::InvalidConfig(
                "store_key and dead_letter_key must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time queue composition for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub total: usize,
    pub by_kind: BTreeMap<ActionKind, usize>,
}

/// Durable FIFO of pending actions.
///
/// All access funnels through one async mutex, so mutations are
/// serialized; persistence completes before any mutating call returns.
pub struct ActionQueue {
    config: QueueConfig,
    store: Arc<dyn PersistentStore>,
    items: Mutex<Vec<PendingAction>>,
}

impl ActionQueue {
    /// Open the queue, restoring any previously persisted blob.
    ///
    /// An unreadable blob is logged and treated as empty rather than
    /// wedging startup.
    #[instrument(skip(store))]
    pub async fn load(config: QueueConfig, store: Arc<dyn PersistentStore>) -> QueueResult<Self> {
        config.validate()?;

        let items = match store.get(&config.store_key).await? {
            Some(raw) => match serde_json::from_str::<Vec<PendingAction>>(&raw) {
                Ok(items) => items,
                Err(err) => {
                    warn!(error = %err, "discarding unreadable queue blob");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        debug!(restored = items.len(), "action queue loaded");

        Ok(Self { config, store, items: Mutex::new(items) })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Capture a new action. The queue blob is persisted before the
    /// action is returned; on persistence failure the in-memory state is
    /// rolled back and the error surfaced.
    #[instrument(skip(self, payload), fields(kind = %kind))]
    pub async fn enqueue(&self, kind: ActionKind, payload: Value) -> QueueResult<PendingAction> {
        let mut items = self.items.lock().await;
        if items.len() >= self.config.max_capacity {
            return Err(QueueError::CapacityExceeded(self.config.max_capacity));
        }

        let action = PendingAction::new(kind, payload, epoch_millis());
        items.push(action.clone());

        if let Err(err) = self.persist(&items).await {
            items.pop();
            return Err(err);
        }
        debug!(action_id = %action.id, pending = items.len(), "action enqueued");
        Ok(action)
    }

    /// Snapshot of pending actions in enqueue order.
    pub async fn list(&self) -> Vec<PendingAction> {
        self.items.lock().await.clone()
    }

    /// Remove an action by id; absent ids are a no-op. On persistence
    /// failure the in-memory state is rolled back.
    pub async fn remove(&self, id: Uuid) -> QueueResult<()> {
        let mut items = self.items.lock().await;
        let Some(index) = items.iter().position(|action| action.id == id) else {
            return Ok(());
        };
        let removed = items.remove(index);
        if let Err(err) = self.persist(&items).await {
            items.insert(index, removed);
            return Err(err);
        }
        debug!(action_id = %id, "action removed");
        Ok(())
    }

    /// Bump an action's retry counter; absent ids are a no-op. On
    /// persistence failure the in-memory state is rolled back.
    pub async fn increment_retry(&self, id: Uuid) -> QueueResult<()> {
        let mut items = self.items.lock().await;
        let Some(index) = items.iter().position(|action| action.id == id) else {
            return Ok(());
        };
        items[index].retry_count += 1;
        if let Err(err) = self.persist(&items).await {
            items[index].retry_count -= 1;
            return Err(err);
        }
        Ok(())
    }

    /// Drop every pending action, returning how many were discarded.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> QueueResult<usize> {
        let mut items = self.items.lock().await;
        let discarded = items.len();
        items.clear();
        self.persist(&items).await?;
        debug!(discarded, "queue cleared");
        Ok(discarded)
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    pub async fn stats(&self) -> QueueStats {
        let items = self.items.lock().await;
        let mut by_kind = BTreeMap::new();
        for action in items.iter() {
            *by_kind.entry(action.kind).or_insert(0) += 1;
        }
        QueueStats { total: items.len(), by_kind }
    }

    async fn persist(&self, items: &[PendingAction]) -> QueueResult<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(&self.config.store_key, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use civiport_common::MemoryStore;

    use super::*;

    async fn queue() -> (ActionQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let queue = ActionQueue::load(QueueConfig::default(), store.clone()).await.unwrap();
        (queue, store)
    }

    #[tokio::test]
    async fn enqueue_lists_in_insertion_order() {
        let (queue, _store) = queue().await;

        let a = queue.enqueue(ActionKind::IssueReport, serde_json::json!({"n": 1})).await.unwrap();
        let b = queue.enqueue(ActionKind::PollVote, serde_json::json!({"n": 2})).await.unwrap();
        let c = queue.enqueue(ActionKind::ForumPost, serde_json::json!({"n": 3})).await.unwrap();

        let ids: Vec<_> = queue.list().await.into_iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn enqueue_persists_before_returning() {
        let (queue, store) = queue().await;
        queue.enqueue(ActionKind::FeedbackSubmit, Value::Null).await.unwrap();

        let raw = store.get("action_queue").await.unwrap().unwrap();
        let persisted: Vec<PendingAction> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_noop_for_absent_id() {
        let (queue, _store) = queue().await;
        queue.enqueue(ActionKind::PollVote, Value::Null).await.unwrap();

        queue.remove(Uuid::now_v7()).await.unwrap();
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn remove_round_trip_leaves_queue_empty() {
        let (queue, _store) = queue().await;
        let action = queue.enqueue(ActionKind::PaymentSubmit, Value::Null).await.unwrap();

        queue.remove(action.id).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn increment_retry_touches_only_the_target() {
        let (queue, _store) = queue().await;
        let a = queue.enqueue(ActionKind::IssueReport, Value::Null).await.unwrap();
        let b = queue.enqueue(ActionKind::IssueReport, Value::Null).await.unwrap();

        queue.increment_retry(a.id).await.unwrap();
        queue.increment_retry(a.id).await.unwrap();

        let items = queue.list().await;
        assert_eq!(items.iter().find(|x| x.id == a.id).unwrap().retry_count, 2);
        assert_eq!(items.iter().find(|x| x.id == b.id).unwrap().retry_count, 0);
    }

    #[tokio::test]
    async fn capacity_is_enforced_without_state_change() {
        let config = QueueConfig { max_capacity: 2, ..QueueConfig::default() };
        let store = Arc::new(MemoryStore::new());
        let queue = ActionQueue::load(config, store).await.unwrap();

        queue.enqueue(ActionKind::ForumPost, Value::Null).await.unwrap();
        queue.enqueue(ActionKind::ForumPost, Value::Null).await.unwrap();

        let result = queue.enqueue(ActionKind::ForumPost, Value::Null).await;
        assert!(matches!(result, Err(QueueError::CapacityExceeded(2))));
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn load_restores_persisted_actions() {
        let store = Arc::new(MemoryStore::new());
        {
            let queue =
                ActionQueue::load(QueueConfig::default(), store.clone()).await.unwrap();
            queue.enqueue(ActionKind::PollVote, serde_json::json!({"poll": "p1"})).await.unwrap();
            queue.enqueue(ActionKind::PollVote, serde_json::json!({"poll": "p2"})).await.unwrap();
        }

        let reopened = ActionQueue::load(QueueConfig::default(), store).await.unwrap();
        assert_eq!(reopened.len().await, 2);
    }

    #[tokio::test]
    async fn load_tolerates_corrupt_blob() {
        let store = Arc::new(MemoryStore::new());
        store.set("action_queue", "not json".to_string()).await.unwrap();

        let queue = ActionQueue::load(QueueConfig::default(), store).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn clear_reports_discarded_count() {
        let (queue, store) = queue().await;
        queue.enqueue(ActionKind::FeedbackSubmit, Value::Null).await.unwrap();
        queue.enqueue(ActionKind::FeedbackSubmit, Value::Null).await.unwrap();

        assert_eq!(queue.clear().await.unwrap(), 2);
        assert!(queue.is_empty().await);

        let raw = store.get("action_queue").await.unwrap().unwrap();
        assert_eq!(raw, "[]");
    }

    #[tokio::test]
    async fn stats_group_by_kind() {
        let (queue, _store) = queue().await;
        queue.enqueue(ActionKind::IssueReport, Value::Null).await.unwrap();
        queue.enqueue(ActionKind::IssueReport, Value::Null).await.unwrap();
        queue.enqueue(ActionKind::PollVote, Value::Null).await.unwrap();

        let stats = queue.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind[&ActionKind::IssueReport], 2);
        assert_eq!(stats.by_kind[&ActionKind::PollVote], 1);
    }

    #[tokio::test]
    async fn persist_failure_rolls_back_remove_and_retry() {
        use std::sync::atomic::{AtomicBool, Ordering};

        use civiport_common::{StorageError, StoreResult};

        struct FlakyStore {
            inner: MemoryStore,
            fail_sets: AtomicBool,
        }

        #[async_trait::async_trait]
        impl PersistentStore for FlakyStore {
            async fn get(&self, key: &str) -> StoreResult<Option<String>> {
                self.inner.get(key).await
            }

            async fn set(&self, key: &str, value: String) -> StoreResult<()> {
                if self.fail_sets.load(Ordering::SeqCst) {
                    return Err(StorageError::Unavailable("write refused".to_string()));
                }
                self.inner.set(key, value).await
            }

            async fn remove(&self, key: &str) -> StoreResult<()> {
                self.inner.remove(key).await
            }
        }

        let store =
            Arc::new(FlakyStore { inner: MemoryStore::new(), fail_sets: AtomicBool::new(false) });
        let queue = ActionQueue::load(QueueConfig::default(), store.clone()).await.unwrap();
        let action = queue.enqueue(ActionKind::IssueReport, Value::Null).await.unwrap();

        store.fail_sets.store(true, Ordering::SeqCst);

        assert!(queue.remove(action.id).await.is_err());
        assert_eq!(queue.list().await.len(), 1);

        assert!(queue.increment_retry(action.id).await.is_err());
        assert_eq!(queue.list().await[0].retry_count, 0);

        store.fail_sets.store(false, Ordering::SeqCst);
        queue.remove(action.id).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn config_validation_rejects_degenerate_values() {
        let store = Arc::new(MemoryStore::new());
        let config = QueueConfig { max_capacity: 0, ..QueueConfig::default() };
        assert!(ActionQueue::load(config, store.clone()).await.is_err());

        let config = QueueConfig {
            dead_letter_key: "action_queue".to_string(),
            ..QueueConfig::default()
        };
        assert!(ActionQueue::load(config, store).await.is_err());
    }
}
