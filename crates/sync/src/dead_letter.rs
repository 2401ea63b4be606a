//! Dead-letter retention for actions that exhausted their retries.
//!
//! Instead of silently dropping an action after its last failed pass,
//! the engine parks it here so the UI can surface it and the resident
//! can re-submit manually.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use civiport_common::PersistentStore;

use crate::action::PendingAction;
use crate::queue::{QueueError, QueueResult};

/// An action evicted from the queue after retry exhaustion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub action: PendingAction,
    pub failed_at_ms: u64,
    pub last_error: String,
}

/// Bounded durable list of dead letters; oldest dropped beyond capacity.
pub struct DeadLetterStore {
    store: Arc<dyn PersistentStore>,
    key: String,
    capacity: usize,
}

impl DeadLetterStore {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(store: Arc<dyn PersistentStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into(), capacity: Self::DEFAULT_CAPACITY }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub async fn push(&self, letter: DeadLetter) -> QueueResult<()> {
        warn!(
            action_id = %letter.action.id,
            kind = %letter.action.kind,
            error = %letter.last_error,
            "action dead-lettered after retry exhaustion"
        );

        let mut letters = self.read().await?;
        letters.push(letter);
        if letters.len() > self.capacity {
            let drop = letters.len() - self.capacity;
            letters.drain(..drop);
        }

        let raw = serde_json::to_string(&letters)?;
        self.store.set(&self.key, raw).await?;
        Ok(())
    }

    pub async fn list(&self) -> QueueResult<Vec<DeadLetter>> {
        self.read().await
    }

    pub async fn clear(&self) -> QueueResult<()> {
        self.store.remove(&self.key).await.map_err(QueueError::from)
    }

    async fn read(&self) -> QueueResult<Vec<DeadLetter>> {
        match self.store.get(&self.key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(letters) => Ok(letters),
                Err(err) => {
                    warn!(error = %err, "discarding unreadable dead-letter blob");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }
}
