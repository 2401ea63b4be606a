//! Centralized error reporting.
//!
//! [`ErrorReporter`] keeps a bounded in-memory history of normalized
//! [`AppError`]s, mirrors a bounded tail of that history into durable
//! storage, and forwards critical errors to an optional monitoring sink.
//! Reporting itself never fails: downstream persistence or sink failures
//! are logged and swallowed so error handling can never take the caller
//! down with it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::collections::RingBuffer;
use crate::error::{AppError, ErrorSeverity};
use crate::storage::PersistentStore;

/// Error returned by a [`MonitoringSink`] dispatch.
#[derive(Debug, Error)]
#[error("monitoring sink dispatch failed: {message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Destination for critical errors, typically an external monitoring
/// service. Dispatch is best-effort.
#[async_trait]
pub trait MonitoringSink: Send + Sync {
    async fn dispatch(&self, error: &AppError) -> Result<(), SinkError>;
}

/// Reporter tuning knobs.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// In-memory history capacity; oldest entries evicted beyond this.
    pub memory_capacity: usize,
    /// Durable log capacity; only the most recent entries are kept.
    pub log_capacity: usize,
    /// Store key the durable log is written under.
    pub log_key: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self { memory_capacity: 1_000, log_capacity: 100, log_key: "error_log".to_string() }
    }
}

/// Collects normalized errors from every subsystem.
pub struct ErrorReporter {
    config: ReporterConfig,
    history: Mutex<RingBuffer<AppError>>,
    store: Arc<dyn PersistentStore>,
    sink: Option<Arc<dyn MonitoringSink>>,
}

impl ErrorReporter {
    pub fn new(
        config: ReporterConfig,
        store: Arc<dyn PersistentStore>,
        sink: Option<Arc<dyn MonitoringSink>>,
    ) -> Self {
        let history = Mutex::new(RingBuffer::new(config.memory_capacity));
        Self { config, history, store, sink }
    }

    /// Record an error. Never fails; persistence and sink problems are
    /// logged at `warn` and dropped.
    pub async fn report(&self, error: AppError) {
        debug!(code = %error.code, severity = %error.severity, "reporting error");

        if let Ok(mut history) = self.history.lock() {
            history.push(error.clone());
        }

        if let Err(store_err) = self.append_durable(&error).await {
            warn!(error = %store_err, "failed to persist error log entry");
        }

        if error.severity >= ErrorSeverity::Critical {
            if let Some(sink) = &self.sink {
                if let Err(sink_err) = sink.dispatch(&error).await {
                    warn!(error = %sink_err, "monitoring sink dispatch failed");
                }
            }
        }
    }

    async fn append_durable(&self, error: &AppError) -> Result<(), Box<dyn std::error::Error>> {
        let mut log: Vec<AppError> = match self.store.get(&self.config.log_key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };
        log.push(error.clone());
        if log.len() > self.config.log_capacity {
            let drop = log.len() - self.config.log_capacity;
            log.drain(..drop);
        }
        let raw = serde_json::to_string(&log)?;
        self.store.set(&self.config.log_key, raw).await?;
        Ok(())
    }

    /// The `n` most recent errors, oldest first.
    pub fn recent_errors(&self, n: usize) -> Vec<AppError> {
        self.history
            .lock()
            .map(|history| history.recent(n).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the in-memory history and the durable log.
    pub async fn clear(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
        if let Err(err) = self.store.remove(&self.config.log_key).await {
            warn!(error = %err, "failed to clear durable error log");
        }
    }
}
