//! Integration tests for the error reporter.
//!
//! Drives the reporter through a file-backed store to verify the durable
//! error log survives a process restart, and through a scripted sink to
//! verify critical-error forwarding.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use civiport_common::{
    AppError, ErrorCode, ErrorReporter, ErrorSeverity, FileStore, MonitoringSink,
    PersistentStore, ReporterConfig, SinkError,
};

struct RecordingSink {
    dispatched: Mutex<Vec<AppError>>,
}

#[async_trait]
impl MonitoringSink for RecordingSink {
    async fn dispatch(&self, error: &AppError) -> Result<(), SinkError> {
        self.dispatched.lock().unwrap().push(error.clone());
        Ok(())
    }
}

/// Validates the durable error log written through a file store is
/// readable by a reporter constructed after a simulated restart.
#[tokio::test(flavor = "multi_thread")]
async fn durable_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let reporter = ErrorReporter::new(ReporterConfig::default(), store, None);
        reporter
            .report(AppError::new(ErrorCode::Network, ErrorSeverity::Error, "before restart"))
            .await;
    }

    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let raw = store.get("error_log").await.unwrap().expect("log should persist");
    let log: Vec<AppError> = serde_json::from_str(&raw).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].message, "before restart");
}

/// Validates only critical errors are forwarded to the monitoring sink
/// while every severity is kept in the local history.
#[tokio::test(flavor = "multi_thread")]
async fn only_critical_errors_are_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let sink = Arc::new(RecordingSink { dispatched: Mutex::new(Vec::new()) });
    let reporter = ErrorReporter::new(ReporterConfig::default(), store, Some(sink.clone()));

    reporter.report(AppError::new(ErrorCode::Timeout, ErrorSeverity::Warning, "slow")).await;
    reporter.report(AppError::new(ErrorCode::Persistence, ErrorSeverity::Critical, "lost")).await;
    reporter.report(AppError::new(ErrorCode::Network, ErrorSeverity::Error, "flaky")).await;

    assert_eq!(reporter.len(), 3);
    let dispatched = sink.dispatched.lock().unwrap();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].code, ErrorCode::Persistence);
}
