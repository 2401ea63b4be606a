//! Reusable building blocks shared across Civiport crates.
//!
//! The portal talks to a remote API that is allowed to be slow, flaky, or
//! entirely absent. Everything in this crate exists to make those calls
//! survivable: a structured error taxonomy with severity-based routing, a
//! bounded error reporter, a circuit breaker, retry with exponential
//! backoff, and the durable key/value store the offline queue persists
//! through.
//!
//! Domain logic (the action queue and sync engine) lives in
//! `civiport-sync`; this crate stays domain-neutral.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod collections;
pub mod error;
pub mod report;
pub mod resilience;
pub mod storage;
pub mod time;

pub use error::{AppError, Classify, ErrorCode, ErrorSeverity};
pub use report::{ErrorReporter, MonitoringSink, ReporterConfig, SinkError};
pub use resilience::{
    retry_with_backoff, retry_with_backoff_observed, BreakerConfig, BreakerError, CircuitBreaker,
    CircuitState, RetryConfig, RetryError,
};
pub use storage::{FileStore, MemoryStore, PersistentStore, StorageError, StoreResult};
pub use time::{epoch_millis, Clock, MockClock, SystemClock};
