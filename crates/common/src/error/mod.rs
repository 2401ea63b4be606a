//! Structured error taxonomy shared across Civiport modules.
//!
//! Failure sites construct an [`AppError`]: a normalized, immutable record
//! carrying a symbolic code, a severity level, free-form context, and a
//! recoverability flag. The [`ErrorReporter`](crate::report::ErrorReporter)
//! retains these records and routes `Critical` ones to the monitoring sink.
//!
//! Module-specific error enums implement [`Classify`] so they can be
//! normalized uniformly:
//!
//! ```rust,ignore
//! let app = AppError::from_classified(&err)
//!     .with_context("action_id", id.to_string());
//! reporter.report(app).await;
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::epoch_millis;

/// Severity levels for routing and audit.
///
/// Ordered: `Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Diagnostic only.
    Info,
    /// Recoverable degradation, e.g. a single failed retry attempt.
    Warning,
    /// Operation failed but the system is stable.
    Error,
    /// Requires external escalation.
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Stable symbolic codes for telemetry and cross-session log inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    /// Network-level connectivity failure.
    Network,
    /// An operation exceeded its deadline.
    Timeout,
    /// A circuit breaker rejected the call without touching the dependency.
    CircuitOpen,
    /// The durable store failed a read or write.
    Persistence,
    /// Encoding or decoding a persisted blob failed.
    Serialization,
    /// The remote API rejected an applied action.
    RemoteRejected,
    /// All retry attempts for an operation were exhausted.
    RetryExhausted,
    /// Input failed validation.
    Validation,
    /// Invariant violation; a bug rather than an environmental failure.
    Internal,
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::Network => "NETWORK",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::Persistence => "PERSISTENCE",
            ErrorCode::Serialization => "SERIALIZATION",
            ErrorCode::RemoteRejected => "REMOTE_REJECTED",
            ErrorCode::RetryExhausted => "RETRY_EXHAUSTED",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::Unknown => "UNKNOWN",
        };
        write!(f, "{code}")
    }
}

/// Classification interface implemented by module error enums.
///
/// Lets the reporter and retry call sites treat heterogeneous errors
/// uniformly without knowing their concrete types.
pub trait Classify {
    /// Symbolic code for telemetry.
    fn code(&self) -> ErrorCode;

    /// Severity for routing.
    fn severity(&self) -> ErrorSeverity;

    /// Whether retrying the failed operation can reasonably succeed.
    fn is_recoverable(&self) -> bool;
}

/// Normalized, immutable error record.
///
/// Constructed at the failure site and never mutated afterwards; the
/// reporter owns it for as long as it sits in the bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub message: String,
    pub code: ErrorCode,
    pub severity: ErrorSeverity,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Milliseconds since the Unix epoch at construction time.
    pub timestamp_ms: u64,
    pub recoverable: bool,
}

impl AppError {
    /// Build a record with an explicit code and severity.
    pub fn new(code: ErrorCode, severity: ErrorSeverity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            severity,
            context: BTreeMap::new(),
            timestamp_ms: epoch_millis(),
            recoverable: severity < ErrorSeverity::Critical,
        }
    }

    /// Normalize any classified error into a record.
    pub fn from_classified<E>(error: &E) -> Self
    where
        E: Classify + fmt::Display,
    {
        Self {
            message: error.to_string(),
            code: error.code(),
            severity: error.severity(),
            context: BTreeMap::new(),
            timestamp_ms: epoch_millis(),
            recoverable: error.is_recoverable(),
        }
    }

    /// Attach a context key/value pair (builder style).
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Override the recoverability flag (builder style).
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == ErrorSeverity::Critical
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
    }
}

impl std::error::Error for AppError {}
