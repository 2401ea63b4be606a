//! Queue error types.

use thiserror::Error;

use civiport_common::{Classify, ErrorCode, ErrorSeverity, StorageError};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue is full; the enqueue was refused before any state change.
    #[error("queue capacity of {0} exceeded")]
    CapacityExceeded(usize),

    #[error("queue persistence failed: {0}")]
    Storage(#[from] StorageError),

    #[error("queue blob serialization failed: {0}")]
    Serialization(String),

    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

impl Classify for QueueError {
    fn code(&self) -> ErrorCode {
        match self {
            QueueError::CapacityExceeded(_) => ErrorCode::Validation,
            QueueError::Storage(_) => ErrorCode::Persistence,
            QueueError::Serialization(_) => ErrorCode::Serialization,
            QueueError::InvalidConfig(_) => ErrorCode::Validation,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            QueueError::Storage(_) | QueueError::Serialization(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, QueueError::CapacityExceeded(_) | QueueError::Storage(_))
    }
}
