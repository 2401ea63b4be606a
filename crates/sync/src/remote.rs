//! Remote portal API contract.
//!
//! The embedding application implements [`RemoteApi`] over its actual
//! transport. Each method is one logical operation; the server is
//! expected to deduplicate on the client-generated action id, so
//! replaying the same action twice is safe.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use civiport_common::{Classify, ErrorCode, ErrorSeverity};

use crate::action::{ActionKind, PendingAction};

/// Failure applying an action remotely.
///
/// `recoverable` distinguishes transient transport trouble (worth
/// retrying) from a rejection the server will repeat on every attempt.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    pub recoverable: bool,
}

impl RemoteError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), recoverable: true }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { message: message.into(), recoverable: false }
    }
}

impl Classify for RemoteError {
    fn code(&self) -> ErrorCode {
        if self.recoverable {
            ErrorCode::Network
        } else {
            ErrorCode::RemoteRejected
        }
    }

    fn severity(&self) -> ErrorSeverity {
        if self.recoverable {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }

    fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

/// One remote operation per action kind. Implementations must be
/// idempotent with respect to `action_id`.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn apply_payment(&self, action_id: Uuid, payload: &Value) -> Result<(), RemoteError>;

    async fn apply_issue_report(&self, action_id: Uuid, payload: &Value)
        -> Result<(), RemoteError>;

    async fn apply_forum_post(&self, action_id: Uuid, payload: &Value) -> Result<(), RemoteError>;

    async fn apply_poll_vote(&self, action_id: Uuid, payload: &Value) -> Result<(), RemoteError>;

    async fn apply_feedback(&self, action_id: Uuid, payload: &Value) -> Result<(), RemoteError>;

    /// Dispatch `action` to the kind-specific operation.
    async fn apply(&self, action: &PendingAction) -> Result<(), RemoteError> {
        match action.kind {
            ActionKind::PaymentSubmit => self.apply_payment(action.id, &action.payload).await,
            ActionKind::IssueReport => self.apply_issue_report(action.id, &action.payload).await,
            ActionKind::ForumPost => self.apply_forum_post(action.id, &action.payload).await,
            ActionKind::PollVote => self.apply_poll_vote(action.id, &action.payload).await,
            ActionKind::FeedbackSubmit => self.apply_feedback(action.id, &action.payload).await,
        }
    }
}
