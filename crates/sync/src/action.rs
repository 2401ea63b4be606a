//! Pending action data model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The closed set of resident operations that can be captured offline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PaymentSubmit,
    IssueReport,
    ForumPost,
    PollVote,
    FeedbackSubmit,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::PaymentSubmit => "payment_submit",
            ActionKind::IssueReport => "issue_report",
            ActionKind::ForumPost => "forum_post",
            ActionKind::PollVote => "poll_vote",
            ActionKind::FeedbackSubmit => "feedback_submit",
        };
        f.write_str(name)
    }
}

/// One captured operation awaiting replay against the remote API.
///
/// Ids are UUID v7, so they sort by creation order and double as the
/// server-side deduplication key. Only `retry_count` mutates after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: Uuid,
    pub kind: ActionKind,
    pub payload: Value,
    pub enqueued_at_ms: u64,
    pub retry_count: u32,
}

impl PendingAction {
    pub fn new(kind: ActionKind, payload: Value, enqueued_at_ms: u64) -> Self {
        Self { id: Uuid::now_v7(), kind, payload, enqueued_at_ms, retry_count: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_actions_start_with_zero_retries() {
        let action =
            PendingAction::new(ActionKind::IssueReport, serde_json::json!({"title": "pothole"}), 42);
        assert_eq!(action.retry_count, 0);
        assert_eq!(action.enqueued_at_ms, 42);
        assert_eq!(action.kind, ActionKind::IssueReport);
    }

    #[test]
    fn ids_sort_by_creation_order() {
        let a = PendingAction::new(ActionKind::PollVote, Value::Null, 0);
        let b = PendingAction::new(ActionKind::PollVote, Value::Null, 0);
        assert!(a.id < b.id);
    }

    #[test]
    fn serde_round_trip_preserves_every_field() {
        let action = PendingAction::new(
            ActionKind::PaymentSubmit,
            serde_json::json!({"bill_id": "b-77", "amount_cents": 4250}),
            1_700_000_000_000,
        );

        let raw = serde_json::to_string(&action).unwrap();
        let back: PendingAction = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn kind_display_matches_serde_representation() {
        let raw = serde_json::to_string(&ActionKind::FeedbackSubmit).unwrap();
        assert_eq!(raw, format!("\"{}\"", ActionKind::FeedbackSubmit));
    }
}
