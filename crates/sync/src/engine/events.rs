//! Engine lifecycle events.

/// Notifications delivered synchronously to registered listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// A new action was captured into the queue.
    Queued,
    /// A sync pass started over a non-empty queue.
    Syncing,
    /// The pass finished with at least one action applied.
    SyncComplete,
    /// The pass finished with failures and nothing applied.
    SyncFailed,
    /// A pass was requested while offline.
    Offline,
    /// The queue was cleared without syncing.
    Cleared,
}

impl std::fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncEvent::Queued => "queued",
            SyncEvent::Syncing => "syncing",
            SyncEvent::SyncComplete => "sync_complete",
            SyncEvent::SyncFailed => "sync_failed",
            SyncEvent::Offline => "offline",
            SyncEvent::Cleared => "cleared",
        };
        f.write_str(name)
    }
}

/// Handle returned by `add_listener`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
