//! Sync engine: replays the offline queue against the remote API.

mod core;
mod events;

pub use core::{SyncEngine, SyncError, SyncReport};
pub use events::{ListenerId, SyncEvent};
