//! Offline action queue and synchronization engine for the resident
//! portal client.
//!
//! Residents keep interacting with the portal while offline: payments,
//! issue reports, forum posts, poll votes, and feedback are captured as
//! [`PendingAction`]s in a durable [`ActionQueue`] and replayed against
//! the remote API by the [`SyncEngine`] once connectivity returns.
//!
//! The crate is transport-agnostic: the embedding application supplies
//! the [`RemoteApi`], [`ConnectivityMonitor`], and persistent storage
//! implementations, and observes progress through [`SyncEvent`]
//! listeners.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod action;
pub mod cache;
pub mod connectivity;
pub mod dead_letter;
pub mod engine;
pub mod queue;
pub mod remote;

pub use action::{ActionKind, PendingAction};
pub use cache::{CacheSummary, ResourceCache, ResourceFetcher};
pub use connectivity::{ConnectivityMonitor, SharedConnectivity};
pub use dead_letter::{DeadLetter, DeadLetterStore};
pub use engine::{ListenerId, SyncEngine, SyncError, SyncEvent, SyncReport};
pub use queue::{ActionQueue, QueueConfig, QueueError, QueueResult, QueueStats};
pub use remote::{RemoteApi, RemoteError};
