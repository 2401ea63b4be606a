//! Durable offline action queue.
//!
//! The queue is the source of truth for actions not yet applied
//! remotely. Every mutation rewrites the full queue blob through the
//! injected [`PersistentStore`](civiport_common::PersistentStore) before
//! returning, so a crash between calls never loses an acknowledged
//! enqueue.

mod core;
mod errors;

pub use core::{ActionQueue, QueueConfig, QueueStats};
pub use errors::{QueueError, QueueResult};
