//! Connectivity signal.
//!
//! The engine needs two things: a point-in-time online check before a
//! sync pass, and a subscription for became-online edges that trigger
//! passes. [`SharedConnectivity`] is a `watch`-channel implementation the
//! embedding application drives from its platform network callbacks.

use tokio::sync::watch;

/// Observed network state.
pub trait ConnectivityMonitor: Send + Sync {
    /// Current best-effort online state.
    fn is_online(&self) -> bool;

    /// Channel carrying every online-state change.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Watch-channel backed monitor; cloneable, updated by the embedder.
#[derive(Debug, Clone)]
pub struct SharedConnectivity {
    tx: watch::Sender<bool>,
}

impl SharedConnectivity {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    /// Publish a new online state to all subscribers.
    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }
}

impl ConnectivityMonitor for SharedConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
