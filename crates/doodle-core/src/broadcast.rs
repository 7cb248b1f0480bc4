//! Fan-out of server events to every connected listener.
//!
//! Each listener is a bounded [`mpsc`] queue drained by its connection
//! task. [`BroadcastBus::publish`] serializes an event once and offers
//! the same frame to every queue with `try_send`, in registration order.
//! It never awaits, so it is safe to call while holding the game lock.
//!
//! A listener whose queue is closed (connection gone) or full (client
//! not reading) is unregistered on the spot. Delivery to the remaining
//! listeners is unaffected.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use doodle_types::ServerEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// A serialized event, shared by every listener it is delivered to.
pub type Frame = Arc<str>;

/// Identifies one registered listener. Increases with registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// The raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Registry of listener queues.
#[derive(Debug, Default)]
pub struct BroadcastBus {
    listeners: Mutex<BTreeMap<ListenerId, mpsc::Sender<Frame>>>,
    next_id: AtomicU64,
}

impl BroadcastBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener queue and return its id.
    pub fn register(&self, tx: mpsc::Sender<Frame>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, tx);
        debug!(listener = %id, "Listener registered");
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(listener = %id, "Listener unregistered");
        }
        removed
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every listener. Returns how many accepted it.
    pub fn publish(&self, event: &ServerEvent) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let mut listeners = self.lock();
        let mut failed = Vec::new();
        for (id, tx) in listeners.iter() {
            if let Err(e) = tx.try_send(Arc::clone(&frame)) {
                log_send_failure(*id, &e);
                failed.push(*id);
            }
        }
        for id in &failed {
            listeners.remove(id);
        }
        listeners.len()
    }

    /// Deliver `event` to a single listener. Returns whether it accepted.
    pub fn send_to(&self, id: ListenerId, event: &ServerEvent) -> bool {
        let Some(frame) = encode(event) else {
            return false;
        };

        let mut listeners = self.lock();
        let Some(tx) = listeners.get(&id) else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                log_send_failure(id, &e);
                listeners.remove(&id);
                false
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ListenerId, mpsc::Sender<Frame>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode(event: &ServerEvent) -> Option<Frame> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize server event");
            None
        }
    }
}

fn log_send_failure(id: ListenerId, error: &TrySendError<Frame>) {
    match error {
        TrySendError::Closed(_) => debug!(listener = %id, "Listener closed, unregistering"),
        TrySendError::Full(_) => warn!(listener = %id, "Listener queue full, unregistering"),
    }
}
