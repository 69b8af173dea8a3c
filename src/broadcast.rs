//! Generic notification channel for subscriptions without a handler.
//!
//! Listeners attach once and receive every event the bus broadcasts, then
//! filter by topic themselves. Each listener has a bounded buffer; a listener
//! that falls behind or whose receiver was dropped is detached on the next
//! emit so publishers never block on it.

use crate::types::Event;
use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Identifier for an attached listener.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Handle for receiving broadcast events.
pub struct Listener {
    pub id: ListenerId,
    receiver: Receiver<Arc<Event>>,
}

impl Listener {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<Arc<Event>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<Arc<Event>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Arc<Event>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take everything currently buffered.
    pub fn drain(&self) -> Vec<Arc<Event>> {
        self.receiver.try_iter().collect()
    }
}

/// Fan-out channel feeding all attached listeners.
pub struct BroadcastChannel {
    listeners: RwLock<HashMap<ListenerId, Sender<Arc<Event>>>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl BroadcastChannel {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size,
        }
    }

    /// Attach a new listener.
    pub fn attach(&self) -> Listener {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.buffer_size);
        self.listeners.write().insert(id, sender);
        Listener { id, receiver }
    }

    /// Detach a listener. Returns false if it was not attached.
    pub fn detach(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Send `event` to every listener. Returns how many accepted it.
    pub fn emit(&self, event: &Event) -> usize {
        let event = Arc::new(event.clone());
        let mut reached = 0;
        let mut to_remove = Vec::new();

        {
            let listeners = self.listeners.read();
            for (id, sender) in listeners.iter() {
                match sender.try_send(Arc::clone(&event)) {
                    Ok(()) => reached += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(listener = ?id, topic = %event.topic, "broadcast listener buffer full, detaching");
                        to_remove.push(*id);
                    }
                    Err(TrySendError::Disconnected(_)) => to_remove.push(*id),
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.listeners.write();
            for id in to_remove {
                listeners.remove(&id);
            }
        }

        reached
    }
}
