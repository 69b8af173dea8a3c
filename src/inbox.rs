//! Capped, prefix-filtered message inbox fed by the broadcast channel.
//!
//! An inbox registers a target-less `prefix/**` subscription for its owner
//! and listens on the broadcast channel. Because the channel carries every
//! broadcast event, the inbox filters by its own prefix and drops events
//! its owner published. Messages are kept newest first and capped.
//!
//! Only topics strictly below the prefix are kept: an inbox on `orders/`
//! ignores a bare `orders` event even though its `orders/**` subscription
//! is counted as notified for it.
//!
//! Dropping an inbox removes its subscription and listener. If the inbox is
//! not polled before its listener buffer overflows, the channel detaches the
//! listener; the next [`Inbox::poll`] logs the loss and re-attaches.

use crate::broadcast::{BroadcastChannel, Listener};
use crate::bus::EventBus;
use crate::error::Result;
use crate::subscriptions::SubscriptionRegistry;
use crate::topic::{TopicPattern, DELIMITER, MULTI_WILDCARD};
use crate::types::{Event, Payload, SubscriptionId, Timestamp};
use crossbeam_channel::TryRecvError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of messages an inbox keeps.
pub const DEFAULT_INBOX_CAPACITY: usize = 50;

/// A received event as stored in an inbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub topic: String,
    pub payload: Payload,
    pub sender_id: String,
    pub received_at: Timestamp,
    /// The payload's `message` field if it is a string, else empty.
    pub message: String,
}

impl InboxMessage {
    fn from_event(event: &Event) -> Self {
        let message = event
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Self {
            topic: event.topic.clone(),
            payload: event.payload.clone(),
            sender_id: event.sender_id.clone(),
            received_at: Timestamp::now(),
            message,
        }
    }
}

pub struct Inbox {
    owner_id: String,
    prefix: String,
    pattern: TopicPattern,
    subscription: SubscriptionId,
    registry: Arc<SubscriptionRegistry>,
    broadcast: Arc<BroadcastChannel>,
    listener: Mutex<Listener>,
    reattached: AtomicU64,
    capacity: usize,
    messages: Mutex<VecDeque<InboxMessage>>,
}

impl Inbox {
    /// Attach an inbox for `owner_id` collecting topics under `topic_prefix`.
    ///
    /// An empty prefix collects every topic.
    pub fn attach(bus: &EventBus, owner_id: &str, topic_prefix: &str) -> Result<Self> {
        Self::with_capacity(bus, owner_id, topic_prefix, DEFAULT_INBOX_CAPACITY)
    }

    pub fn with_capacity(
        bus: &EventBus,
        owner_id: &str,
        topic_prefix: &str,
        capacity: usize,
    ) -> Result<Self> {
        let prefix = topic_prefix.trim_end_matches(DELIMITER);
        let pattern = if prefix.is_empty() {
            MULTI_WILDCARD.to_string()
        } else {
            format!("{prefix}{DELIMITER}{MULTI_WILDCARD}")
        };
        let pattern = TopicPattern::parse(&pattern)?;

        // Listen before subscribing so no broadcast can slip between the two.
        let listener = bus.listen();
        let subscription = match bus.subscribe_simple(pattern.as_str(), owner_id) {
            Ok(id) => id,
            Err(err) => {
                bus.stop_listening(listener.id);
                return Err(err);
            }
        };

        Ok(Self {
            owner_id: owner_id.to_string(),
            prefix: prefix.to_string(),
            pattern,
            subscription,
            registry: bus.registry_handle(),
            broadcast: bus.broadcast_handle(),
            listener: Mutex::new(listener),
            reattached: AtomicU64::new(0),
            capacity,
            messages: Mutex::new(VecDeque::new()),
        })
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Times the listener was found detached and re-attached. Each one means
    /// broadcast events were missed.
    pub fn reattach_count(&self) -> u64 {
        self.reattached.load(Ordering::Relaxed)
    }

    /// Move pending broadcast events into the inbox. Returns how many were kept.
    pub fn poll(&self) -> usize {
        let mut listener = self.listener.lock();
        let mut messages = self.messages.lock();
        let mut kept = 0;

        loop {
            match listener.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        messages.push_front(InboxMessage::from_event(&event));
                        kept += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!(
                        owner = %self.owner_id,
                        listener = ?listener.id,
                        "inbox listener was detached, events were dropped; re-attaching"
                    );
                    *listener = self.broadcast.attach();
                    self.reattached.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        }

        messages.truncate(self.capacity);
        kept
    }

    fn accepts(&self, event: &Event) -> bool {
        event.sender_id != self.owner_id
            && event.topic.len() > self.prefix.len()
            && self.pattern.matches(&event.topic)
    }

    /// Stored messages, newest first.
    pub fn messages(&self) -> Vec<InboxMessage> {
        self.messages.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }

    /// Remove the inbox's subscription and listener from the bus.
    pub fn detach(self) {
        drop(self);
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        self.registry.remove(self.subscription);
        self.broadcast.detach(self.listener.get_mut().id);
        debug!(owner = %self.owner_id, subscription = %self.subscription, "inbox detached");
    }
}
