//! Subscription types.

use crate::topic::TopicPattern;
use crate::types::{Event, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single handler invocation.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Delivery target for a subscription.
///
/// Handlers run synchronously inside `publish`, so they should do little
/// work and hand anything heavy to their own thread or runtime.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> HandlerResult + Send + Sync,
{
    fn handle(&self, event: &Event) -> HandlerResult {
        self(event)
    }
}

/// Options fixed at subscribe time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOptions {
    /// Higher runs earlier. Default: 0
    pub priority: i32,

    /// Deliver events this subscriber published itself. Default: false
    pub receive_own_events: bool,
}

impl SubscriptionOptions {
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }

    pub fn receive_own_events(mut self) -> Self {
        self.receive_own_events = true;
        self
    }
}

/// A registered subscription. Immutable once created.
pub struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) pattern: TopicPattern,
    pub(crate) subscriber_id: String,
    pub(crate) options: SubscriptionOptions,
    pub(crate) target: Option<Arc<dyn EventHandler>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &TopicPattern {
        &self.pattern
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn priority(&self) -> i32 {
        self.options.priority
    }

    /// Whether this subscription should see an event from `sender_id`.
    pub(crate) fn accepts_sender(&self, sender_id: &str) -> bool {
        self.options.receive_own_events || self.subscriber_id != sender_id
    }

    pub(crate) fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id,
            pattern: self.pattern.as_str().to_string(),
            subscriber_id: self.subscriber_id.clone(),
            options: self.options,
            has_target: self.target.is_some(),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("subscriber_id", &self.subscriber_id)
            .field("options", &self.options)
            .field("has_target", &self.target.is_some())
            .finish()
    }
}

/// Read-only view of a subscription for introspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub pattern: String,
    pub subscriber_id: String,
    pub options: SubscriptionOptions,
    /// False when delivery goes through the broadcast channel.
    pub has_target: bool,
}
