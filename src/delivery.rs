//! Delivery engine: resolves, filters, orders and invokes subscriptions for
//! one published event.
//!
//! Delivery is synchronous. The registry lock is held only while matching;
//! handlers run against a snapshot, so a handler may subscribe, unsubscribe
//! or publish again without deadlocking. A handler that blocks stalls the
//! publisher: there is no per-handler timeout.

use crate::broadcast::BroadcastChannel;
use crate::error::{BusError, Result};
use crate::stats::StatsCollector;
use crate::subscriptions::{EventHandler, SubscriptionRegistry};
use crate::topic::validate_topic;
use crate::types::{Event, Payload, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// A single handler that failed for one event.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("delivery of {topic:?} to {subscription_id} ({subscriber_id}) failed: {reason}")]
pub struct DeliveryFailure {
    pub subscription_id: SubscriptionId,
    pub subscriber_id: String,
    pub topic: String,
    pub reason: String,
}

/// Outcome of one publish call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Matched subscriptions left after self-publish filtering.
    pub notified: usize,
    /// Handlers that completed without error.
    pub delivered: usize,
    /// Whether the broadcast channel fired for target-less subscriptions.
    pub broadcast: bool,
    /// Handlers that returned an error or panicked.
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// The notified count, or the first failure if any handler failed.
    pub fn into_result(self) -> Result<usize> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(BusError::DeliveryFailure(failure)),
            None => Ok(self.notified),
        }
    }
}

/// Dispatches events to matching subscriptions.
pub struct DeliveryEngine {
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<StatsCollector>,
    broadcast: Arc<BroadcastChannel>,
}

impl DeliveryEngine {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        stats: Arc<StatsCollector>,
        broadcast: Arc<BroadcastChannel>,
    ) -> Self {
        Self {
            registry,
            stats,
            broadcast,
        }
    }

    /// Publish one event and deliver it to every eligible subscription.
    pub fn publish(&self, topic: &str, payload: Payload, sender_id: &str) -> Result<DeliveryReport> {
        validate_topic(topic)?;
        self.stats.record_publish(topic);

        // Snapshot is already priority ordered; filtering keeps that order.
        let recipients: Vec<_> = self
            .registry
            .matching_for(topic)
            .into_iter()
            .filter(|sub| sub.accepts_sender(sender_id))
            .collect();

        let event = Event::new(topic, payload, sender_id);
        let mut report = DeliveryReport {
            notified: recipients.len(),
            ..Default::default()
        };

        for sub in &recipients {
            match &sub.target {
                Some(handler) => match invoke(&**handler, &event) {
                    Ok(()) => {
                        trace!(subscription = %sub.id, topic, "delivered");
                        report.delivered += 1;
                        self.stats.record_delivery();
                    }
                    Err(reason) => {
                        warn!(
                            subscription = %sub.id,
                            subscriber = %sub.subscriber_id,
                            topic,
                            %reason,
                            "event delivery failed"
                        );
                        let failure = DeliveryFailure {
                            subscription_id: sub.id,
                            subscriber_id: sub.subscriber_id.clone(),
                            topic: topic.to_string(),
                            reason,
                        };
                        self.stats.record_failure(failure.clone());
                        report.failures.push(failure);
                    }
                },
                // One broadcast per publish, at the first target-less slot.
                None if !report.broadcast => {
                    let reached = self.broadcast.emit(&event);
                    trace!(subscription = %sub.id, topic, listeners = reached, "broadcast");
                    self.stats.record_broadcast();
                    report.broadcast = true;
                }
                None => {}
            }
        }

        debug!(
            topic,
            sender = sender_id,
            notified = report.notified,
            failed = report.failures.len(),
            "event published"
        );
        Ok(report)
    }
}

/// Run a handler, turning both errors and panics into a failure reason.
fn invoke(handler: &dyn EventHandler, event: &Event) -> std::result::Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(panic) => Err(format!("handler panicked: {}", panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
