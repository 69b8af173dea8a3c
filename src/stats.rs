//! Per-topic and bus-wide statistics.
//!
//! Event counts accumulate for the life of the bus with no eviction; topic
//! cardinality is bounded by the number of feature areas publishing, not by
//! event volume. Subscriber counts are never cached: they are recomputed
//! from the registry on every query so they cannot go stale.

use crate::delivery::DeliveryFailure;
use crate::subscriptions::SubscriptionRegistry;
use crate::types::TopicStats;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of the bus-wide counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub events_published: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub broadcasts: u64,
}

/// Tracks publish counts and recent delivery failures.
pub struct StatsCollector {
    registry: Arc<SubscriptionRegistry>,
    event_counts: RwLock<HashMap<String, u64>>,
    events_published: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    broadcasts: AtomicU64,
    /// Most recent failures, oldest first.
    failures: Mutex<VecDeque<DeliveryFailure>>,
    failure_log_capacity: usize,
}

impl StatsCollector {
    pub fn new(registry: Arc<SubscriptionRegistry>, failure_log_capacity: usize) -> Self {
        Self {
            registry,
            event_counts: RwLock::new(HashMap::new()),
            events_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            failures: Mutex::new(VecDeque::new()),
            failure_log_capacity,
        }
    }

    // --- Recording ---

    pub fn record_publish(&self, topic: &str) {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let mut counts = self.event_counts.write();
        match counts.get_mut(topic) {
            Some(count) => *count += 1,
            None => {
                counts.insert(topic.to_string(), 1);
            }
        }
    }

    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, failure: DeliveryFailure) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);

        if self.failure_log_capacity == 0 {
            return;
        }
        let mut failures = self.failures.lock();
        if failures.len() == self.failure_log_capacity {
            failures.pop_front();
        }
        failures.push_back(failure);
    }

    // --- Queries ---

    /// Publishes to this exact topic string.
    pub fn event_count(&self, topic: &str) -> u64 {
        self.event_counts.read().get(topic).copied().unwrap_or(0)
    }

    /// Live count of subscriptions matching `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry.count_matching(topic)
    }

    pub fn topic_stats(&self, topic: &str) -> TopicStats {
        TopicStats {
            subscriber_count: self.subscriber_count(topic),
            event_count: self.event_count(topic),
        }
    }

    /// Topics published at least once.
    pub fn active_topics(&self) -> BTreeSet<String> {
        self.event_counts.read().keys().cloned().collect()
    }

    pub fn counters(&self) -> Counters {
        Counters {
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
        }
    }

    pub fn recent_failures(&self) -> Vec<DeliveryFailure> {
        self.failures.lock().iter().cloned().collect()
    }
}
