//! Subscription registry: the single source of truth for who listens to what.

use crate::error::Result;
use crate::topic::TopicPattern;
use crate::types::SubscriptionId;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{EventHandler, Subscription, SubscriptionInfo, SubscriptionOptions};

#[derive(Default)]
struct RegistryState {
    /// Ids are allocated monotonically, so key order is registration order.
    by_id: BTreeMap<SubscriptionId, Arc<Subscription>>,
    by_subscriber: HashMap<String, BTreeSet<SubscriptionId>>,
}

/// Holds all active subscriptions.
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscription. Fails only if the pattern is malformed.
    pub fn add(
        &self,
        pattern: &str,
        subscriber_id: &str,
        options: SubscriptionOptions,
        target: Option<Arc<dyn EventHandler>>,
    ) -> Result<SubscriptionId> {
        let pattern = TopicPattern::parse(pattern)?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let subscription = Arc::new(Subscription {
            id,
            pattern,
            subscriber_id: subscriber_id.to_string(),
            options,
            target,
        });

        let mut state = self.state.write();
        state.by_id.insert(id, subscription);
        state
            .by_subscriber
            .entry(subscriber_id.to_string())
            .or_default()
            .insert(id);

        Ok(id)
    }

    /// Remove one subscription. Returns false if it did not exist.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.write();
        let Some(subscription) = state.by_id.remove(&id) else {
            return false;
        };

        let owner = subscription.subscriber_id.as_str();
        if let Some(ids) = state.by_subscriber.get_mut(owner) {
            ids.remove(&id);
            if ids.is_empty() {
                state.by_subscriber.remove(owner);
            }
        }
        true
    }

    /// Remove every subscription owned by `subscriber_id`.
    pub fn remove_all(&self, subscriber_id: &str) -> usize {
        let mut state = self.state.write();
        let Some(ids) = state.by_subscriber.remove(subscriber_id) else {
            return 0;
        };

        for id in &ids {
            state.by_id.remove(id);
        }
        ids.len()
    }

    /// Snapshot of subscriptions matching `topic`, highest priority first.
    ///
    /// Equal priorities keep registration order. The returned handles stay
    /// valid after the lock is released, so callers can invoke handlers that
    /// mutate the registry.
    pub fn matching_for(&self, topic: &str) -> Vec<Arc<Subscription>> {
        let mut matched: Vec<Arc<Subscription>> = {
            let state = self.state.read();
            state
                .by_id
                .values()
                .filter(|sub| sub.pattern.matches(topic))
                .cloned()
                .collect()
        };

        // Stable, so ties stay in registration order.
        matched.sort_by_key(|sub| Reverse(sub.options.priority));
        matched
    }

    /// Number of subscriptions matching `topic`.
    pub fn count_matching(&self, topic: &str) -> usize {
        self.state
            .read()
            .by_id
            .values()
            .filter(|sub| sub.pattern.matches(topic))
            .count()
    }

    /// Ids owned by `subscriber_id`, in registration order.
    pub fn subscriptions_for(&self, subscriber_id: &str) -> Vec<SubscriptionId> {
        self.state
            .read()
            .by_subscriber
            .get(subscriber_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Distinct patterns currently registered.
    pub fn active_patterns(&self) -> BTreeSet<String> {
        self.state
            .read()
            .by_id
            .values()
            .map(|sub| sub.pattern.as_str().to_string())
            .collect()
    }

    pub fn get(&self, id: SubscriptionId) -> Option<SubscriptionInfo> {
        self.state.read().by_id.get(&id).map(|sub| sub.info())
    }

    pub fn len(&self) -> usize {
        self.state.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
