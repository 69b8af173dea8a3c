//! Main EventBus struct tying all components together.

use crate::broadcast::{BroadcastChannel, Listener, ListenerId};
use crate::delivery::{DeliveryEngine, DeliveryFailure, DeliveryReport};
use crate::error::Result;
use crate::stats::StatsCollector;
use crate::subscriptions::{EventHandler, SubscriptionInfo, SubscriptionOptions, SubscriptionRegistry};
use crate::types::{BusStats, Payload, SubscriptionId, TopicStats};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Bus configuration.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Max buffered events per broadcast listener before it is detached.
    /// Values below 1 are raised to 1.
    /// Default: 1000
    pub broadcast_buffer_size: usize,

    /// Delivery failures kept for inspection, oldest evicted first.
    /// Default: 100
    pub failure_log_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            broadcast_buffer_size: 1000,
            failure_log_capacity: 100,
        }
    }
}

/// In-process topic event bus.
///
/// Provides a unified interface for:
/// - Publishing events to hierarchical topics
/// - Subscribing with patterns, priorities and self-publish filtering
/// - Listening on the generic broadcast channel
/// - Inspecting subscriptions and per-topic statistics
///
/// The bus is `Send + Sync`; share it behind an `Arc`.
pub struct EventBus {
    config: BusConfig,
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<StatsCollector>,
    broadcast: Arc<BroadcastChannel>,
    engine: DeliveryEngine,
}

impl EventBus {
    /// Create a bus with default configuration.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(mut config: BusConfig) -> Self {
        // A zero-capacity channel is a rendezvous: every try_send would fail.
        config.broadcast_buffer_size = config.broadcast_buffer_size.max(1);

        let registry = Arc::new(SubscriptionRegistry::new());
        let stats = Arc::new(StatsCollector::new(
            Arc::clone(&registry),
            config.failure_log_capacity,
        ));
        let broadcast = Arc::new(BroadcastChannel::new(config.broadcast_buffer_size));
        let engine = DeliveryEngine::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            Arc::clone(&broadcast),
        );

        Self {
            config,
            registry,
            stats,
            broadcast,
            engine,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // --- Publishing ---

    /// Publish an event. Returns how many subscriptions were notified.
    ///
    /// Handler failures are logged and recorded but do not fail the call.
    pub fn publish(&self, topic: &str, payload: Payload, sender_id: &str) -> Result<usize> {
        Ok(self.engine.publish(topic, payload, sender_id)?.notified)
    }

    /// Publish and return the full delivery outcome.
    pub fn publish_with_report(
        &self,
        topic: &str,
        payload: Payload,
        sender_id: &str,
    ) -> Result<DeliveryReport> {
        self.engine.publish(topic, payload, sender_id)
    }

    // --- Subscriptions ---

    /// Subscribe `subscriber_id` to topics matching `pattern`.
    ///
    /// With no `target`, matching events reach the broadcast channel and the
    /// subscriber filters them from a [`Listener`].
    pub fn subscribe(
        &self,
        pattern: &str,
        subscriber_id: &str,
        target: Option<Arc<dyn EventHandler>>,
        options: SubscriptionOptions,
    ) -> Result<SubscriptionId> {
        let id = self.registry.add(pattern, subscriber_id, options, target)?;
        debug!(
            subscription = %id,
            pattern,
            subscriber = subscriber_id,
            priority = options.priority,
            "subscribed"
        );
        Ok(id)
    }

    /// Subscribe with default options and no handler.
    pub fn subscribe_simple(&self, pattern: &str, subscriber_id: &str) -> Result<SubscriptionId> {
        self.subscribe(pattern, subscriber_id, None, SubscriptionOptions::default())
    }

    /// Remove one subscription. Returns false if it did not exist.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            debug!(subscription = %id, "unsubscribed");
        }
        removed
    }

    /// Remove every subscription owned by `subscriber_id`. Idempotent.
    pub fn unsubscribe_all(&self, subscriber_id: &str) -> usize {
        let removed = self.registry.remove_all(subscriber_id);
        if removed > 0 {
            debug!(subscriber = subscriber_id, removed, "unsubscribed all");
        }
        removed
    }

    // --- Broadcast channel ---

    /// Attach a listener to the broadcast channel.
    pub fn listen(&self) -> Listener {
        self.broadcast.attach()
    }

    /// Detach a listener. Dropping the [`Listener`] also detaches it lazily.
    pub fn stop_listening(&self, id: ListenerId) -> bool {
        self.broadcast.detach(id)
    }

    // --- Introspection ---

    /// Live count of subscriptions matching `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.stats.subscriber_count(topic)
    }

    /// Ids of subscriptions owned by `subscriber_id`, in registration order.
    pub fn subscriptions_for(&self, subscriber_id: &str) -> Vec<SubscriptionId> {
        self.registry.subscriptions_for(subscriber_id)
    }

    /// Topics that have been published at least once.
    pub fn active_topics(&self) -> BTreeSet<String> {
        self.stats.active_topics()
    }

    pub fn topic_stats(&self, topic: &str) -> TopicStats {
        self.stats.topic_stats(topic)
    }

    /// Distinct patterns currently subscribed.
    pub fn active_patterns(&self) -> BTreeSet<String> {
        self.registry.active_patterns()
    }

    pub fn subscription(&self, id: SubscriptionId) -> Option<SubscriptionInfo> {
        self.registry.get(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> BusStats {
        let counters = self.stats.counters();
        BusStats {
            events_published: counters.events_published,
            deliveries: counters.deliveries,
            delivery_failures: counters.delivery_failures,
            broadcasts: counters.broadcasts,
            active_subscriptions: self.registry.len(),
            broadcast_listeners: self.broadcast.listener_count(),
        }
    }

    /// Most recent delivery failures, oldest first.
    pub fn recent_failures(&self) -> Vec<DeliveryFailure> {
        self.stats.recent_failures()
    }

    pub(crate) fn registry_handle(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    pub(crate) fn broadcast_handle(&self) -> Arc<BroadcastChannel> {
        Arc::clone(&self.broadcast)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload;

    #[test]
    fn test_subscribe_unsubscribe() {
        let bus = EventBus::new();

        let id = bus.subscribe_simple("orders/*", "audit").unwrap();
        assert_eq!(bus.subscription_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let bus = EventBus::new();
        let _listener = bus.listen();

        bus.subscribe_simple("orders/**", "audit").unwrap();
        bus.publish("orders/created", payload! { "orderId" => "1" }, "orders")
            .unwrap();

        let stats = bus.stats();
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.active_subscriptions, 1);
        assert_eq!(stats.broadcast_listeners, 1);
    }

    #[test]
    fn test_custom_config() {
        let bus = EventBus::with_config(BusConfig {
            broadcast_buffer_size: 1,
            failure_log_capacity: 0,
        });
        let listener = bus.listen();
        bus.subscribe_simple("t", "a").unwrap();

        bus.publish("t", Payload::new(), "x").unwrap();
        bus.publish("t", Payload::new(), "x").unwrap();

        assert_eq!(bus.stats().broadcast_listeners, 0);
        assert_eq!(listener.drain().len(), 1);
    }

    #[test]
    fn test_zero_buffer_is_raised_to_one() {
        let bus = EventBus::with_config(BusConfig {
            broadcast_buffer_size: 0,
            ..Default::default()
        });
        assert_eq!(bus.config().broadcast_buffer_size, 1);

        let listener = bus.listen();
        bus.subscribe_simple("t", "a").unwrap();
        bus.publish("t", Payload::new(), "x").unwrap();

        assert_eq!(bus.stats().broadcast_listeners, 1);
        assert_eq!(listener.try_recv().unwrap().topic, "t");
    }
}
