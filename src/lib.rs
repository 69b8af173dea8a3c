//! # Busline
//!
//! An in-process, topic-based event bus that lets mutually unaware
//! components publish structured events and subscribe to them by
//! hierarchical pattern.
//!
//! ## Core Concepts
//!
//! - **Topics**: `/`-separated names, first segment is the owning module
//!   (`orders/created`, `orders/status_changed`)
//! - **Patterns**: topics with `*` (one segment) or trailing `**` (any rest)
//! - **Subscriptions**: pattern + subscriber identity + priority, with an
//!   optional handler
//! - **Delivery**: synchronous, highest priority first, and never back to
//!   the publisher unless it opts in
//!
//! ## Example
//!
//! ```
//! use busline::{payload, Event, EventBus, EventHandler, HandlerResult, SubscriptionOptions};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new();
//!
//! let handler: Arc<dyn EventHandler> = Arc::new(|event: &Event| -> HandlerResult {
//!     println!("rule check for {:?}", event.get("orderId"));
//!     Ok(())
//! });
//! bus.subscribe("rules/**", "orders", Some(handler), SubscriptionOptions::default())?;
//!
//! let notified = bus.publish(
//!     "rules/check/completed",
//!     payload! { "orderId" => "42", "passed" => false },
//!     "rules",
//! )?;
//! assert_eq!(notified, 1);
//!
//! bus.unsubscribe_all("orders");
//! # Ok::<(), busline::BusError>(())
//! ```

pub mod broadcast;
pub mod bus;
pub mod delivery;
pub mod error;
pub mod inbox;
pub mod stats;
pub mod subscriptions;
pub mod topic;
pub mod types;

// Re-exports
pub use broadcast::{BroadcastChannel, Listener, ListenerId};
pub use bus::{BusConfig, EventBus};
pub use delivery::{DeliveryEngine, DeliveryFailure, DeliveryReport};
pub use error::{BusError, Result};
pub use inbox::{Inbox, InboxMessage, DEFAULT_INBOX_CAPACITY};
pub use stats::StatsCollector;
pub use subscriptions::{
    EventHandler, HandlerError, HandlerResult, Subscription, SubscriptionInfo,
    SubscriptionOptions, SubscriptionRegistry,
};
pub use topic::{matches, validate_topic, TopicPattern};
pub use types::*;
