//! Subscription registry and subscription types.
//!
//! A subscription ties a topic pattern to an owning subscriber identity,
//! with options fixed at creation:
//! - priority (higher delivered first)
//! - whether the owner receives events it published itself
//! - an optional handler; without one, delivery goes through the bus
//!   broadcast channel and listeners filter by topic themselves
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::new();
//!
//! let id = registry.add("orders/**", "audit", SubscriptionOptions::with_priority(10), None)?;
//! for sub in registry.matching_for("orders/created") {
//!     println!("{} -> {}", sub.id(), sub.subscriber_id());
//! }
//! registry.remove(id);
//! ```

mod registry;
mod types;

pub use registry::SubscriptionRegistry;
pub use types::{
    EventHandler, HandlerError, HandlerResult, Subscription, SubscriptionInfo,
    SubscriptionOptions,
};
