//! Error types for the event bus.

use crate::delivery::DeliveryFailure;
use thiserror::Error;

/// Main error type for bus operations.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid topic {topic:?}: {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error(transparent)]
    DeliveryFailure(#[from] DeliveryFailure),
}

impl BusError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        BusError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_topic(topic: &str, reason: impl Into<String>) -> Self {
        BusError::InvalidTopic {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
