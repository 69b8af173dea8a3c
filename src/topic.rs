//! Topic validation and pattern matching.
//!
//! Topics are `/`-separated segment paths such as `orders/created`. Patterns
//! share that shape and may use two wildcards:
//!
//! - `*` matches exactly one segment
//! - `**` matches zero or more trailing segments (final segment only)
//!
//! Patterns are parsed and validated once, when a subscription is created.
//! Matching a parsed pattern is a single left-to-right pass over segments.

use crate::error::{BusError, Result};
use std::fmt;

/// Segment delimiter for topics and patterns.
pub const DELIMITER: char = '/';

/// Single-segment wildcard.
pub const SINGLE_WILDCARD: &str = "*";

/// Trailing multi-segment wildcard.
pub const MULTI_WILDCARD: &str = "**";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
}

/// A validated subscription pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    /// Segments before any trailing `**`.
    segments: Vec<Segment>,
    /// Whether the pattern ends in `**`.
    open_ended: bool,
}

impl TopicPattern {
    /// Parse and validate a pattern.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(BusError::invalid_pattern(pattern, "pattern is empty"));
        }

        let parts: Vec<&str> = pattern.split(DELIMITER).collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        let mut open_ended = false;

        for (i, part) in parts.iter().enumerate() {
            match *part {
                "" => {
                    return Err(BusError::invalid_pattern(pattern, "empty segment"));
                }
                MULTI_WILDCARD if i == last => open_ended = true,
                MULTI_WILDCARD => {
                    return Err(BusError::invalid_pattern(
                        pattern,
                        "`**` is only allowed as the final segment",
                    ));
                }
                SINGLE_WILDCARD => segments.push(Segment::Single),
                literal if literal.contains('*') => {
                    return Err(BusError::invalid_pattern(
                        pattern,
                        format!("segment {literal:?} mixes a wildcard with literal text"),
                    ));
                }
                literal => segments.push(Segment::Literal(literal.to_string())),
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            open_ended,
        })
    }

    /// The pattern as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if the pattern has no wildcards, i.e. it names one topic.
    pub fn is_literal(&self) -> bool {
        !self.open_ended && self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Check whether `topic` matches this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        let mut topic_segments = topic.split(DELIMITER);

        for segment in &self.segments {
            match (segment, topic_segments.next()) {
                (_, None) => return false,
                (Segment::Single, Some(_)) => {}
                (Segment::Literal(expected), Some(actual)) => {
                    if expected != actual {
                        return false;
                    }
                }
            }
        }

        self.open_ended || topic_segments.next().is_none()
    }
}

impl fmt::Debug for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicPattern({})", self.raw)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Validate a concrete topic for publishing.
pub fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(BusError::invalid_topic(topic, "topic is empty"));
    }

    for segment in topic.split(DELIMITER) {
        if segment.is_empty() {
            return Err(BusError::invalid_topic(topic, "empty segment"));
        }
        if segment == SINGLE_WILDCARD || segment == MULTI_WILDCARD {
            return Err(BusError::invalid_topic(
                topic,
                "wildcards are not allowed in published topics",
            ));
        }
    }

    Ok(())
}

/// Parse `pattern` and match it against `topic`.
pub fn matches(pattern: &str, topic: &str) -> Result<bool> {
    Ok(TopicPattern::parse(pattern)?.matches(topic))
}
