//! Property-based tests for topic pattern matching.

use busline::{validate_topic, TopicPattern};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,6}"
}

fn topic() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn literal_pattern_matches_itself(segments in topic()) {
        let topic = segments.join("/");
        let pattern = TopicPattern::parse(&topic).unwrap();

        prop_assert!(validate_topic(&topic).is_ok());
        prop_assert!(pattern.is_literal());
        prop_assert!(pattern.matches(&topic));
    }

    #[test]
    fn matching_is_deterministic(segments in topic(), other in topic()) {
        let pattern = TopicPattern::parse(&segments.join("/")).unwrap();
        let candidate = other.join("/");

        let first = pattern.matches(&candidate);
        for _ in 0..3 {
            prop_assert_eq!(pattern.matches(&candidate), first);
        }
    }

    #[test]
    fn single_wildcards_match_same_depth(segments in topic()) {
        let stars = vec!["*"; segments.len()].join("/");
        let pattern = TopicPattern::parse(&stars).unwrap();

        prop_assert!(pattern.matches(&segments.join("/")));

        let deeper = format!("{}/extra", segments.join("/"));
        prop_assert!(!pattern.matches(&deeper));
    }

    #[test]
    fn trailing_multi_wildcard_matches_any_suffix(
        prefix in topic(),
        suffix in prop::collection::vec(segment(), 0..4),
    ) {
        let pattern = TopicPattern::parse(&format!("{}/**", prefix.join("/"))).unwrap();

        let mut full = prefix.clone();
        full.extend(suffix);
        prop_assert!(pattern.matches(&full.join("/")));
    }

    #[test]
    fn prefix_mismatch_never_matches(prefix in topic(), suffix in topic()) {
        let pattern = TopicPattern::parse(&format!("{}/**", prefix.join("/"))).unwrap();

        let mut changed = prefix.clone();
        changed[0] = format!("{}X", changed[0]);
        changed.extend(suffix);
        prop_assert!(!pattern.matches(&changed.join("/")));
    }
}
