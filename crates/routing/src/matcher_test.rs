//! Tests for the topic matcher
//!
//! Deterministic bucket order plus property tests for each pattern class.

use proptest::prelude::*;

use crate::{MatchRef, Pattern, PatternClass, SubscriptionBuckets, SubscriptionId, match_topic};

/// Buckets whose payload is a label, to check match order
fn buckets(patterns: &[(&str, &'static str)]) -> SubscriptionBuckets<&'static str> {
    let mut buckets = SubscriptionBuckets::new();
    for (i, (pattern, label)) in patterns.iter().enumerate() {
        buckets.insert(SubscriptionId::new(i as u64 + 1), Pattern::parse(*pattern), *label);
    }
    buckets
}

fn labels(topic: &str, buckets: &SubscriptionBuckets<&'static str>) -> Vec<&'static str> {
    match_topic(topic, buckets)
        .into_iter()
        .map(|m| buckets.get(m).unwrap().callback)
        .collect()
}

// =============================================================================
// Bucket tests
// =============================================================================

#[test]
fn test_insert_places_entry_in_class_bucket() {
    let b = buckets(&[("a/b", "exact"), ("a/#", "prefix"), ("a/+", "wild")]);

    assert_eq!(b.len(), 3);
    assert_eq!(b.bucket(PatternClass::Exact).len(), 1);
    assert_eq!(b.bucket(PatternClass::Prefix).len(), 1);
    assert_eq!(b.bucket(PatternClass::Wildcard).len(), 1);
}

#[test]
fn test_remove_from_bucket() {
    let mut b = buckets(&[("a/b", "one"), ("a/b", "two"), ("a/b", "three")]);

    let removed = b.remove(SubscriptionId::new(2)).unwrap();
    assert_eq!(removed.callback, "two");
    assert_eq!(labels("a/b", &b), vec!["one", "three"]);
}

#[test]
fn test_remove_unknown() {
    let mut b = buckets(&[("a/b", "one")]);
    assert!(b.remove(SubscriptionId::new(99)).is_none());
    assert_eq!(b.len(), 1);
}

#[test]
fn test_empty_buckets_match_nothing() {
    let b: SubscriptionBuckets<()> = SubscriptionBuckets::new();
    assert!(b.is_empty());
    assert!(match_topic("a/b", &b).is_empty());
}

// =============================================================================
// Order tests
// =============================================================================

#[test]
fn test_match_order_prefix_exact_wildcard() {
    let b = buckets(&[
        ("a/+", "wild"),
        ("a/b", "exact"),
        ("a/#", "prefix"),
    ]);

    assert_eq!(labels("a/b", &b), vec!["prefix", "exact", "wild"]);
}

#[test]
fn test_match_order_within_bucket_is_subscription_order() {
    let b = buckets(&[("+/b", "w1"), ("a/+", "w2"), ("a/b/#", "p1"), ("a/#", "p2")]);

    assert_eq!(labels("a/b", &b), vec!["p1", "p2", "w1", "w2"]);
}

#[test]
fn test_match_refs_point_into_buckets() {
    let b = buckets(&[("x", "exact"), ("y/#", "prefix")]);
    let matches = match_topic("y/z", &b);

    assert_eq!(
        matches,
        vec![MatchRef {
            class: PatternClass::Prefix,
            index: 0
        }]
    );
}

// =============================================================================
// Property tests
// =============================================================================

/// Topic levels without wildcard characters
fn level() -> impl Strategy<Value = String> {
    "[a-c]{0,3}"
}

fn topic() -> impl Strategy<Value = String> {
    prop::collection::vec(level(), 1..5).prop_map(|levels| levels.join("/"))
}

proptest! {
    #[test]
    fn prop_exact_is_string_equality(pattern in topic(), t in topic()) {
        let p = Pattern::parse(pattern.clone());
        prop_assert_eq!(p.class(), PatternClass::Exact);
        prop_assert_eq!(p.matches(&t), pattern == t);
    }

    #[test]
    fn prop_prefix_matches_any_extension(prefix in topic(), rest in "[a-c/]{0,6}") {
        let p = Pattern::parse(format!("{}/#", prefix));
        let t = format!("{}{}", prefix, rest);
        prop_assert_eq!(p.class(), PatternClass::Prefix);
        prop_assert!(p.matches(&t));
    }

    #[test]
    fn prop_prefix_is_string_prefix(prefix in topic(), t in topic()) {
        let p = Pattern::parse(format!("{}/#", prefix));
        prop_assert_eq!(p.matches(&t), t.starts_with(&prefix));
    }

    #[test]
    fn prop_wildcard_levelwise(
        raw in prop::collection::vec(prop_oneof![level(), Just("+".to_string())], 1..5),
        t in topic(),
    ) {
        let mut raw = raw;
        // Guarantee the wildcard class
        raw.push("+".to_string());
        let p = Pattern::parse(raw.join("/"));
        prop_assert_eq!(p.class(), PatternClass::Wildcard);

        let levels: Vec<&str> = t.split('/').collect();
        let expected = raw
            .iter()
            .enumerate()
            .all(|(i, seg)| seg == "+" || levels.get(i) == Some(&seg.as_str()));
        prop_assert_eq!(p.matches(&t), expected);
    }

    #[test]
    fn prop_wildcard_hash_stops_comparison(
        head in prop::collection::vec(prop_oneof![level(), Just("+".to_string())], 0..3),
        tail in "[a-c/]{0,6}",
    ) {
        let mut raw = head.clone();
        raw.push("+".to_string());
        raw.push("#".to_string());
        let p = Pattern::parse(raw.join("/"));

        // Build a topic that satisfies every level before the `#`
        let mut levels: Vec<String> = head
            .iter()
            .map(|s| if s == "+" { "x".to_string() } else { s.clone() })
            .collect();
        levels.push("y".to_string());
        let t = format!("{}/{}", levels.join("/"), tail);

        prop_assert!(p.matches(&t));
    }
}
