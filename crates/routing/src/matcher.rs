//! Topic matcher over classified subscription buckets
//!
//! `match_topic` is a pure function of the topic and the buckets. Matches are
//! returned as `MatchRef`s (bucket + position) rather than callbacks so the
//! caller can invoke each callback mutably, one at a time.
//!
//! # Order
//!
//! Prefix matches first, then exact matches, then wildcard matches. Inside a
//! bucket, entries keep subscription order.

use crate::SubscriptionId;
use crate::pattern::{Pattern, PatternClass};

/// One subscription stored in a bucket
#[derive(Debug)]
pub struct BucketEntry<C> {
    /// Subscription that owns this entry
    pub id: SubscriptionId,
    /// Classified pattern
    pub pattern: Pattern,
    /// Callback (or any per-subscription payload)
    pub callback: C,
}

/// Position of a matched entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRef {
    /// Bucket the entry lives in
    pub class: PatternClass,
    /// Index inside the bucket
    pub index: usize,
}

/// Subscriptions grouped by pattern class
#[derive(Debug)]
pub struct SubscriptionBuckets<C> {
    exact: Vec<BucketEntry<C>>,
    prefix: Vec<BucketEntry<C>>,
    wildcard: Vec<BucketEntry<C>>,
}

impl<C> Default for SubscriptionBuckets<C> {
    fn default() -> Self {
        Self {
            exact: Vec::new(),
            prefix: Vec::new(),
            wildcard: Vec::new(),
        }
    }
}

impl<C> SubscriptionBuckets<C> {
    /// Create empty buckets
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subscription in the bucket for its pattern class
    ///
    /// Returns the class it was stored under.
    pub fn insert(&mut self, id: SubscriptionId, pattern: Pattern, callback: C) -> PatternClass {
        let class = pattern.class();
        self.bucket_mut(class).push(BucketEntry {
            id,
            pattern,
            callback,
        });
        class
    }

    /// Remove a subscription from whichever bucket holds it
    pub fn remove(&mut self, id: SubscriptionId) -> Option<BucketEntry<C>> {
        for class in [PatternClass::Prefix, PatternClass::Exact, PatternClass::Wildcard] {
            let bucket = self.bucket_mut(class);
            if let Some(pos) = bucket.iter().position(|e| e.id == id) {
                // Vec::remove keeps the remaining entries in subscription order
                return Some(bucket.remove(pos));
            }
        }
        None
    }

    /// Entries of one bucket, in subscription order
    #[inline]
    pub fn bucket(&self, class: PatternClass) -> &[BucketEntry<C>] {
        match class {
            PatternClass::Exact => &self.exact,
            PatternClass::Prefix => &self.prefix,
            PatternClass::Wildcard => &self.wildcard,
        }
    }

    #[inline]
    fn bucket_mut(&mut self, class: PatternClass) -> &mut Vec<BucketEntry<C>> {
        match class {
            PatternClass::Exact => &mut self.exact,
            PatternClass::Prefix => &mut self.prefix,
            PatternClass::Wildcard => &mut self.wildcard,
        }
    }

    /// Look up a matched entry
    #[inline]
    pub fn get(&self, m: MatchRef) -> Option<&BucketEntry<C>> {
        self.bucket(m.class).get(m.index)
    }

    /// Look up a matched entry mutably
    #[inline]
    pub fn get_mut(&mut self, m: MatchRef) -> Option<&mut BucketEntry<C>> {
        self.bucket_mut(m.class).get_mut(m.index)
    }

    /// Total number of stored subscriptions
    #[inline]
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefix.len() + self.wildcard.len()
    }

    /// Check if no subscriptions are stored
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Find every subscription whose pattern matches `topic`
///
/// Order: prefix, exact, wildcard; subscription order inside each bucket.
pub fn match_topic<C>(topic: &str, buckets: &SubscriptionBuckets<C>) -> Vec<MatchRef> {
    let mut matches = Vec::new();

    for class in [PatternClass::Prefix, PatternClass::Exact, PatternClass::Wildcard] {
        let bucket = buckets.bucket(class);

        // The wildcard comparison splits the topic; skip it when nothing is there
        if bucket.is_empty() {
            continue;
        }

        matches.extend(
            bucket
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.pattern.matches(topic))
                .map(|(index, _)| MatchRef { class, index }),
        );
    }

    matches
}
