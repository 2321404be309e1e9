//! Subscription pattern classification
//!
//! Every pattern falls into exactly one class, decided once at subscribe time:
//!
//! - **Wildcard** - contains a `+` anywhere
//! - **Prefix** - otherwise, ends with `/#`
//! - **Exact** - everything else, including a bare `#`
//!
//! Classification is total: any string is a valid pattern.

use std::fmt;

/// Single-level wildcard token
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Multi-level wildcard token
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Suffix that turns a pattern into a prefix match
const PREFIX_SUFFIX: &str = "/#";

/// Topic level separator
const SEPARATOR: char = '/';

/// The bucket a pattern is stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternClass {
    Exact,
    Prefix,
    Wildcard,
}

impl PatternClass {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::Wildcard => "wildcard",
        }
    }
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pre-processed form of a pattern, one variant per class
#[derive(Debug, Clone, PartialEq, Eq)]
enum Compiled {
    Exact,
    /// Literal prefix with the trailing `/#` stripped
    Prefix(String),
    /// Pattern split on `/`
    Wildcard(Vec<String>),
}

/// A classified subscription pattern
///
/// # Example
///
/// ```
/// use tracemesh_routing::{Pattern, PatternClass};
///
/// let pattern = Pattern::parse("_telemetry/+/span");
/// assert_eq!(pattern.class(), PatternClass::Wildcard);
/// assert!(pattern.matches("_telemetry/broker1/span"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    compiled: Compiled,
}

impl Pattern {
    /// Classify a pattern
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();

        let compiled = if raw.contains(SINGLE_LEVEL_WILDCARD) {
            Compiled::Wildcard(raw.split(SEPARATOR).map(str::to_owned).collect())
        } else if let Some(prefix) = raw.strip_suffix(PREFIX_SUFFIX) {
            Compiled::Prefix(prefix.to_owned())
        } else {
            Compiled::Exact
        };

        Self { raw, compiled }
    }

    /// The pattern as subscribed
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The bucket this pattern belongs to
    #[inline]
    pub fn class(&self) -> PatternClass {
        match self.compiled {
            Compiled::Exact => PatternClass::Exact,
            Compiled::Prefix(_) => PatternClass::Prefix,
            Compiled::Wildcard(_) => PatternClass::Wildcard,
        }
    }

    /// Literal prefix, for prefix patterns
    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        match &self.compiled {
            Compiled::Prefix(p) => Some(p),
            _ => None,
        }
    }

    /// Check if a topic matches this pattern
    ///
    /// Prefix patterns use plain string-prefix semantics with no level
    /// boundary check: `a/#` matches `a/b` and also `ab`.
    ///
    /// Wildcard patterns compare level by level over the pattern's levels
    /// only. `#` ends the comparison with a match, `+` accepts any level
    /// (even a missing one), and topic levels past the end of the pattern are
    /// not compared. A level such as `a+b` is compared literally.
    pub fn matches(&self, topic: &str) -> bool {
        match &self.compiled {
            Compiled::Exact => topic == self.raw,
            Compiled::Prefix(prefix) => topic.starts_with(prefix.as_str()),
            Compiled::Wildcard(segments) => wildcard_matches(segments, topic),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for Pattern {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

fn wildcard_matches(segments: &[String], topic: &str) -> bool {
    let mut topic_levels = topic.split(SEPARATOR);

    for segment in segments {
        if segment == MULTI_LEVEL_WILDCARD {
            return true;
        }
        let level = topic_levels.next();
        if segment == SINGLE_LEVEL_WILDCARD {
            continue;
        }
        if level != Some(segment.as_str()) {
            return false;
        }
    }

    true
}
