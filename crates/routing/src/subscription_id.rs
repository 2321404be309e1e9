//! Subscription identifier type
//!
//! `SubscriptionId` is a lightweight, Copy handle returned by `subscribe`.

use std::fmt;

/// Subscription identifier
///
/// Ids are allocated from a per-registry sequence starting at 1 and are
/// never reused.
///
/// # Example
///
/// ```
/// use tracemesh_routing::SubscriptionId;
///
/// let id = SubscriptionId::new(1);
/// let copy = id;  // Copy, not move
/// assert_eq!(id, copy);
/// assert_eq!(id.to_string(), "sub:1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Create a subscription ID from its sequence number
    #[inline]
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Get the sequence number
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

impl From<u64> for SubscriptionId {
    #[inline]
    fn from(seq: u64) -> Self {
        Self::new(seq)
    }
}

impl From<SubscriptionId> for u64 {
    #[inline]
    fn from(id: SubscriptionId) -> Self {
        id.0
    }
}
