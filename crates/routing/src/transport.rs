//! Messaging transport seam
//!
//! The registry never talks to a broker directly; it drives a `Transport`.
//! Transport failures are asynchronous and reported by the transport itself,
//! so every call here is fire-and-forget.

use bytes::Bytes;

/// Messaging client used by the subscription registry
pub trait Transport {
    /// Start connecting; the owner calls `SubscriptionRegistry::on_connected`
    /// once the connection is up
    fn connect(&mut self);

    /// Subscribe to a pattern at the given QoS
    fn subscribe(&mut self, pattern: &str, qos: u8);

    /// Remove a pattern subscription
    fn unsubscribe(&mut self, pattern: &str);

    /// Publish a message
    fn publish(&mut self, topic: &str, payload: Bytes, qos: u8);
}

/// A call made against a `RecordingTransport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Subscribe { pattern: String, qos: u8 },
    Unsubscribe { pattern: String },
    Publish { topic: String, payload: Bytes, qos: u8 },
}

/// Transport that records every call
///
/// Used by tests and by offline replay, where messages are fed to the engine
/// directly and there is no broker to talk to.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Vec<TransportCall>,
}

impl RecordingTransport {
    /// Create an empty recording transport
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, oldest first
    #[inline]
    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    /// Drop all recorded calls
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Patterns subscribed, in call order
    pub fn subscribed_patterns(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Subscribe { pattern, .. } => Some(pattern.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of subscribe calls for a pattern
    pub fn subscribe_count(&self, pattern: &str) -> usize {
        self.subscribed_patterns()
            .into_iter()
            .filter(|p| *p == pattern)
            .count()
    }

    /// Number of unsubscribe calls for a pattern
    pub fn unsubscribe_count(&self, pattern: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Unsubscribe { pattern: p } if p == pattern))
            .count()
    }
}

impl Transport for RecordingTransport {
    fn connect(&mut self) {
        self.calls.push(TransportCall::Connect);
    }

    fn subscribe(&mut self, pattern: &str, qos: u8) {
        self.calls.push(TransportCall::Subscribe {
            pattern: pattern.to_owned(),
            qos,
        });
    }

    fn unsubscribe(&mut self, pattern: &str) {
        self.calls.push(TransportCall::Unsubscribe {
            pattern: pattern.to_owned(),
        });
    }

    fn publish(&mut self, topic: &str, payload: Bytes, qos: u8) {
        self.calls.push(TransportCall::Publish {
            topic: topic.to_owned(),
            payload,
            qos,
        });
    }
}
