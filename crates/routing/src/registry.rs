//! Subscription registry
//!
//! The `SubscriptionRegistry` owns every subscription and the transport they
//! are issued against. It tracks:
//! - Subscription ids (monotonic, never reused)
//! - Per-pattern reference counts, so the transport sees one subscribe and
//!   one unsubscribe per distinct pattern
//! - Connection state, to replay subscriptions after a reconnect
//!
//! Dispatch runs callbacks synchronously in match order. A callback that
//! fails or panics is logged and counted; the rest still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::{CallbackError, RoutingError};
use crate::matcher::{SubscriptionBuckets, match_topic};
use crate::pattern::{Pattern, PatternClass};
use crate::subscription_id::SubscriptionId;
use crate::transport::Transport;

/// Subscriber callback, invoked with the topic and raw payload
pub type Callback = Box<dyn FnMut(&str, &Bytes) -> Result<(), CallbackError> + Send>;

/// Transport-level subscription shared by every id on the same pattern
#[derive(Debug)]
struct PatternRef {
    pattern: String,
    qos: u8,
    refs: usize,
}

/// Result of dispatching one message
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Callbacks whose pattern matched
    pub matched: usize,
    /// Callbacks that returned `Ok`
    pub delivered: usize,
    /// Callbacks that failed or panicked
    pub failures: Vec<RoutingError>,
}

impl DispatchReport {
    /// Number of callbacks that failed or panicked
    #[inline]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Live subscriptions
    pub subscriptions: usize,
    /// Distinct live patterns
    pub patterns: usize,
    /// Unsubscribe calls with an id that was not live
    pub unknown_unsubscribes: u64,
}

/// Owns subscriptions and routes messages to their callbacks
pub struct SubscriptionRegistry<T> {
    transport: T,
    connected: bool,
    next_seq: u64,
    buckets: SubscriptionBuckets<Callback>,
    /// Live subscription id → pattern
    ids: HashMap<SubscriptionId, String>,
    /// Distinct patterns in first-registration order
    patterns: Vec<PatternRef>,
    unknown_unsubscribes: u64,
}

impl<T: Transport> SubscriptionRegistry<T> {
    /// Create a registry over a (not yet connected) transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            connected: false,
            next_seq: 1,
            buckets: SubscriptionBuckets::new(),
            ids: HashMap::new(),
            patterns: Vec::new(),
            unknown_unsubscribes: 0,
        }
    }

    /// Ask the transport to connect
    pub fn connect(&mut self) {
        debug!("connecting transport");
        self.transport.connect();
    }

    /// Mark the transport connected and re-issue every live pattern
    ///
    /// Each distinct pattern is subscribed exactly once, in the order it was
    /// first registered.
    pub fn on_connected(&mut self) {
        self.connected = true;
        debug!(patterns = self.patterns.len(), "transport connected, resubscribing");

        for p in &self.patterns {
            self.transport.subscribe(&p.pattern, p.qos);
        }
    }

    /// Mark the transport disconnected
    pub fn on_disconnected(&mut self) {
        if self.connected {
            debug!("transport disconnected");
        }
        self.connected = false;
    }

    /// Check if the transport is connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Register a callback for a pattern
    ///
    /// The transport is only asked to subscribe for the first live
    /// subscription on a pattern; later ones share it (and its QoS).
    pub fn subscribe(&mut self, qos: u8, pattern: &str, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_seq);
        self.next_seq += 1;

        let class = self
            .buckets
            .insert(id, Pattern::parse(pattern), callback);
        self.ids.insert(id, pattern.to_owned());

        match self.patterns.iter_mut().find(|p| p.pattern == pattern) {
            Some(existing) => existing.refs += 1,
            None => {
                self.patterns.push(PatternRef {
                    pattern: pattern.to_owned(),
                    qos,
                    refs: 1,
                });
                if self.connected {
                    self.transport.subscribe(pattern, qos);
                }
            }
        }

        debug!(%id, pattern, %class, qos, "added subscription");
        id
    }

    /// Remove a subscription
    ///
    /// Unknown ids are a logged no-op. The transport unsubscribe is issued
    /// when the last subscription on a pattern goes away.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(pattern) = self.ids.remove(&id) else {
            self.unknown_unsubscribes += 1;
            warn!(%id, "unsubscribe for unknown subscription id");
            return;
        };

        self.buckets.remove(id);

        let Some(pos) = self.patterns.iter().position(|p| p.pattern == pattern) else {
            return;
        };
        self.patterns[pos].refs -= 1;

        if self.patterns[pos].refs == 0 {
            self.patterns.remove(pos);
            if self.connected {
                self.transport.unsubscribe(&pattern);
            }
            debug!(%id, pattern = %pattern, "removed last subscription on pattern");
        } else {
            debug!(%id, pattern = %pattern, "removed subscription");
        }
    }

    /// Publish through the transport
    pub fn publish(&mut self, topic: &str, payload: Bytes, qos: u8) {
        self.transport.publish(topic, payload, qos);
    }

    /// Deliver a message to every matching callback
    pub fn dispatch(&mut self, topic: &str, payload: &Bytes) -> DispatchReport {
        let matches = match_topic(topic, &self.buckets);
        let mut report = DispatchReport {
            matched: matches.len(),
            ..DispatchReport::default()
        };

        for m in matches {
            let Some(entry) = self.buckets.get_mut(m) else {
                continue;
            };
            let id = entry.id;
            let callback = &mut entry.callback;

            match catch_unwind(AssertUnwindSafe(|| callback(topic, payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(%id, topic, error = %e, "subscription callback failed");
                    report
                        .failures
                        .push(RoutingError::callback_failed(id, topic, e.to_string()));
                }
                Err(_) => {
                    warn!(%id, topic, "subscription callback panicked");
                    report
                        .failures
                        .push(RoutingError::callback_panicked(id, topic));
                }
            }
        }

        trace!(
            topic,
            matched = report.matched,
            delivered = report.delivered,
            "dispatched message"
        );
        report
    }

    /// Class of a live subscription's pattern
    pub fn pattern_class(&self, id: SubscriptionId) -> Option<PatternClass> {
        self.ids.get(&id).map(|p| Pattern::parse(p.as_str()).class())
    }

    /// Distinct live patterns in first-registration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.pattern.as_str())
    }

    /// Number of live subscriptions
    #[inline]
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// Check if there are any live subscriptions
    #[inline]
    pub fn has_subscriptions(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Registry counters
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            subscriptions: self.ids.len(),
            patterns: self.patterns.len(),
            unknown_unsubscribes: self.unknown_unsubscribes,
        }
    }

    /// The underlying transport
    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
