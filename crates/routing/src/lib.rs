//! tracemesh Routing - Topic matching and subscription registry
//!
//! Incoming messages are routed to subscriber callbacks by topic. Patterns are
//! classified once, at subscribe time, into one of three buckets so the hot
//! path only runs the comparison each class needs.
//!
//! # Design
//!
//! - `Pattern` - a classified subscription filter (exact, prefix, wildcard)
//! - `SubscriptionBuckets` + `match_topic` - pure lookup, deterministic order
//! - `SubscriptionRegistry` - subscription lifecycle, per-pattern reference
//!   counting, fault-isolated dispatch, resubscribe on reconnect
//! - `Transport` - the messaging client seam (`RecordingTransport` built in)
//!
//! # Example
//!
//! ```
//! use tracemesh_routing::{RecordingTransport, SubscriptionRegistry};
//!
//! let mut registry = SubscriptionRegistry::new(RecordingTransport::new());
//! registry.on_connected();
//!
//! let id = registry.subscribe(0, "_telemetry/#", Box::new(|_topic, _payload| Ok(())));
//! let report = registry.dispatch("_telemetry/broker1/span", &"{}".into());
//! assert_eq!(report.delivered, 1);
//!
//! registry.unsubscribe(id);
//! assert_eq!(registry.transport().unsubscribe_count("_telemetry/#"), 1);
//! ```

mod error;
mod matcher;
mod pattern;
mod registry;
mod subscription_id;
mod transport;

#[cfg(test)]
mod matcher_test;

pub use error::{CallbackError, Result, RoutingError};
pub use matcher::{BucketEntry, MatchRef, SubscriptionBuckets, match_topic};
pub use pattern::{MULTI_LEVEL_WILDCARD, Pattern, PatternClass, SINGLE_LEVEL_WILDCARD};
pub use registry::{Callback, DispatchReport, RegistryStats, SubscriptionRegistry};
pub use subscription_id::SubscriptionId;
pub use transport::{RecordingTransport, Transport, TransportCall};

// Re-export Bytes for callback signatures
pub use bytes::Bytes;
