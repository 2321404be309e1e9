//! tracemesh Correlate - Trace reconstruction and movement scheduling
//!
//! Spans arrive out of order from many brokers. This crate stitches them back
//! into traces and decides, one causal edge at a time, when an edge between
//! two brokers is ready to be shown as an `EventMovement`.
//!
//! # Architecture
//!
//! ```text
//! DecodedSpan
//!     │
//!     ▼
//! TraceStore.ingest() ──→ eviction deadline ──→ TimerQueue
//!     │
//!     ▼
//! MovementScheduler.evaluate() ◄── BrokerRegistry.resolve_broker()
//!     │
//!     ├──→ EventMovement ──→ renderer
//!     └──→ completion deadline ──→ TimerQueue ──→ MovementScheduler.complete()
//! ```
//!
//! Everything here is plain owned state driven through `&mut self`; time is
//! passed in as `Instant`s, so the whole engine runs on one task without locks
//! and is deterministic under test.

mod error;
mod movement;
mod scheduler;
mod store;
mod timer;
mod topology;

#[cfg(test)]
mod topology_test;

pub use error::{CorrelateError, Result};
pub use movement::{Color, EventMovement, MovementId};
pub use scheduler::{Completion, MovementScheduler, SchedulerStats};
pub use store::{IngestOutcome, Span, StoreStats, Trace, TraceStore};
pub use timer::{DeferredTask, TimerQueue};
pub use topology::{
    BrokerActivity, BrokerRecord, BrokerRegistry, Coordinates, KNOWN_REGIONS, region_coordinates,
};

use std::time::Duration;

/// Lifetime of a trace, measured from its first span
pub const DEFAULT_TRACE_TTL: Duration = Duration::from_millis(15_000);

/// How long one movement is shown
pub const DEFAULT_MOVEMENT_DURATION: Duration = Duration::from_millis(300);

/// Time for a broker's activity highlight to fade out
pub const DEFAULT_BROKER_FADE: Duration = Duration::from_millis(1_000);

/// Client-name prefix marking spans recorded at the client edge
pub const DEFAULT_CLIENT_ORIGIN_PREFIX: &str = "solclient";
