//! tracemesh Pipeline
//!
//! The engine that connects the transport to the correlator on one task.
//!
//! # Architecture
//!
//! ```text
//! [Transport]            [Engine]                                    [Renderer]
//!    onMessage ──→ SubscriptionRegistry ──→ telemetry callback
//!                         │                       │
//!                         ▼                       ▼
//!                  other callbacks        SpanDecoder ──→ TraceStore ──→ MovementScheduler ──→ MovementSink
//!                                                            ▲                   │
//!                                  TimerQueue (evict, complete) ◄────────────────┘
//! ```
//!
//! # Key Design
//!
//! - **Single task**: every component is owned by `Engine` and mutated
//!   through `&mut self`; no locks
//! - **Explicit timers**: trace eviction and movement completion are entries
//!   in one deadline-ordered queue, fired by `fire_due`
//! - **Injected time**: operations take `Instant`, so tests are deterministic
//! - **Async shell**: `Engine::run` drives the same operations from tokio
//!   channels and a `CancellationToken`

mod engine;
mod error;
mod metrics;
mod sink;

pub use engine::Engine;
pub use error::{PipelineError, Result};
pub use metrics::{EngineMetrics, EngineSnapshot};
pub use sink::{ChannelSink, MovementSink, RecordingSink};

/// Default buffer for the inbound message channel
pub const DEFAULT_INBOUND_CHANNEL_SIZE: usize = 10_000;

/// Default buffer for movement and completion channels
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

#[cfg(test)]
mod engine_test;
