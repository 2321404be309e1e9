//! Movement scheduler
//!
//! Per trace the scheduler is either idle or showing exactly one movement.
//! When idle it scans the trace's spans in arrival order and starts a
//! movement for the first span whose edge is ready; completing that movement
//! rescans the same trace immediately, so ready edges play back to back.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use tracemesh_protocol::COLOR_ATTRIBUTE;

use crate::movement::{Color, EventMovement, MovementId};
use crate::store::TraceStore;
use crate::topology::{BrokerActivity, BrokerRegistry};

/// Result of completing a movement
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub finished: MovementId,
    pub trace_id: String,
    /// Next movement started for the same trace, if one was ready
    pub next: Option<EventMovement>,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub movements_started: u64,
    pub movements_completed: u64,
    /// Ready spans skipped because a broker did not resolve
    pub unresolved_skips: u64,
    /// Completions for ids that were not in flight
    pub unknown_completions: u64,
    /// Completions whose trace had already been evicted or replaced
    pub orphaned_completions: u64,
}

#[derive(Debug, Clone)]
struct InFlight {
    trace_id: String,
    epoch: u64,
}

/// Decides when causal edges turn into movements
#[derive(Debug)]
pub struct MovementScheduler {
    duration: Duration,
    default_color: Color,
    next_id: u64,
    in_flight: HashMap<MovementId, InFlight>,
    activity: BrokerActivity,
    stats: SchedulerStats,
}

impl MovementScheduler {
    pub fn new(duration: Duration, default_color: Color, broker_fade: Duration) -> Self {
        Self {
            duration,
            default_color,
            next_id: 1,
            in_flight: HashMap::new(),
            activity: BrokerActivity::new(broker_fade),
            stats: SchedulerStats::default(),
        }
    }

    /// How long each movement is shown
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start the next movement for `trace_id` if the trace is idle and one
    /// of its edges is ready
    pub fn evaluate(
        &mut self,
        store: &mut TraceStore,
        topology: &BrokerRegistry,
        trace_id: &str,
        now: Instant,
    ) -> Option<EventMovement> {
        let trace = store.get_mut(trace_id)?;
        if trace.in_movement() {
            return None;
        }

        for index in 0..trace.len() {
            let span = trace.span_at(index);
            if span.is_already_moved() {
                continue;
            }

            let Some(parent_index) = span.parent_span_id().and_then(|p| trace.span_index(p))
            else {
                continue;
            };
            let parent = trace.span_at(parent_index);

            if !span.is_eligible_for_movement() {
                if !parent.is_already_moved() {
                    continue;
                }
                trace.span_at_mut(index).mark_eligible();
            }

            let span = trace.span_at(index);
            let parent = trace.span_at(parent_index);
            let (Some(from), Some(to)) = (
                topology.resolve_broker(span.origin()),
                topology.resolve_broker(parent.origin()),
            ) else {
                self.stats.unresolved_skips += 1;
                trace!(
                    trace_id = %trace_id,
                    span_id = %span.span_id(),
                    origin = %span.origin(),
                    parent_origin = %parent.origin(),
                    "broker not resolved, span skipped"
                );
                continue;
            };

            let id = MovementId::new(self.next_id);
            self.next_id += 1;

            let movement = EventMovement {
                id,
                trace_id: trace.trace_id().to_owned(),
                trace_epoch: trace.epoch(),
                span_id: span.span_id().to_owned(),
                from_broker: from.clone(),
                to_broker: to.clone(),
                started_at: now,
                duration: self.duration,
                color: Color::from_attribute(span.attribute_str(COLOR_ATTRIBUTE), self.default_color),
            };

            trace.span_at_mut(index).mark_moved();
            trace.set_in_movement(true);

            self.activity.record(&movement.from_broker.name, now);
            self.in_flight.insert(
                id,
                InFlight {
                    trace_id: movement.trace_id.clone(),
                    epoch: movement.trace_epoch,
                },
            );
            self.stats.movements_started += 1;

            debug!(
                movement = %id,
                trace_id = %movement.trace_id,
                span_id = %movement.span_id,
                from = %movement.from_broker.name,
                to = %movement.to_broker.name,
                color = %movement.color,
                "movement started"
            );
            return Some(movement);
        }

        None
    }

    /// Finish a movement and start the next ready one for its trace
    ///
    /// Returns `None` for ids that are not in flight. A movement whose trace
    /// was evicted in the meantime completes without touching the store.
    pub fn complete(
        &mut self,
        store: &mut TraceStore,
        topology: &BrokerRegistry,
        id: MovementId,
        now: Instant,
    ) -> Option<Completion> {
        let Some(InFlight { trace_id, epoch }) = self.in_flight.remove(&id) else {
            self.stats.unknown_completions += 1;
            debug!(movement = %id, "completion for unknown movement ignored");
            return None;
        };
        self.stats.movements_completed += 1;

        let released = store
            .get_mut(&trace_id)
            .filter(|trace| trace.epoch() == epoch)
            .map(|trace| trace.set_in_movement(false))
            .is_some();

        let next = if released {
            debug!(movement = %id, trace_id = %trace_id, "movement completed");
            self.evaluate(store, topology, &trace_id, now)
        } else {
            self.stats.orphaned_completions += 1;
            debug!(movement = %id, trace_id = %trace_id, "movement outlived its trace");
            None
        };

        Some(Completion {
            finished: id,
            trace_id,
            next,
        })
    }

    /// Movement currently shown for `trace_id`
    pub fn in_flight_for(&self, trace_id: &str) -> Option<MovementId> {
        self.in_flight
            .iter()
            .find(|(_, f)| f.trace_id == trace_id)
            .map(|(id, _)| *id)
    }

    /// Number of movements being shown
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Per-broker activity
    #[inline]
    pub fn activity(&self) -> &BrokerActivity {
        &self.activity
    }

    #[inline]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
