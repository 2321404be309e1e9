//! Engine metrics
//!
//! Atomic counters for tracking engine throughput.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the engine
///
/// Shared through an `Arc` so a reporter can read them while the engine
/// task owns everything else.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Messages received from the transport
    messages_received: AtomicU64,

    /// Payload bytes received
    bytes_received: AtomicU64,

    /// Callback invocations that succeeded
    dispatches: AtomicU64,

    /// Callback invocations that failed or panicked
    callback_failures: AtomicU64,

    /// Messages that matched no subscription
    unmatched_messages: AtomicU64,

    /// Payloads the decoder rejected
    decode_failures: AtomicU64,

    /// Spans handed to the trace store
    spans_ingested: AtomicU64,

    traces_created: AtomicU64,
    traces_evicted: AtomicU64,
    movements_started: AtomicU64,
    movements_completed: AtomicU64,
}

impl EngineMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
            unmatched_messages: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            spans_ingested: AtomicU64::new(0),
            traces_created: AtomicU64::new(0),
            traces_evicted: AtomicU64::new(0),
            movements_started: AtomicU64::new(0),
            movements_completed: AtomicU64::new(0),
        }
    }

    /// Record a message arriving from the transport
    #[inline]
    pub fn record_message(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record the outcome of dispatching one message
    #[inline]
    pub fn record_dispatch(&self, matched: usize, delivered: usize, failed: usize) {
        if matched == 0 {
            self.unmatched_messages.fetch_add(1, Ordering::Relaxed);
        }
        self.dispatches
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.callback_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_span(&self) {
        self.spans_ingested.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trace_created(&self) {
        self.traces_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trace_evicted(&self) {
        self.traces_evicted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_movement_started(&self) {
        self.movements_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_movement_completed(&self) {
        self.movements_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            unmatched_messages: self.unmatched_messages.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            spans_ingested: self.spans_ingested.load(Ordering::Relaxed),
            traces_created: self.traces_created.load(Ordering::Relaxed),
            traces_evicted: self.traces_evicted.load(Ordering::Relaxed),
            movements_started: self.movements_started.load(Ordering::Relaxed),
            movements_completed: self.movements_completed.load(Ordering::Relaxed),
        }
    }

    // Direct accessors for individual metrics (for logging)

    #[inline]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn movements_started(&self) -> u64 {
        self.movements_started.load(Ordering::Relaxed)
    }
}

/// Point-in-time snapshot of engine metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EngineSnapshot {
    pub messages_received: u64,
    pub bytes_received: u64,
    pub dispatches: u64,
    pub callback_failures: u64,
    pub unmatched_messages: u64,
    pub decode_failures: u64,
    pub spans_ingested: u64,
    pub traces_created: u64,
    pub traces_evicted: u64,
    pub movements_started: u64,
    pub movements_completed: u64,
}

impl EngineSnapshot {
    /// Traces currently held, as far as the counters can tell
    #[inline]
    pub fn live_traces(&self) -> u64 {
        self.traces_created.saturating_sub(self.traces_evicted)
    }

    /// Share of received messages that failed to decode (0.0 - 1.0)
    ///
    /// Returns None if no messages have been received.
    #[inline]
    pub fn decode_failure_rate(&self) -> Option<f64> {
        if self.messages_received == 0 {
            None
        } else {
            Some(self.decode_failures as f64 / self.messages_received as f64)
        }
    }

    /// Calculate the difference from another snapshot
    ///
    /// Useful for calculating rates over reporting intervals.
    pub fn diff(&self, previous: &EngineSnapshot) -> EngineSnapshot {
        EngineSnapshot {
            messages_received: self
                .messages_received
                .saturating_sub(previous.messages_received),
            bytes_received: self.bytes_received.saturating_sub(previous.bytes_received),
            dispatches: self.dispatches.saturating_sub(previous.dispatches),
            callback_failures: self
                .callback_failures
                .saturating_sub(previous.callback_failures),
            unmatched_messages: self
                .unmatched_messages
                .saturating_sub(previous.unmatched_messages),
            decode_failures: self.decode_failures.saturating_sub(previous.decode_failures),
            spans_ingested: self.spans_ingested.saturating_sub(previous.spans_ingested),
            traces_created: self.traces_created.saturating_sub(previous.traces_created),
            traces_evicted: self.traces_evicted.saturating_sub(previous.traces_evicted),
            movements_started: self
                .movements_started
                .saturating_sub(previous.movements_started),
            movements_completed: self
                .movements_completed
                .saturating_sub(previous.movements_completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let snapshot = EngineMetrics::new().snapshot();
        assert_eq!(snapshot, EngineSnapshot::default());
        assert_eq!(snapshot.decode_failure_rate(), None);
    }

    #[test]
    fn test_record_message_and_dispatch() {
        let metrics = EngineMetrics::new();
        metrics.record_message(100);
        metrics.record_message(50);
        metrics.record_dispatch(2, 1, 1);
        metrics.record_dispatch(0, 0, 0);

        let s = metrics.snapshot();
        assert_eq!(s.messages_received, 2);
        assert_eq!(s.bytes_received, 150);
        assert_eq!(s.dispatches, 1);
        assert_eq!(s.callback_failures, 1);
        assert_eq!(s.unmatched_messages, 1);
        assert_eq!(metrics.messages_received(), 2);
    }

    #[test]
    fn test_decode_failure_rate() {
        let metrics = EngineMetrics::new();
        for _ in 0..4 {
            metrics.record_message(1);
        }
        metrics.record_decode_failure();

        assert_eq!(metrics.snapshot().decode_failure_rate(), Some(0.25));
    }

    #[test]
    fn test_live_traces_and_diff() {
        let metrics = EngineMetrics::new();
        metrics.record_trace_created();
        metrics.record_trace_created();
        let before = metrics.snapshot();

        metrics.record_trace_evicted();
        metrics.record_movement_started();
        metrics.record_movement_completed();
        let after = metrics.snapshot();

        assert_eq!(after.live_traces(), 1);
        let delta = after.diff(&before);
        assert_eq!(delta.traces_created, 0);
        assert_eq!(delta.traces_evicted, 1);
        assert_eq!(delta.movements_started, 1);
        assert_eq!(metrics.movements_started(), 1);
    }
}
