//! Deferred tasks ordered by deadline
//!
//! Eviction and movement completion are explicit entries here instead of
//! detached timers, so the owner can inspect, cancel and fire them on its
//! own task.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::movement::MovementId;

/// Work the engine defers until a deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    /// Drop a trace at the end of its window
    EvictTrace { trace_id: String, epoch: u64 },
    /// Finish a movement after its duration
    CompleteMovement(MovementId),
}

struct Entry<K> {
    deadline: Instant,
    seq: u64,
    task: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    // Reversed so the max-heap yields the earliest deadline first; equal
    // deadlines fire in scheduling order
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of tasks keyed by deadline
pub struct TimerQueue<K = DeferredTask> {
    heap: BinaryHeap<Entry<K>>,
    next_seq: u64,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> std::fmt::Debug for TimerQueue<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("len", &self.heap.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Arm `task` to fire at `deadline`
    pub fn schedule(&mut self, deadline: Instant, task: K) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            deadline,
            seq,
            task,
        });
    }

    /// Earliest pending deadline
    #[inline]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Remove and return every task due at or before `now`, earliest first
    pub fn pop_due(&mut self, now: Instant) -> Vec<K> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|e| e.deadline <= now) {
            if let Some(entry) = self.heap.pop() {
                due.push(entry.task);
            }
        }
        due
    }

    /// Drop pending tasks matching `predicate`; returns how many were removed
    pub fn cancel(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.heap.len();
        self.heap.retain(|e| !predicate(&e.task));
        before - self.heap.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<K: PartialEq> TimerQueue<K> {
    /// Check if `task` is pending
    pub fn contains(&self, task: &K) -> bool {
        self.heap.iter().any(|e| e.task == *task)
    }
}
