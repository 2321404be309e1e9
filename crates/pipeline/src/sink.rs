//! Movement sinks
//!
//! `MovementSink` is the seam to whatever renders movements. The engine calls
//! it synchronously on its own task, so implementations must not block.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracemesh_correlate::EventMovement;

/// Receiver of emitted movements
pub trait MovementSink {
    /// Called once per movement, when it starts
    fn on_event_movement(&mut self, movement: &EventMovement);
}

impl<F> MovementSink for F
where
    F: FnMut(&EventMovement),
{
    fn on_event_movement(&mut self, movement: &EventMovement) {
        self(movement)
    }
}

/// Sink that keeps every movement, for tests and batch tools
#[derive(Debug, Default)]
pub struct RecordingSink {
    movements: Vec<EventMovement>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Movements in emission order
    #[inline]
    pub fn movements(&self) -> &[EventMovement] {
        &self.movements
    }

    /// Take recorded movements, leaving the sink empty
    pub fn drain(&mut self) -> Vec<EventMovement> {
        std::mem::take(&mut self.movements)
    }
}

impl MovementSink for RecordingSink {
    fn on_event_movement(&mut self, movement: &EventMovement) {
        self.movements.push(movement.clone());
    }
}

/// Sink forwarding movements to a bounded channel
///
/// Uses `try_send`: a full or closed channel drops the movement and counts
/// it instead of stalling the engine.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<EventMovement>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<EventMovement>) -> Self {
        Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Movements dropped because the receiver lagged or went away
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Check if the receiver has been dropped
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl MovementSink for ChannelSink {
    fn on_event_movement(&mut self, movement: &EventMovement) {
        if let Err(e) = self.sender.try_send(movement.clone()) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                movement = %movement.id,
                closed = matches!(e, mpsc::error::TrySendError::Closed(_)),
                capacity = self.sender.capacity(),
                "movement sink full, movement dropped"
            );
        }
    }
}
