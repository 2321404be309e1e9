//! Routing error types

use thiserror::Error;

use crate::SubscriptionId;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Error type returned by subscriber callbacks
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while dispatching a message
///
/// These never abort a dispatch; they are logged and counted so the
/// remaining callbacks still run.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A callback returned an error
    #[error("callback for {id} failed on topic '{topic}': {message}")]
    CallbackFailed {
        /// Subscription whose callback failed
        id: SubscriptionId,
        /// Topic being dispatched
        topic: String,
        /// Error message
        message: String,
    },

    /// A callback panicked
    #[error("callback for {id} panicked on topic '{topic}'")]
    CallbackPanicked {
        /// Subscription whose callback panicked
        id: SubscriptionId,
        /// Topic being dispatched
        topic: String,
    },
}

impl RoutingError {
    /// Create a CallbackFailed error
    #[inline]
    pub fn callback_failed(
        id: SubscriptionId,
        topic: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CallbackFailed {
            id,
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a CallbackPanicked error
    #[inline]
    pub fn callback_panicked(id: SubscriptionId, topic: impl Into<String>) -> Self {
        Self::CallbackPanicked {
            id,
            topic: topic.into(),
        }
    }

    /// Subscription the error belongs to
    #[inline]
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            Self::CallbackFailed { id, .. } | Self::CallbackPanicked { id, .. } => *id,
        }
    }
}
