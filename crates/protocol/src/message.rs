//! Inbound message type
//!
//! `InboundMessage` is what a transport hands to the engine: the topic a
//! message was published on and its undecoded payload.

use bytes::Bytes;

/// A raw message delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,
    /// Undecoded payload
    pub payload: Bytes,
}

impl InboundMessage {
    /// Create a new inbound message
    #[inline]
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
