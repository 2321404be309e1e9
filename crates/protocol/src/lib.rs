//! tracemesh Protocol - Core types that flow between the tracemesh crates
//!
//! This crate provides the foundational types handed from the transport and
//! decoding collaborators to the correlation engine:
//! - `InboundMessage` - a raw `(topic, payload)` pair delivered by a transport
//! - `DecodedSpan` - one decoded span: ids, origin tag, attributes
//! - `SpanDecoder` - the seam for payload decoding (`JsonSpanDecoder` built in)
//! - `span_id_hex` - byte id → lowercase, zero-padded hex key
//!
//! # Design Principles
//!
//! - **Cheap payloads**: message payloads are `bytes::Bytes`, cloned by refcount
//! - **String keys**: every id is normalized to hex once, at decode time, so the
//!   correlator only ever compares strings

mod decode;
mod error;
mod message;
mod span;

pub use decode::{JsonSpanDecoder, SpanDecoder};
pub use error::ProtocolError;
pub use message::InboundMessage;
pub use span::{AttributeValue, DecodedSpan, ROOT_PARENT_SPAN_ID, is_root_parent, span_id_hex};

// Re-export bytes for convenience
pub use bytes::Bytes;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Attribute carrying the movement color of a span
pub const COLOR_ATTRIBUTE: &str = "color";
