//! Protocol error types
//!
//! Errors that can occur when decoding span payloads.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is not valid JSON or does not have the span shape
    #[error("invalid span payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Id string is not hexadecimal
    #[error("invalid hex id in field {field}: {value:?}")]
    InvalidHexId { field: &'static str, value: String },

    /// Empty payload
    #[error("empty span payload")]
    EmptyPayload,
}

impl ProtocolError {
    /// Create a missing field error
    #[inline]
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField(field)
    }

    /// Create an invalid hex id error
    #[inline]
    pub fn invalid_hex_id(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidHexId {
            field,
            value: value.into(),
        }
    }
}
