//! Decoded span types
//!
//! A `DecodedSpan` is the decoding collaborator's output: the ids of the span,
//! its parent and its trace (all hex strings), the origin tag naming the
//! broker that recorded it, and free-form attributes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Parent span id carried by root spans (8 zero bytes)
pub const ROOT_PARENT_SPAN_ID: &str = "0000000000000000";

/// Convert a byte id to its map-key form: lowercase hex, two digits per byte
///
/// ```
/// use tracemesh_protocol::span_id_hex;
///
/// assert_eq!(span_id_hex(&[0x0a, 0xff, 0x00]), "0aff00");
/// ```
#[inline]
pub fn span_id_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Check if a parent id is the all-zero root sentinel
#[inline]
pub fn is_root_parent(parent_span_id: &str) -> bool {
    !parent_span_id.is_empty() && parent_span_id.bytes().all(|b| b == b'0')
}

/// A single attribute value attached to a span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Get the string value, if this is a string attribute
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
        }
    }
}

/// A decoded span, ready for correlation
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSpan {
    /// Trace id (hex) - links all spans in a trace
    pub trace_id: String,
    /// Span id (hex) - unique per span
    pub span_id: String,
    /// Parent span id (hex); `None` or the zero sentinel for roots
    pub parent_span_id: Option<String>,
    /// Origin tag: name of the broker that recorded the span
    pub origin: String,
    /// Client name when the span was recorded on behalf of a client
    pub client_name: Option<String>,
    /// Arbitrary attributes (user properties)
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl DecodedSpan {
    /// Create a span with no parent and no attributes
    pub fn new(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id: None,
            origin: origin.into(),
            client_name: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the parent span id
    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    /// Set the client name
    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = Some(client_name.into());
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Check if the parent id marks this span as a root
    ///
    /// Only looks at the parent id; client-origin roots are decided by the
    /// correlator, which knows the configured client prefixes.
    pub fn has_root_parent(&self) -> bool {
        self.parent_span_id
            .as_deref()
            .is_none_or(is_root_parent)
    }

    /// Look up a string attribute
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_str)
    }
}
