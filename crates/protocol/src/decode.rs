//! Span payload decoding
//!
//! The correlator never looks at raw payloads; a `SpanDecoder` turns them into
//! `DecodedSpan`s first. A decode failure drops the message.
//!
//! `JsonSpanDecoder` is the built-in decoder. It accepts one JSON object per
//! payload:
//!
//! ```text
//! {
//!   "trace_id": "4bf92f3577b34da6a3ce929d0e0e4736",   // or [75, 249, ...]
//!   "span_id": "00f067aa0ba902b7",
//!   "parent_span_id": "0000000000000000",             // optional
//!   "origin": "broker1",                              // alias: routerName
//!   "client_name": "solclient/app",                   // optional
//!   "attributes": { "color": "red" }                  // alias: userProperties
//! }
//! ```
//!
//! Ids may be hex strings (any case) or byte arrays; both normalize to
//! lowercase hex. Attribute values may be plain JSON scalars or typed wrappers
//! such as `{"stringValue": "red"}`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::span::{AttributeValue, DecodedSpan, span_id_hex};
use crate::{ProtocolError, Result};

/// Turns a raw payload into a decoded span
pub trait SpanDecoder {
    /// Decode one payload
    fn decode(&self, payload: &[u8]) -> Result<DecodedSpan>;
}

/// Decoder for JSON-encoded span payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSpanDecoder;

impl JsonSpanDecoder {
    /// Create a new JSON decoder
    pub fn new() -> Self {
        Self
    }
}

impl SpanDecoder for JsonSpanDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedSpan> {
        if payload.is_empty() {
            return Err(ProtocolError::EmptyPayload);
        }

        let wire: WireSpan = serde_json::from_slice(payload)?;

        let trace_id = wire
            .trace_id
            .ok_or(ProtocolError::missing_field("trace_id"))?
            .into_hex("trace_id")?;
        let span_id = wire
            .span_id
            .ok_or(ProtocolError::missing_field("span_id"))?
            .into_hex("span_id")?;
        let parent_span_id = wire
            .parent_span_id
            .map(|id| id.into_hex("parent_span_id"))
            .transpose()?
            .filter(|id| !id.is_empty());
        let origin = wire
            .origin
            .filter(|o| !o.is_empty())
            .ok_or(ProtocolError::missing_field("origin"))?;

        if trace_id.is_empty() {
            return Err(ProtocolError::missing_field("trace_id"));
        }
        if span_id.is_empty() {
            return Err(ProtocolError::missing_field("span_id"));
        }

        Ok(DecodedSpan {
            trace_id,
            span_id,
            parent_span_id,
            origin,
            client_name: wire.client_name,
            attributes: convert_attributes(wire.attributes),
        })
    }
}

/// Span as it appears on the wire
#[derive(Debug, Deserialize)]
struct WireSpan {
    #[serde(alias = "traceId")]
    trace_id: Option<WireId>,
    #[serde(alias = "spanId")]
    span_id: Option<WireId>,
    #[serde(alias = "parentSpanId")]
    parent_span_id: Option<WireId>,
    #[serde(alias = "routerName")]
    origin: Option<String>,
    #[serde(alias = "clientName")]
    client_name: Option<String>,
    #[serde(default, alias = "userProperties")]
    attributes: BTreeMap<String, Value>,
}

/// An id as either a hex string or raw bytes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Hex(String),
    Bytes(Vec<u8>),
}

impl WireId {
    fn into_hex(self, field: &'static str) -> Result<String> {
        match self {
            Self::Bytes(bytes) => Ok(span_id_hex(&bytes)),
            Self::Hex(s) => {
                if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(ProtocolError::invalid_hex_id(field, s));
                }
                let mut s = s.to_ascii_lowercase();
                // Odd-length ids are left-padded so every byte is two digits
                if s.len() % 2 == 1 {
                    s.insert(0, '0');
                }
                Ok(s)
            }
        }
    }
}

/// Typed wrapper keys accepted inside attribute objects
const TYPED_VALUE_KEYS: &[&str] = &["stringValue", "intValue", "doubleValue", "boolValue"];

fn convert_attributes(raw: BTreeMap<String, Value>) -> BTreeMap<String, AttributeValue> {
    raw.into_iter()
        .filter_map(|(key, value)| convert_value(value).map(|v| (key, v)))
        .collect()
}

fn convert_value(value: Value) -> Option<AttributeValue> {
    match value {
        Value::Bool(b) => Some(AttributeValue::Bool(b)),
        Value::Number(n) => n
            .as_i64()
            .map(AttributeValue::Int)
            .or_else(|| n.as_f64().map(AttributeValue::Float)),
        Value::String(s) => Some(AttributeValue::String(s)),
        Value::Object(mut map) => TYPED_VALUE_KEYS
            .iter()
            .find_map(|key| map.remove(*key))
            .and_then(convert_value),
        Value::Null | Value::Array(_) => None,
    }
}
