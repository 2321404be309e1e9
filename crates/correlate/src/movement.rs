//! Movement types
//!
//! An `EventMovement` is one causal edge between two brokers, shown for a
//! fixed duration. It refers back to its trace by `(trace_id, trace_epoch)`
//! and never owns it.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::topology::BrokerRecord;

/// Monotonic movement identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(u64);

impl MovementId {
    /// Create a movement id
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MovementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mv:{}", self.0)
    }
}

/// Display color of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    #[default]
    Green,
    Blue,
    Orange,
}

impl Color {
    /// Lowercase color name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Orange => "orange",
        }
    }

    /// Color named by a span attribute, falling back to `default` when the
    /// attribute is missing or names no known color
    pub fn from_attribute(value: Option<&str>, default: Color) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or(default)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "green" => Ok(Self::Green),
            "blue" => Ok(Self::Blue),
            "orange" => Ok(Self::Orange),
            other => Err(format!("unknown color: {other}")),
        }
    }
}

/// One animated edge from a child span's broker to its parent's broker
#[derive(Debug, Clone, PartialEq)]
pub struct EventMovement {
    pub id: MovementId,
    pub trace_id: String,
    /// Epoch of the trace this movement was emitted for
    pub trace_epoch: u64,
    /// Span whose edge is being shown
    pub span_id: String,
    /// Broker the child span was recorded on
    pub from_broker: BrokerRecord,
    /// Broker the parent span was recorded on
    pub to_broker: BrokerRecord,
    pub started_at: Instant,
    pub duration: Duration,
    pub color: Color,
}

impl EventMovement {
    /// When the movement finishes
    #[inline]
    pub fn ends_at(&self) -> Instant {
        self.started_at + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Color::Orange).unwrap(), "\"orange\"");
        let color: Color = serde_json::from_str("\"blue\"").unwrap();
        assert_eq!(color, Color::Blue);
        assert!(serde_json::from_str::<Color>("\"purple\"").is_err());
    }

    #[test]
    fn test_color_parse_and_fallback() {
        assert_eq!(" RED ".parse::<Color>(), Ok(Color::Red));
        assert_eq!(Color::from_attribute(Some("Blue"), Color::Green), Color::Blue);
        assert_eq!(Color::from_attribute(Some("teal"), Color::Orange), Color::Orange);
        assert_eq!(Color::from_attribute(None, Color::Green), Color::Green);
    }

    #[test]
    fn test_movement_id_is_transparent() {
        let id = MovementId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        assert_eq!(serde_json::from_str::<MovementId>("7").unwrap(), id);
        assert_eq!(id.to_string(), "mv:7");
    }
}
