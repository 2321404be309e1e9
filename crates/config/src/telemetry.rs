//! Telemetry subscription configuration
//!
//! The topic pattern the engine subscribes to for broker span messages.

use serde::Deserialize;

/// Default subscription pattern for broker telemetry
pub const DEFAULT_TELEMETRY_TOPIC: &str = "_telemetry/#";

/// Telemetry configuration
///
/// # Example
///
/// ```toml
/// [telemetry]
/// topic = "_telemetry/broker/+/trace"
/// qos = 1
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Topic pattern (`+` single level, trailing `/#` multi level)
    /// Default: `_telemetry/#`
    pub topic: String,

    /// Subscription QoS, 0 to 2
    /// Default: 0
    pub qos: u8,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TELEMETRY_TOPIC.to_string(),
            qos: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: TelemetryConfig = toml::from_str("").unwrap();
        assert_eq!(config.topic, "_telemetry/#");
        assert_eq!(config.qos, 0);
    }

    #[test]
    fn test_custom_topic() {
        let config: TelemetryConfig =
            toml::from_str("topic = \"_telemetry/+/trace\"\nqos = 1").unwrap();
        assert_eq!(config.topic, "_telemetry/+/trace");
        assert_eq!(config.qos, 1);
    }
}
