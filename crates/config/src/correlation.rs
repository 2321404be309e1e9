//! Trace correlation configuration

use std::time::Duration;

use serde::Deserialize;
use tracemesh_correlate::{
    Color, DEFAULT_BROKER_FADE, DEFAULT_CLIENT_ORIGIN_PREFIX, DEFAULT_MOVEMENT_DURATION,
    DEFAULT_TRACE_TTL,
};

/// Correlation and movement timing
///
/// # Example
///
/// ```toml
/// [correlation]
/// trace_ttl = "15s"
/// movement_duration = "300ms"
/// broker_fade = "1s"
/// client_origin_prefixes = ["solclient", "sdk-"]
/// default_color = "green"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// How long a trace is kept after its first span; never extended
    /// Default: 15s
    #[serde(with = "humantime_serde")]
    pub trace_ttl: Duration,

    /// How long one movement is shown
    /// Default: 300ms
    #[serde(with = "humantime_serde")]
    pub movement_duration: Duration,

    /// Time for a broker's activity highlight to fade out
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub broker_fade: Duration,

    /// Origin or client-name prefixes marking client-edge (root) spans
    /// Default: ["solclient"]
    pub client_origin_prefixes: Vec<String>,

    /// Color for spans without a usable `color` attribute
    /// Default: green
    pub default_color: Color,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            trace_ttl: DEFAULT_TRACE_TTL,
            movement_duration: DEFAULT_MOVEMENT_DURATION,
            broker_fade: DEFAULT_BROKER_FADE,
            client_origin_prefixes: vec![DEFAULT_CLIENT_ORIGIN_PREFIX.to_string()],
            default_color: Color::Green,
        }
    }
}
