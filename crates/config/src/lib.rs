//! tracemesh Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid config: it subscribes to `_telemetry/#` with an
//! empty broker topology, so every span is ingested but no movement resolves.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use tracemesh_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[telemetry]\nqos = 1").unwrap();
//! assert_eq!(config.telemetry.topic, "_telemetry/#");
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [correlation]
//! movement_duration = "500ms"
//!
//! [[brokers]]
//! name = "broker1"
//! region = "us-east-1"
//! connected_brokers = ["broker2"]
//!
//! [[brokers]]
//! name = "broker2"
//! region = "eu-west-1"
//! ```

mod brokers;
mod correlation;
mod error;
mod logging;
mod metrics;
mod telemetry;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use brokers::BrokerConfig;
pub use correlation::CorrelationConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use telemetry::{DEFAULT_TELEMETRY_TOPIC, TelemetryConfig};

use serde::Deserialize;
use tracemesh_correlate::BrokerRecord;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Engine metrics reporting
    pub metrics: MetricsConfig,

    /// Telemetry subscription
    pub telemetry: TelemetryConfig,

    /// Trace correlation and movement timing
    pub correlation: CorrelationConfig,

    /// Broker topology (`[[brokers]]`)
    pub brokers: Vec<BrokerConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Broker records for the correlator's topology
    pub fn broker_records(&self) -> Vec<BrokerRecord> {
        self.brokers.iter().map(BrokerConfig::to_record).collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
