//! Configuration validation
//!
//! Validates config consistency:
//! - Telemetry topic is set and QoS is in range
//! - Correlation timings are non-zero
//! - Brokers have unique names and known regions
//! - Connected brokers are declared

use std::collections::HashSet;

use tracemesh_correlate::region_coordinates;

use crate::Config;
use crate::error::{ConfigError, Result};

/// Highest QoS level a subscription may request
const MAX_QOS: u8 = 2;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_telemetry(config)?;
    validate_correlation(config)?;
    validate_metrics(config)?;
    validate_brokers(config)?;
    Ok(())
}

fn validate_telemetry(config: &Config) -> Result<()> {
    let telemetry = &config.telemetry;

    if telemetry.topic.trim().is_empty() {
        return Err(ConfigError::missing_field("telemetry", "telemetry", "topic"));
    }

    if telemetry.qos > MAX_QOS {
        return Err(ConfigError::invalid_value(
            "telemetry",
            "telemetry",
            "qos",
            format!("must be 0, 1 or 2, got {}", telemetry.qos),
        ));
    }

    Ok(())
}

fn validate_correlation(config: &Config) -> Result<()> {
    let correlation = &config.correlation;

    for (field, value) in [
        ("trace_ttl", correlation.trace_ttl),
        ("movement_duration", correlation.movement_duration),
        ("broker_fade", correlation.broker_fade),
    ] {
        if value.is_zero() {
            return Err(ConfigError::invalid_value(
                "correlation",
                "correlation",
                field,
                "must be greater than zero",
            ));
        }
    }

    if correlation
        .client_origin_prefixes
        .iter()
        .any(|p| p.is_empty())
    {
        // An empty prefix would make every span a root
        return Err(ConfigError::invalid_value(
            "correlation",
            "correlation",
            "client_origin_prefixes",
            "prefixes must not be empty",
        ));
    }

    Ok(())
}

fn validate_metrics(config: &Config) -> Result<()> {
    if config.metrics.enabled && config.metrics.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "metrics",
            "metrics",
            "interval",
            "must be greater than zero when metrics are enabled",
        ));
    }
    Ok(())
}

fn validate_brokers(config: &Config) -> Result<()> {
    let mut names = HashSet::new();

    for (i, broker) in config.brokers.iter().enumerate() {
        if broker.name.is_empty() {
            return Err(ConfigError::missing_field("broker", format!("#{}", i + 1), "name"));
        }
        if broker.region.is_empty() {
            return Err(ConfigError::missing_field("broker", &broker.name, "region"));
        }
        if region_coordinates(&broker.region).is_none() {
            return Err(ConfigError::invalid_value(
                "broker",
                &broker.name,
                "region",
                format!("unknown region '{}'", broker.region),
            ));
        }
        if !names.insert(broker.name.as_str()) {
            return Err(ConfigError::duplicate_broker(&broker.name));
        }
    }

    for broker in &config.brokers {
        if let Some(missing) = broker
            .connected_brokers
            .iter()
            .find(|other| !names.contains(other.as_str()))
        {
            return Err(ConfigError::unknown_broker(&broker.name, missing));
        }
    }

    Ok(())
}
