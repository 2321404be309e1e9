//! Broker topology configuration

use serde::Deserialize;
use tracemesh_correlate::BrokerRecord;

/// One `[[brokers]]` entry
///
/// # Example
///
/// ```toml
/// [[brokers]]
/// name = "broker1"
/// region = "us-east-1"
/// connected_brokers = ["broker2"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker name; must equal the origin tag on its spans
    pub name: String,

    /// Region code, e.g. `us-east-1`
    pub region: String,

    /// Brokers this one links to
    pub connected_brokers: Vec<String>,
}

impl BrokerConfig {
    /// Convert to the correlator's broker record
    pub fn to_record(&self) -> BrokerRecord {
        BrokerRecord::new(&self.name, &self.region)
            .with_connections(self.connected_brokers.iter().cloned())
    }
}
