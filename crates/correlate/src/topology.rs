//! Broker topology
//!
//! `BrokerRegistry` is the read-only broker table the scheduler resolves
//! origin tags against. It is built once at startup and never mutated while
//! traces are being evaluated.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::error::{CorrelateError, Result};

/// Position of a region on the globe
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    /// Human-readable location
    pub location: &'static str,
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

const fn at(location: &'static str, latitude: f64, longitude: f64) -> Coordinates {
    Coordinates {
        location,
        latitude,
        longitude,
    }
}

/// Regions brokers may be placed in
pub const KNOWN_REGIONS: &[(&str, Coordinates)] = &[
    ("us-east-1", at("Virginia, USA", 38.13, -78.45)),
    ("us-east-2", at("Ohio, USA", 39.98, -82.98)),
    ("us-west-1", at("California, USA", 37.27, -121.96)),
    ("us-west-2", at("Oregon, USA", 45.52, -122.68)),
    ("eu-west-1", at("Ireland", 53.33, -6.25)),
    ("eu-west-2", at("London, UK", 51.51, -0.13)),
    ("eu-west-3", at("Paris, France", 48.85, 2.35)),
    ("eu-central-1", at("Frankfurt, Germany", 50.11, 8.68)),
    ("ap-northeast-1", at("Tokyo, Japan", 35.68, 139.69)),
    ("ap-northeast-2", at("Seoul, South Korea", 37.57, 126.97)),
    ("ap-southeast-1", at("Singapore", 1.35, 103.8)),
    ("ap-southeast-2", at("Sydney, Australia", -33.86, 151.21)),
    ("ap-south-1", at("Mumbai, India", 19.07, 72.88)),
    ("sa-east-1", at("Sao Paulo, Brazil", -23.55, -46.63)),
    ("ca-central-1", at("Montreal, Canada", 45.5, -73.58)),
    ("cn-north-1", at("Beijing, China", 39.9, 116.39)),
    ("cn-northwest-1", at("Ningxia, China", 38.28, 106.2)),
    ("us-gov-west-1", at("Washington, USA", 38.91, -77.03)),
    ("us-gov-east-1", at("Virginia, USA", 38.13, -78.45)),
    ("us-iso-east-1", at("Virginia, USA", 38.13, -78.45)),
    ("us-isob-east-1", at("Virginia, USA", 38.13, -78.45)),
    ("ottawa-lab", at("Ottawa, Canada", 45.42, -75.69)),
];

/// Look up the coordinates of a region
pub fn region_coordinates(region: &str) -> Option<Coordinates> {
    KNOWN_REGIONS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, coords)| *coords)
}

/// One configured broker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerRecord {
    /// Broker name; spans carry it as their origin tag
    pub name: String,
    /// Region the broker runs in
    pub region: String,
    /// Names of brokers this one links to
    pub connected_brokers: Vec<String>,
}

impl BrokerRecord {
    /// Create a broker with no links
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            connected_brokers: Vec::new(),
        }
    }

    /// Add links to other brokers
    pub fn with_connections<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connected_brokers
            .extend(brokers.into_iter().map(Into::into));
        self
    }

    /// Coordinates of this broker's region
    #[inline]
    pub fn coordinates(&self) -> Option<Coordinates> {
        region_coordinates(&self.region)
    }
}

/// Read-only broker table
#[derive(Debug, Clone, Default)]
pub struct BrokerRegistry {
    brokers: HashMap<String, BrokerRecord>,
    /// Broker names in configuration order
    order: Vec<String>,
}

impl BrokerRegistry {
    /// Build the table
    ///
    /// # Errors
    ///
    /// Fails on duplicate broker names or regions with no known coordinates.
    pub fn new(records: impl IntoIterator<Item = BrokerRecord>) -> Result<Self> {
        let mut registry = Self::default();

        for record in records {
            if region_coordinates(&record.region).is_none() {
                return Err(CorrelateError::unknown_region(&record.name, &record.region));
            }
            if registry.brokers.contains_key(&record.name) {
                return Err(CorrelateError::duplicate_broker(&record.name));
            }
            registry.order.push(record.name.clone());
            registry.brokers.insert(record.name.clone(), record);
        }

        Ok(registry)
    }

    /// Resolve a span origin tag to its broker
    #[inline]
    pub fn resolve_broker(&self, origin: &str) -> Option<&BrokerRecord> {
        self.brokers.get(origin)
    }

    /// Brokers in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &BrokerRecord> {
        self.order.iter().filter_map(|name| self.brokers.get(name))
    }

    /// Number of brokers
    #[inline]
    pub fn len(&self) -> usize {
        self.brokers.len()
    }

    /// Check if the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }

    /// Distinct broker links as sorted name pairs
    ///
    /// A link declared from both ends is reported once. Links to brokers
    /// missing from the table are skipped with a warning.
    pub fn links(&self) -> Vec<(String, String)> {
        let mut pairs = BTreeSet::new();

        for broker in self.iter() {
            for other in &broker.connected_brokers {
                if !self.brokers.contains_key(other) {
                    warn!(broker = %broker.name, connected = %other, "no config for connected broker");
                    continue;
                }
                let pair = if broker.name <= *other {
                    (broker.name.clone(), other.clone())
                } else {
                    (other.clone(), broker.name.clone())
                };
                pairs.insert(pair);
            }
        }

        pairs.into_iter().collect()
    }
}

/// Last-movement time per broker, used to highlight busy brokers
#[derive(Debug, Clone)]
pub struct BrokerActivity {
    last_event: HashMap<String, Instant>,
    fade: Duration,
}

impl BrokerActivity {
    /// Create an activity tracker with the given fade-out time
    pub fn new(fade: Duration) -> Self {
        Self {
            last_event: HashMap::new(),
            fade,
        }
    }

    /// Record a movement leaving a broker
    pub fn record(&mut self, broker: &str, at: Instant) {
        self.last_event.insert(broker.to_owned(), at);
    }

    /// When a movement last left a broker
    #[inline]
    pub fn last_event(&self, broker: &str) -> Option<Instant> {
        self.last_event.get(broker).copied()
    }

    /// Highlight level in `[0, 1]`: 1 right after a movement, fading linearly
    /// to 0 over the fade time
    pub fn heat(&self, broker: &str, now: Instant) -> f32 {
        let Some(last) = self.last_event(broker) else {
            return 0.0;
        };
        if self.fade.is_zero() {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(last);
        (1.0 - elapsed.as_secs_f32() / self.fade.as_secs_f32()).clamp(0.0, 1.0)
    }
}
