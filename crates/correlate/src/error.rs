//! Correlation error types
//!
//! Only topology construction can fail; ingest and scheduling degrade to
//! "this span is ignored" instead of erroring.

use thiserror::Error;

/// Result type for correlation operations
pub type Result<T> = std::result::Result<T, CorrelateError>;

/// Errors raised while building the broker topology
#[derive(Debug, Error)]
pub enum CorrelateError {
    /// Two brokers share a name
    #[error("duplicate broker '{name}' in topology")]
    DuplicateBroker {
        /// Broker name
        name: String,
    },

    /// Broker placed in a region with no known coordinates
    #[error("broker '{broker}' is in unknown region '{region}'")]
    UnknownRegion {
        /// Broker name
        broker: String,
        /// Region name
        region: String,
    },
}

impl CorrelateError {
    /// Create a DuplicateBroker error
    #[inline]
    pub fn duplicate_broker(name: impl Into<String>) -> Self {
        Self::DuplicateBroker { name: name.into() }
    }

    /// Create an UnknownRegion error
    #[inline]
    pub fn unknown_region(broker: impl Into<String>, region: impl Into<String>) -> Self {
        Self::UnknownRegion {
            broker: broker.into(),
            region: region.into(),
        }
    }
}
