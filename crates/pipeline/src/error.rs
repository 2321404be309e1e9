//! Pipeline error types
//!
//! Only engine construction can fail. Once running, bad messages and
//! unresolvable edges are counted and dropped.

use thiserror::Error;

use tracemesh_correlate::CorrelateError;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Broker topology could not be built
    #[error("invalid broker topology: {0}")]
    Topology(#[from] CorrelateError),

    /// Telemetry topic pattern is empty
    #[error("telemetry topic must not be empty")]
    EmptyTopic,
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::from(CorrelateError::duplicate_broker("broker1"));
        assert!(err.to_string().contains("invalid broker topology"));
        assert!(err.to_string().contains("broker1"));

        let err = PipelineError::EmptyTopic;
        assert!(err.to_string().contains("telemetry topic"));
    }
}
