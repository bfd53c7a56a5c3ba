//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while installing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The rejected directive.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber or recorder is already installed.
    #[error("{0} is already initialized")]
    AlreadyInitialized(&'static str),

    /// The Prometheus recorder could not be built.
    #[error("failed to initialize metrics: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::InvalidFilter {
            filter: "=".to_string(),
            reason: "empty target".to_string(),
        };
        assert_eq!(err.to_string(), "invalid log filter '=': empty target");
        assert_eq!(
            TelemetryError::AlreadyInitialized("logging").to_string(),
            "logging is already initialized"
        );
    }
}
