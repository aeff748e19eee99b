//! Error types for warpsim
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in warpsim
#[derive(Debug, Error)]
pub enum WarpsimError {
    /// Caller supplied a bad value; rejected before any state change
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No agent can handle the item; recoverable, item not enqueued
    #[error("No agent can handle item: {0}")]
    RoutingMiss(String),

    /// Simulated or real processing failure, recorded on the item
    #[error("Processing failure: {0}")]
    ProcessingFailure(String),

    /// Rate limit exceeded; caller decides retry or drop
    #[error("Dispatch rejected: {0}")]
    DispatchRejected(String),

    /// Configuration error at load time
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for warpsim operations
pub type Result<T> = std::result::Result<T, WarpsimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_error() {
        let err = WarpsimError::InvalidArgument("speed level 9 not configured".to_string());
        assert_eq!(err.to_string(), "Invalid argument: speed level 9 not configured");
    }

    #[test]
    fn test_routing_miss_error() {
        let err = WarpsimError::RoutingMiss("item-001".to_string());
        assert_eq!(err.to_string(), "No agent can handle item: item-001");
    }

    #[test]
    fn test_processing_failure_error() {
        let err = WarpsimError::ProcessingFailure("simulated".to_string());
        assert_eq!(err.to_string(), "Processing failure: simulated");
    }

    #[test]
    fn test_dispatch_rejected_error() {
        let err = WarpsimError::DispatchRejected("per-minute cap reached".to_string());
        assert_eq!(err.to_string(), "Dispatch rejected: per-minute cap reached");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WarpsimError = io_err.into();
        assert!(matches!(err, WarpsimError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: WarpsimError = json_err.into();
        assert!(matches!(err, WarpsimError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(WarpsimError::InvalidArgument("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
