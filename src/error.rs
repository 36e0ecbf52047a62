//! Error types for batchline
//!
//! Crate-level errors cover configuration, bootstrap and I/O. Per-call outcomes
//! live in [`crate::endpoint::CallError`] and transport failures in
//! [`crate::transport::TransportError`]; the public endpoint operations never
//! surface either as a `Result`.

use crate::transport::TransportError;
use thiserror::Error;

/// Result type alias for batchline operations
pub type Result<T> = std::result::Result<T, BatchlineError>;

/// Error type for batchline operations
#[derive(Error, Debug)]
pub enum BatchlineError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport errors raised outside the scheduling loop
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Lookup of an endpoint name that the registry does not know
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BatchlineError::Config("missing ports".to_string()).to_string(),
            "Configuration error: missing ports"
        );
        assert_eq!(
            BatchlineError::UnknownEndpoint("queue".to_string()).to_string(),
            "Unknown endpoint: queue"
        );
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BatchlineError = err.into();
        assert!(matches!(err, BatchlineError::Json(_)));
    }
}
