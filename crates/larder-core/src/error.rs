//! Error types for Larder operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used by
//! the Larder crates for configuration and data problems. Dispatch-level
//! failures have their own taxonomy in `larder-mcp`.

use thiserror::Error;

/// Errors that can occur in Larder core operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Returns `true` if this error indicates a deployment or configuration
    /// defect rather than bad input.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias using Larder's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::config("missing section").to_string(),
            "Configuration error: missing section"
        );
        assert_eq!(
            Error::invalid_data("bad window").to_string(),
            "Invalid data: bad window"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_config());
    }

    #[test]
    fn test_error_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(err.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn test_is_config() {
        assert!(Error::config("x").is_config());
        assert!(!Error::invalid_data("x").is_config());
    }
}
