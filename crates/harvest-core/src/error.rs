//! Core error types for the Harvest pipeline.
//!
//! This module defines the central error type used across all subsystems.
//! Each subsystem error is represented as a variant for clear error propagation.

use thiserror::Error;

/// Central error type for all Harvest operations.
///
/// Acquisition failures never surface through this type: they are folded
/// into degraded records by the scraper. What remains here is validation,
/// storage, queue and configuration failures.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (missing URL, malformed URL, empty batch)
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage errors (connection, queries, constraint violations)
    #[error("storage error: {0}")]
    Storage(String),

    /// Browser automation errors (launch, navigation)
    #[error("browser error: {0}")]
    Browser(String),

    /// Job queue errors (queue closed)
    #[error("queue error: {0}")]
    Queue(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found at an explicitly requested path
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `HarvestError`.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarvestError::Validation("no valid URLs".to_string());
        assert_eq!(err.to_string(), "validation error: no valid URLs");

        let err = ConfigError::NoConfigDir;
        assert_eq!(
            err.to_string(),
            "could not determine config directory (XDG base directories not available)"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: HarvestError = config_err.into();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: HarvestError = io_err.into();
        assert!(matches!(err, HarvestError::Io(_)));
    }
}
