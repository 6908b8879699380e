//! Error types for the attendance station.
//!
//! Only failures that stop the station live here. Per-cycle failures
//! (bad tags, missing records, directory faults) are reported as
//! [`CycleOutcome`](crate::CycleOutcome) values and never end the loop.

use std::path::PathBuf;

use rollcall_directory::DirectoryError;
use rollcall_hardware::HardwareError;

/// A specialized `Result` type for station operations.
pub type Result<T> = std::result::Result<T, StationError>;

/// Errors that stop the attendance station.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your rollcall.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Hardware Errors
    // ========================================================================
    /// The indicator or tag reader failed.
    #[error("Hardware failure: {0}\n\nSuggestion: Check the indicator wiring and the reader connection")]
    Hardware(#[from] HardwareError),

    /// The configured indicator backend is not compiled into this binary.
    #[error("Indicator backend '{backend}' is not available in this build\n\nSuggestion: Rebuild with --features rpi or set \"indicator\": \"log\" in rollcall.json")]
    IndicatorUnavailable {
        /// Name of the requested backend.
        backend: String,
    },

    // ========================================================================
    // Directory Errors
    // ========================================================================
    /// The directory could not be set up.
    #[error("Directory setup failed: {0}\n\nSuggestion: Check the credentials file and network access to the store")]
    Directory(#[from] DirectoryError),
}

impl StationError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `IndicatorUnavailable` error.
    #[must_use]
    pub fn indicator_unavailable(backend: impl Into<String>) -> Self {
        Self::IndicatorUnavailable {
            backend: backend.into(),
        }
    }
}
