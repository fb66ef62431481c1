//! Custom error types for grid-tapper.
//!
//! Errors raised while building a run are surfaced to the caller as short
//! status messages. Nothing inside the tap pipeline itself is fatal.

use std::io;
use thiserror::Error;

/// Main error type for grid-tapper operations.
#[derive(Error, Debug)]
pub enum GtError {
    /// The configuration cannot be used for a run.
    #[error("configuration error: {0}")]
    ConfigValidation(String),

    /// The line source produced no usable lines.
    #[error("'{source_name}' is empty or invalid")]
    EmptyInput { source_name: String },

    /// Error reading or parsing a profile file.
    #[error("failed to load profile from '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Error writing a profile file.
    #[error("failed to save profile to '{path}': {reason}")]
    ConfigSave { path: String, reason: String },

    /// The tap capability is not available here.
    #[error("tapping not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    /// The tap capability refused a tap.
    #[error("tap at ({x}, {y}) was rejected")]
    TapRejected { x: i32, y: i32 },

    /// Error registering or handling the stop hotkey.
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for grid-tapper operations.
pub type Result<T> = std::result::Result<T, GtError>;

impl GtError {
    /// Create a new ConfigValidation error.
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation(message.into())
    }

    /// Create a new EmptyInput error.
    pub fn empty_input(source_name: impl Into<String>) -> Self {
        Self::EmptyInput {
            source_name: source_name.into(),
        }
    }

    /// Create a new ConfigLoad error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ConfigSave error.
    pub fn config_save(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigSave {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new UnsupportedPlatform error.
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform(message.into())
    }

    pub fn tap_rejected(x: i32, y: i32) -> Self {
        Self::TapRejected { x, y }
    }

    pub fn hotkey(message: impl Into<String>) -> Self {
        Self::Hotkey(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GtError::empty_input("numbers.txt");
        assert_eq!(err.to_string(), "'numbers.txt' is empty or invalid");

        let err = GtError::config_validation("cols must be greater than 0, got 0");
        assert_eq!(
            err.to_string(),
            "configuration error: cols must be greater than 0, got 0"
        );

        let err = GtError::tap_rejected(392, 840);
        assert_eq!(err.to_string(), "tap at (392, 840) was rejected");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let gt_err: GtError = io_err.into();
        assert!(matches!(gt_err, GtError::Io(_)));
    }
}
