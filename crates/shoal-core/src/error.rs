//! Error types for shoal operations.
//!
//! Provides structured error handling instead of panics.

use thiserror::Error;

/// Result type for shoal operations.
pub type Result<T> = std::result::Result<T, ShoalError>;

/// Errors that can occur while building or updating a school.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShoalError {
    /// Configuration errors, always reported before a run starts.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (wrapped).
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for ShoalError {
    fn from(e: std::io::Error) -> Self {
        ShoalError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ShoalError {
    fn from(e: serde_json::Error) -> Self {
        ShoalError::Serialization(e.to_string())
    }
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Invalid value.
    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    /// Value outside the interval other settings allow.
    #[error("{field} out of range: {value} (must be within {min}..={max})")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },
}

// Convenience constructors
impl ShoalError {
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ShoalError::Config(ConfigError::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        })
    }

    pub fn out_of_range(field: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        ShoalError::Config(ConfigError::OutOfRange {
            field: field.into(),
            min,
            max,
            value,
        })
    }

    /// True for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, ShoalError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = ShoalError::invalid_config("population_size", "0", "must be positive");
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "Config error: Invalid value for population_size: 0 (must be positive)"
        );
    }

    #[test]
    fn test_out_of_range_display() {
        let err = ShoalError::out_of_range("swim_step", 500.0, 0.0, 200.0);
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "Config error: swim_step out of range: 500 (must be within 0..=200)"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ShoalError = io.into();
        assert!(matches!(err, ShoalError::Io(ref msg) if msg == "gone"));
        assert!(!err.is_config());
    }
}
