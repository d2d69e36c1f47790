//! Error types and handling for EVN Monitor
//!
//! This module defines the error types used throughout the crate. Dirty
//! reading data never surfaces here: it is normalized where it is parsed.

use thiserror::Error;

/// Result type alias for EVN Monitor operations
pub type Result<T> = std::result::Result<T, EvnError>;

/// Main error type for EVN Monitor
#[derive(Debug, Error)]
pub enum EvnError {
    /// Configuration-related errors (billing cycle, accounts data, settings)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl EvnError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        EvnError::Config {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        EvnError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        EvnError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        EvnError::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        EvnError::Generic {
            message: message.into(),
        }
    }

    /// Whether the error was caused by caller input rather than the environment
    pub fn is_user_error(&self) -> bool {
        matches!(self, EvnError::Config { .. } | EvnError::Validation { .. })
    }
}

impl From<std::io::Error> for EvnError {
    fn from(err: std::io::Error) -> Self {
        EvnError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for EvnError {
    fn from(err: serde_yaml::Error) -> Self {
        EvnError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EvnError {
    fn from(err: serde_json::Error) -> Self {
        EvnError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for EvnError {
    fn from(err: chrono::ParseError) -> Self {
        EvnError::validation("date", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = EvnError::config("test config error");
        assert!(matches!(err, EvnError::Config { .. }));

        let err = EvnError::web("bind failed");
        assert!(matches!(err, EvnError::Web { .. }));

        let err = EvnError::validation("field", "test validation error");
        assert!(matches!(err, EvnError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = EvnError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = EvnError::validation("start_day", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: start_day - invalid value");
    }

    #[test]
    fn test_user_error_classification() {
        assert!(EvnError::config("x").is_user_error());
        assert!(EvnError::validation("f", "m").is_user_error());
        assert!(!EvnError::io("x").is_user_error());
        assert!(!EvnError::generic("x").is_user_error());
    }
}
