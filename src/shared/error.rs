//! Shared Error Types
//!
//! This module defines error types raised by the transport-agnostic layer:
//! parsing clock times and dates, decoding transaction kinds and payment
//! methods, and (de)serializing wire events.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - a single field failed validation
//!
//! # Usage
//!
//! ```rust
//! use inventory_ws::shared::error::SharedError;
//!
//! let error = SharedError::validation("start_time", "invalid time format, use HH:MM");
//! assert_eq!(error.field(), Some("start_time"));
//! ```
use thiserror::Error;

/// Errors that can occur in the shared layer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Field name for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::ValidationError { field, .. } => Some(field.as_str()),
            Self::SerializationError { .. } => None,
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
