//! # Validation Errors
//!
//! Input validation failures shared by every crate. These are raised before
//! any write happens.

use thiserror::Error;

/// Malformed or missing input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty after trimming.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A text field exceeded its maximum length (in characters).
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },

    /// An identifier was zero or otherwise out of range.
    #[error("invalid {field}: {value}")]
    InvalidId {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A timestamp could not be parsed.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Unknown role name.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Trim `value` and check it is non-empty and at most `max` characters.
pub fn require_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}
