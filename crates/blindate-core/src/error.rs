//! # Validation Errors
//!
//! The single error type of this crate. Every constructor that checks its
//! input reports the offending field and a human-readable reason, so callers
//! can render a precise message without echoing internal identifiers.

use thiserror::Error;

/// Malformed input rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Name of the rejected field, as the caller knows it.
    pub field: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl ValidationError {
    /// Build a validation error for `field`.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
