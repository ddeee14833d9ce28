//! # Engine Errors
//!
//! [`BlindateError`] is the single error type returned by every engine
//! operation. Domain failures (authorization, state, validation, policy)
//! are reported synchronously and never retried. Store failures arrive as
//! [`StorageError`]; conflicts are retried internally a bounded number of
//! times and surface only when the retry budget is exhausted.
//!
//! Display strings are written for end users: they name the status or the
//! field at fault but never an internal identifier.

use thiserror::Error;

use blindate_core::ValidationError;
use blindate_state::{ChatError, EngagementError};

/// Failure reported by a repository or directory adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Optimistic-concurrency loss or uniqueness violation.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlindateError {
    /// The engagement or chat room does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller is not one of the two participants.
    #[error("you are not a participant of this blind date")]
    NotAParticipant,

    /// The operation is not allowed in the current status.
    #[error("{0}")]
    InvalidState(String),

    /// Malformed input.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The pair has a rejected engagement on record.
    #[error("this blind date was declined; a new invitation is not possible")]
    PermanentlyRejected,

    /// One of the two users has blocked the other.
    #[error("an invitation between these users is not possible")]
    Blocked,

    /// The invitee does not exist.
    #[error("the invited user does not exist")]
    InvalidTarget,

    /// One of the two users is not verified.
    #[error("both users must be verified to arrange a blind date")]
    NotVerified,

    /// A chat message with a blank body.
    #[error("message body must not be empty")]
    EmptyMessage,

    /// Store failure. Safe to retry the whole operation.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BlindateError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotAParticipant => "NOT_A_PARTICIPANT",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PermanentlyRejected => "PERMANENTLY_REJECTED",
            Self::Blocked => "BLOCKED",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::NotVerified => "NOT_VERIFIED",
            Self::EmptyMessage => "EMPTY_MESSAGE",
            Self::Storage(StorageError::Conflict(_)) => "CONFLICT",
            Self::Storage(StorageError::Unavailable(_)) => "STORAGE_UNAVAILABLE",
            Self::Storage(StorageError::Corrupt(_)) => "STORAGE_CORRUPT",
        }
    }

    /// Whether the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(StorageError::Conflict(_) | StorageError::Unavailable(_))
        )
    }
}

impl From<EngagementError> for BlindateError {
    fn from(err: EngagementError) -> Self {
        match err {
            EngagementError::NotAParticipant => Self::NotAParticipant,
            EngagementError::InvalidState { .. } => Self::InvalidState(err.to_string()),
            EngagementError::PermanentlyRejected => Self::PermanentlyRejected,
            EngagementError::Validation(v) => Self::Validation(v),
        }
    }
}

impl From<ChatError> for BlindateError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotAParticipant => Self::NotAParticipant,
            ChatError::Closed => Self::InvalidState("the chat room is closed".into()),
            ChatError::EmptyMessage => Self::EmptyMessage,
            ChatError::Validation(v) => Self::Validation(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_invalid_state_keeps_status_detail() {
        let err: BlindateError = EngagementError::InvalidState {
            operation: "respond",
            reason: "engagement is accepted".into(),
        }
        .into();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(err.to_string(), "cannot respond: engagement is accepted");
    }

    #[test]
    fn closed_chat_is_invalid_state() {
        let err: BlindateError = ChatError::Closed.into();
        assert!(matches!(err, BlindateError::InvalidState(_)));
    }

    #[test]
    fn only_transient_storage_errors_are_retryable() {
        assert!(BlindateError::Storage(StorageError::Conflict("v".into())).is_retryable());
        assert!(BlindateError::Storage(StorageError::Unavailable("down".into())).is_retryable());
        assert!(!BlindateError::Storage(StorageError::Corrupt("bad".into())).is_retryable());
        assert!(!BlindateError::Blocked.is_retryable());
        assert!(!BlindateError::InvalidState("x".into()).is_retryable());
    }

    #[test]
    fn codes_are_distinct_per_domain_variant() {
        let codes = [
            BlindateError::NotFound("engagement").code(),
            BlindateError::NotAParticipant.code(),
            BlindateError::PermanentlyRejected.code(),
            BlindateError::Blocked.code(),
            BlindateError::InvalidTarget.code(),
            BlindateError::NotVerified.code(),
            BlindateError::EmptyMessage.code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
