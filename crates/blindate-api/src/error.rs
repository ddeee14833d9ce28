//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps engine errors to HTTP status codes and a JSON body carrying a
//! machine-readable code. Server-side failures are logged and redacted.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use blindate_engine::{BlindateError, StorageError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "BLOCKED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// An engine operation failed.
    #[error(transparent)]
    Domain(#[from] BlindateError),

    /// Request body or path could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Domain(err) => (domain_status(err), err.code()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn domain_status(err: &BlindateError) -> StatusCode {
    match err {
        BlindateError::NotFound(_) => StatusCode::NOT_FOUND,
        BlindateError::NotAParticipant | BlindateError::NotVerified => StatusCode::FORBIDDEN,
        BlindateError::InvalidState(_)
        | BlindateError::PermanentlyRejected
        | BlindateError::Blocked => StatusCode::CONFLICT,
        BlindateError::Validation(_)
        | BlindateError::InvalidTarget
        | BlindateError::EmptyMessage => StatusCode::UNPROCESSABLE_ENTITY,
        BlindateError::Storage(StorageError::Conflict(_)) => StatusCode::CONFLICT,
        BlindateError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        BlindateError::Storage(StorageError::Corrupt(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "internal server error");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Storage is temporarily unavailable".to_string(),
                _ => "An internal error occurred".to_string(),
            }
        } else {
            self.to_string()
        };

        let details = match &self {
            Self::Domain(BlindateError::Validation(v)) => {
                Some(serde_json::json!({ "field": v.field }))
            }
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<blindate_core::ValidationError> for AppError {
    fn from(err: blindate_core::ValidationError) -> Self {
        Self::Domain(BlindateError::Validation(err))
    }
}
