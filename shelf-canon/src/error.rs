//! Error types for shelf-canon HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{CorrectionError, LookupError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input (400)
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// State conflict (409), e.g. reviewing a resolved submission
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Token-based review outcome (410 Gone)
    #[error("{message}")]
    Gone { code: &'static str, message: String },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// shelf-common error
    #[error("Common error: {0}")]
    Common(#[from] shelf_common::Error),
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Gone { code, message } => (StatusCode::GONE, code, message),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::InvalidFormat(e) => ApiError::bad_request("INVALID_FORMAT", e.to_string()),
            LookupError::NotFound(isbn) => ApiError::NotFound(format!("No book data for ISBN {}", isbn)),
            LookupError::Storage(e) => ApiError::Common(e),
        }
    }
}

impl From<CorrectionError> for ApiError {
    fn from(err: CorrectionError) -> Self {
        let message = err.to_string();
        match err {
            CorrectionError::InvalidFormat(_) => ApiError::bad_request("INVALID_FORMAT", message),
            CorrectionError::NoChanges => ApiError::bad_request("NO_CHANGES", message),
            CorrectionError::UnknownField(_) => ApiError::bad_request("UNKNOWN_FIELD", message),
            CorrectionError::InvalidValue(_) => ApiError::bad_request("INVALID_VALUE", message),
            CorrectionError::TokenInvalid => ApiError::NotFound(message),
            CorrectionError::TokenExpired => ApiError::Gone {
                code: "TOKEN_EXPIRED",
                message,
            },
            CorrectionError::TokenConsumed => ApiError::Gone {
                code: "TOKEN_CONSUMED",
                message,
            },
            CorrectionError::SubmissionNotFound(_) => ApiError::NotFound(message),
            CorrectionError::SubmissionNotPending(_) => ApiError::Conflict(message),
            CorrectionError::CanonicalMissing(_) => ApiError::Conflict(message),
            CorrectionError::Storage(e) => ApiError::Common(e),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
