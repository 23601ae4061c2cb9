//! Error types for rollcall-server
//!
//! Every failure reaches the caller as a status code plus a short message
//! in the body `{"error": {"code", "message"}}`.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::recognizer::RecognizerError;
use crate::services::upload::UploadError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload above the configured ceiling (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Conflict (409), e.g. attendance already marked for the day
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Recognizer could not run or produced unusable output (500)
    #[error("Facial recognition failed: {0}")]
    RecognitionFailed(String),

    /// Recognizer ran but reported failure, e.g. no faces found (400)
    #[error("{0}")]
    RecognitionRejected(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// rollcall-common error
    #[error(transparent)]
    Common(#[from] rollcall_common::Error),
}

impl From<RecognizerError> for ApiError {
    fn from(err: RecognizerError) -> Self {
        ApiError::RecognitionFailed(err.to_string())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            UploadError::Io(e) => ApiError::Io(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status().is_server_error() {
            ApiError::Internal(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!("Expected a multipart form: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::RecognitionFailed(msg) => {
                tracing::error!(error = %msg, "Recognizer infrastructure failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RECOGNITION_FAILED",
                    "Facial recognition failed".to_string(),
                )
            }
            ApiError::RecognitionRejected(msg) => {
                (StatusCode::BAD_REQUEST, "RECOGNITION_REJECTED", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(err) => common_error_parts(err),
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

fn common_error_parts(err: rollcall_common::Error) -> (StatusCode, &'static str, String) {
    use rollcall_common::Error;

    match err {
        Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
        Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
        Error::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
        Error::Database(e) => {
            // Details stay in the log; callers get a generic message
            tracing::error!(error = %e, "Database operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database operation failed".to_string(),
            )
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            other.to_string(),
        ),
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_common_errors_map_to_status() {
        use rollcall_common::Error;

        assert_eq!(status_of(Error::NotFound("x".into()).into()), StatusCode::NOT_FOUND);
        assert_eq!(status_of(Error::InvalidInput("x".into()).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(Error::Conflict("x".into()).into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(Error::Database(sqlx::Error::RowNotFound).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_recognizer_failures_are_distinct() {
        let infra: ApiError = RecognizerError::Malformed("not json".into()).into();
        assert_eq!(status_of(infra), StatusCode::INTERNAL_SERVER_ERROR);

        let soft = ApiError::RecognitionRejected("No faces detected in image".into());
        assert_eq!(status_of(soft), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upload_too_large_maps_to_413() {
        let err: ApiError = UploadError::TooLarge { size: 11, limit: 10 }.into();
        assert_eq!(status_of(err), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
