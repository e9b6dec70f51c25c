//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::query::QueryError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Find or fetch failed
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Status code and machine-readable code for this error
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Query(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, "INVALID_QUERY"),
            ApiError::Query(QueryError::Backend(_)) => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR"),
            ApiError::Query(QueryError::BatchOverflow { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "BATCH_OVERFLOW")
            }
            ApiError::Query(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        let request_id = uuid::Uuid::new_v4().to_string();

        // Log the error
        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    #[test]
    fn test_classification() {
        let cases = [
            (ApiError::Validation("from".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::Query(QueryError::InvalidPattern("a..b".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Query(QueryError::Backend(BackendError::Timeout)),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Query(QueryError::BatchOverflow {
                    metric: "a".into(),
                    size: 9,
                    max_bytes: 8,
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Query(QueryError::Configuration("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.classify().0, status, "{}", error);
        }
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::Query(QueryError::Backend(BackendError::AuthFailure {
            status: 401,
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
