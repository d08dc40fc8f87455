//! Error kinds for store access and their HTTP rendering.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;

/// Failures of a single store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Connection(String),

    #[error("Query on {collection} failed: {message}")]
    Query { collection: String, message: String },

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout { operation: String, after: Duration },

    #[error("Malformed {collection} record: {message}")]
    Decode { collection: String, message: String },

    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl StoreError {
    pub fn query(collection: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Query {
            collection: collection.into(),
            message: err.to_string(),
        }
    }
}

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    #[error("No route for {0}")]
    NotFound(String),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidQuery(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Store(StoreError::Connection(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
            ApiError::Store(StoreError::Query { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "QUERY_FAILED")
            }
            ApiError::Store(StoreError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "QUERY_TIMEOUT")
            }
            ApiError::Store(StoreError::Decode { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DECODE_FAILED")
            }
            ApiError::Store(StoreError::InvalidPattern { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_PATTERN")
            }
            ApiError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "INVALID_QUERY"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, "{}", self);
        } else {
            tracing::warn!(code, "{}", self);
        }

        let body = serde_json::json!({
            "success": false,
            "error": ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout {
            operation: "Query on backtest_info".to_string(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Query on backtest_info timed out after 1500ms");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(StoreError::Connection("refused".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::from(StoreError::query("strategy", "bad filter")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(StoreError::InvalidPattern {
                    pattern: "(".into(),
                    message: "unclosed group".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::InvalidQuery("duplicate field `name`".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::NotFound("/nope".into()), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
