//! Gateway error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients stay generic where the cause is internal; the cause is
//! logged server-side.

use crate::dispatcher::DispatchError;
use crate::observability::metrics::record_error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use slot_engine::SlotError;
use std::time::Duration;
use thiserror::Error;

/// Gateway error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - MethodNotAllowed: 405 Method Not Allowed
/// - ExecutionFailed, Internal: 500 Internal Server Error
/// - ServiceUnavailable: 503 Service Unavailable
/// - GatewayTimeout: 504 Gateway Timeout
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The owner ran the operation and it failed.
    #[error("Owner execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Owner did not respond within {0:?}")]
    GatewayTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error (for metrics recording).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::BadRequest(_) => 400,
            GatewayError::NotFound(_) => 404,
            GatewayError::MethodNotAllowed => 405,
            GatewayError::ExecutionFailed(_) | GatewayError::Internal(_) => 500,
            GatewayError::ServiceUnavailable(_) => 503,
            GatewayError::GatewayTimeout(_) => 504,
        }
    }

    /// Returns the machine-readable error code used in response bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            GatewayError::ExecutionFailed(_) => "EXECUTION_FAILED",
            GatewayError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            GatewayError::GatewayTimeout(_) => "TIMEOUT",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            GatewayError::NotFound(resource) => (StatusCode::NOT_FOUND, resource.clone()),
            GatewayError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed for this endpoint".to_string(),
            ),
            GatewayError::ExecutionFailed(detail) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "gateway.owner", error = %detail, "Owner execution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The owner context failed to execute the request".to_string(),
                )
            }
            GatewayError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "gateway.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Owner context is not available".to_string(),
                )
            }
            GatewayError::GatewayTimeout(limit) => {
                tracing::warn!(target: "gateway.availability", limit_ms = limit.as_millis(), "Owner timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "The owner context did not respond in time".to_string(),
                )
            }
            GatewayError::Internal(detail) => {
                tracing::error!(target: "gateway.internal", error = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        record_error(self.code(), self.status_code());

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<DispatchError> for GatewayError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Unavailable => {
                GatewayError::ServiceUnavailable("no owner context is bound".to_string())
            }
            DispatchError::ExecutionFailed(cause) => GatewayError::ExecutionFailed(cause.to_string()),
            DispatchError::TimedOut(limit) => GatewayError::GatewayTimeout(limit),
            other @ (DispatchError::AlreadyBound | DispatchError::OwnerSpawn(_)) => {
                GatewayError::Internal(other.to_string())
            }
        }
    }
}

impl From<SlotError> for GatewayError {
    fn from(err: SlotError) -> Self {
        GatewayError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::BadRequest("x".to_string()).status_code(), 400);
        assert_eq!(GatewayError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(GatewayError::MethodNotAllowed.status_code(), 405);
        assert_eq!(GatewayError::ExecutionFailed("x".to_string()).status_code(), 500);
        assert_eq!(GatewayError::Internal("x".to_string()).status_code(), 500);
        assert_eq!(GatewayError::ServiceUnavailable("x".to_string()).status_code(), 503);
        assert_eq!(
            GatewayError::GatewayTimeout(Duration::from_secs(1)).status_code(),
            504
        );
    }

    #[test]
    fn test_from_dispatch_error() {
        assert!(matches!(
            GatewayError::from(DispatchError::Unavailable),
            GatewayError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            GatewayError::from(DispatchError::TimedOut(Duration::from_secs(30))),
            GatewayError::GatewayTimeout(d) if d == Duration::from_secs(30)
        ));
        assert!(matches!(
            GatewayError::from(DispatchError::AlreadyBound),
            GatewayError::Internal(_)
        ));

        let cause: crate::dispatcher::BoxError = "mailbox locked".into();
        match GatewayError::from(DispatchError::ExecutionFailed(cause)) {
            GatewayError::ExecutionFailed(detail) => assert_eq!(detail, "mailbox locked"),
            other => unreachable!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_from_slot_error_is_bad_request() {
        let err = GatewayError::from(SlotError::InvalidRequest("no attendees".to_string()));
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("no attendees"));
    }

    #[tokio::test]
    async fn test_bad_request_body_includes_reason() {
        let response = GatewayError::BadRequest("Invalid request body".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert_eq!(body["error"]["message"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_execution_failed_hides_detail() {
        let response =
            GatewayError::ExecutionFailed("COM object disconnected at 0x1234".to_string())
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "EXECUTION_FAILED");
        let message = body["error"]["message"].as_str().unwrap();
        assert!(!message.contains("0x1234"));
    }

    #[tokio::test]
    async fn test_unavailable_response() {
        let response = GatewayError::from(DispatchError::Unavailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_timeout_response() {
        let response = GatewayError::GatewayTimeout(Duration::from_secs(5)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "TIMEOUT");
    }
}
