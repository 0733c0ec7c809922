//! Fallbacks for unknown paths and unsupported methods.

use crate::errors::GatewayError;
use axum::http::Uri;

/// Router fallback: any path outside the known endpoints.
pub async fn not_found(uri: Uri) -> GatewayError {
    GatewayError::NotFound(format!("No endpoint at {}", uri.path()))
}

/// Method fallback for the known endpoints.
pub async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}
