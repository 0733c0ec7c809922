//! HTTP request handlers for the gateway.

pub mod availability;
pub mod context;
pub mod fallback;
pub mod health;
pub mod meetings;
pub mod metrics;

pub use availability::get_availability;
pub use context::get_context;
pub use fallback::{method_not_allowed, not_found};
pub use health::health_check;
pub use meetings::create_meeting;
pub use metrics::metrics_handler;

use crate::errors::GatewayError;
use serde::de::DeserializeOwned;

/// Deserialize a JSON request body.
///
/// Bodies are parsed by hand rather than through axum's `Json` extractor so
/// that malformed input maps to 400 with the gateway's error body.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "gateway.handlers", error = %e, "Invalid request body");
        GatewayError::BadRequest(format!("Invalid request body: {e}"))
    })
}
