//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

/// Handler for GET /mcp/health
///
/// Liveness only: returns 200 whether or not an owner context is bound.
/// Callers that need the owner check `owner_bound`.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dispatcher_state = state.dispatcher.state();

    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        owner_bound: state.dispatcher.is_bound(),
        dispatcher_state: dispatcher_state.as_str(),
        queue_depth: state.dispatcher.queue_depth(),
    })
}
