//! HTTP routes for the gateway.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::store::OwnerStore;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use chrono::FixedOffset;
use metrics_exporter_prometheus::PrometheusHandle;
use slot_engine::{SlotEngine, SlotError, WorkingHours};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Dispatcher for the owner context holding the mailbox store.
    pub dispatcher: Arc<Dispatcher<OwnerStore>>,

    /// Slot engine configured from the free/busy interval and working day.
    pub engine: SlotEngine,
}

impl AppState {
    /// Build the state, deriving the slot engine from `config`.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidRequest` if the interval, offset or
    /// working day in `config` is out of range.
    pub fn new(
        config: Config,
        dispatcher: Arc<Dispatcher<OwnerStore>>,
    ) -> Result<Self, SlotError> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            SlotError::InvalidRequest(format!(
                "UTC offset of {} minutes is out of range",
                config.utc_offset_minutes
            ))
        })?;
        let working_hours =
            WorkingHours::new(offset, config.workday_start_hour, config.workday_end_hour)?;
        let engine = SlotEngine::new(config.free_busy_interval_minutes)?
            .with_working_hours(working_hours)
            .with_max_range_days(config.max_availability_days);

        Ok(Self {
            config,
            dispatcher,
            engine,
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `POST /mcp/getContext` - Search mail, calendar and contacts
/// - `POST /mcp/getAvailability` - Free/busy lookup and slot suggestions
/// - `POST /mcp/createMeeting` - Book a meeting
/// - `GET /mcp/health` - Liveness with dispatcher state
/// - `GET /metrics` - Prometheus metrics endpoint
/// - JSON 404 for unknown paths and JSON 405 for wrong methods
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout from `config.request_timeout_seconds`
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);

    let mcp_routes = Router::new()
        .route(
            "/mcp/getContext",
            post(handlers::get_context).fallback(handlers::method_not_allowed),
        )
        .route(
            "/mcp/getAvailability",
            post(handlers::get_availability).fallback(handlers::method_not_allowed),
        )
        .route(
            "/mcp/createMeeting",
            post(handlers::create_meeting).fallback(handlers::method_not_allowed),
        )
        .route(
            "/mcp/health",
            get(handlers::health_check).fallback(handlers::method_not_allowed),
        )
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route(
            "/metrics",
            get(handlers::metrics_handler).fallback(handlers::method_not_allowed),
        )
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    mcp_routes
        .merge(metrics_routes)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}
