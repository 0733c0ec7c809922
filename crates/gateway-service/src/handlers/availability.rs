//! Availability handler.
//!
//! `POST /mcp/getAvailability` fetches one free/busy timeline per attendee on
//! the owner, then runs the slot engine on the caller's task. Attendees that
//! cannot be resolved are reported in `errors` and count as `Unknown` in
//! every window.

use crate::errors::GatewayError;
use crate::handlers::parse_body;
use crate::models::{AvailabilityRequest, AvailabilityResponse, ErrorEntry, MeetingSlot};
use crate::observability::metrics::record_slot_computation;
use crate::routes::AppState;
use crate::store::{OwnerStore, StoreError};
use axum::{body::Bytes, extract::State, Json};
use slot_engine::{SlotRequest, Timeline, Timelines};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Handler for POST /mcp/getAvailability
///
/// # Response
///
/// - 200 OK: Suggested slots, possibly empty, with per-attendee errors
/// - 400 Bad Request: Malformed body or invalid scheduling parameters
/// - 503 Service Unavailable: No owner context bound
/// - 504 Gateway Timeout: Owner did not respond in time
#[instrument(
    skip_all,
    name = "gateway.availability.get",
    fields(request_id = tracing::field::Empty, attendees = tracing::field::Empty)
)]
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AvailabilityResponse>, GatewayError> {
    let request: AvailabilityRequest = parse_body(&body)?;
    let span = tracing::Span::current();
    span.record("request_id", request.request_id.as_str());

    let slot_request = SlotRequest::new(
        request
            .attendees
            .iter()
            .map(|attendee| attendee.trim().to_lowercase()),
        request.start_date_utc,
        request.end_date_utc,
        request.meeting_duration_minutes,
    )
    .working_hours_only(request.working_hours_only)
    .min_percentage_free(request.minimum_percentage_of_attendees_free);
    state.engine.validate(&slot_request)?;
    span.record("attendees", slot_request.attendees.len());

    let attendees = slot_request.attendees.clone();
    let (from, to) = (slot_request.from, slot_request.to);
    let granularity = state.engine.granularity_minutes();

    let lookups: Vec<(String, Result<Timeline, StoreError>)> = state
        .dispatcher
        .submit_with_deadline(
            "free_busy",
            state.config.dispatch_timeout,
            move |store: &mut OwnerStore| {
                Ok::<_, Infallible>(
                    attendees
                        .into_iter()
                        .map(|attendee| {
                            let timeline = store.free_busy(&attendee, from, to, granularity);
                            (attendee, timeline)
                        })
                        .collect(),
                )
            },
        )
        .await?;

    let mut response = AvailabilityResponse::empty(
        request.request_id,
        state.config.provider_id.clone(),
    );
    response.free_busy_interval_minutes = granularity;

    let mut timelines = Timelines::new();
    for (attendee, lookup) in lookups {
        match lookup {
            Ok(timeline) => {
                response
                    .attendee_free_busy_details
                    .insert(attendee.clone(), timeline.to_codes());
                timelines.insert(attendee, timeline);
            }
            Err(StoreError::Unresolved(address)) => {
                warn!(
                    target: "gateway.handlers.availability",
                    attendee = %address,
                    "Attendee could not be resolved"
                );
                response.errors.push(ErrorEntry::new(
                    "ResolutionFailed",
                    format!("Could not resolve: {address}"),
                ));
            }
            Err(e) => {
                warn!(
                    target: "gateway.handlers.availability",
                    attendee = %attendee,
                    error = %e,
                    "Free/busy lookup failed"
                );
                response
                    .errors
                    .push(ErrorEntry::new("FreeBusyError", e.to_string()));
            }
        }
    }

    let computation = state.engine.evaluate(&timelines, &slot_request)?;
    record_slot_computation(computation.windows_considered, computation.candidates.len());

    debug!(
        target: "gateway.handlers.availability",
        resolved = timelines.len(),
        windows_considered = computation.windows_considered,
        suggested = computation.candidates.len(),
        "Availability computed"
    );

    response.suggested_slots = computation
        .candidates
        .into_iter()
        .map(MeetingSlot::from)
        .collect();

    Ok(Json(response))
}
