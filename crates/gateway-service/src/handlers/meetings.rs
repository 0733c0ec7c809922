//! Meeting creation handler.

use crate::errors::GatewayError;
use crate::handlers::parse_body;
use crate::models::{CreateMeetingRequest, CreateMeetingResponse};
use crate::routes::AppState;
use crate::store::OwnerStore;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{info, instrument};

/// Handler for POST /mcp/createMeeting
///
/// Books the meeting in the owner's calendar and, when `send_invitations`
/// is set, sends it to the resolved attendees.
///
/// # Response
///
/// - 200 OK: `success`, or `partial_success` when some attendees could not
///   be resolved
/// - 400 Bad Request: Malformed body, or `failure` body when meeting details
///   are missing or the meeting ends before it starts
/// - 500 Internal Server Error: The store rejected the booking
/// - 503 Service Unavailable: No owner context bound
/// - 504 Gateway Timeout: Owner did not respond in time (the booking may
///   still complete)
#[instrument(
    skip_all,
    name = "gateway.meetings.create",
    fields(request_id = tracing::field::Empty)
)]
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateMeetingResponse>), GatewayError> {
    let request: CreateMeetingRequest = parse_body(&body)?;
    tracing::Span::current().record("request_id", request.request_id.as_str());
    let provider_id = state.config.provider_id.clone();

    let Some(details) = request.meeting_details else {
        return Ok(input_error(
            request.request_id,
            provider_id,
            "Meeting details are required.",
        ));
    };

    if details.end_time_utc < details.start_time_utc {
        return Ok(input_error(
            request.request_id,
            provider_id,
            "Meeting end time must not be before its start time.",
        ));
    }

    let meeting = details.into_new_meeting(request.send_invitations);
    let booked = state
        .dispatcher
        .submit_with_deadline(
            "create_meeting",
            state.config.dispatch_timeout,
            move |store: &mut OwnerStore| store.create_meeting(meeting),
        )
        .await?;

    info!(
        target: "gateway.handlers.meetings",
        meeting_id = %booked.meeting_id,
        unresolved = booked.unresolved.len(),
        invitations_sent = booked.invitations_sent,
        "Meeting created"
    );

    Ok((
        StatusCode::OK,
        Json(CreateMeetingResponse::from_booking(
            request.request_id,
            provider_id,
            booked,
        )),
    ))
}

fn input_error(
    request_id: String,
    provider_id: String,
    message: &str,
) -> (StatusCode, Json<CreateMeetingResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(CreateMeetingResponse::input_error(
            request_id,
            provider_id,
            message,
        )),
    )
}
