//! Context handler.
//!
//! `POST /mcp/getContext` searches the owner's inbox, calendar and address
//! book in one owner round trip. A failing search for one item type is
//! reported in `errors` and does not fail the others.

use crate::errors::GatewayError;
use crate::handlers::parse_body;
use crate::models::{
    ContextItem, ContextRequest, ContextResponse, ContextType, ErrorEntry,
    DEFAULT_CALENDAR_WINDOW_DAYS,
};
use crate::routes::AppState;
use crate::store::{Appointment, Contact, EmailRecord, OwnerStore, SearchQuery, StoreError};
use axum::{body::Bytes, extract::State, Json};
use chrono::{Duration, Utc};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Everything one context query reads on the owner.
struct ContextLookup {
    owner: String,
    emails: Option<Result<Vec<EmailRecord>, StoreError>>,
    calendar: Option<Result<Vec<Appointment>, StoreError>>,
    contacts: Option<Result<Vec<Contact>, StoreError>>,
}

/// Handler for POST /mcp/getContext
///
/// # Response
///
/// - 200 OK: Items found (possibly none), with per-type errors
/// - 400 Bad Request: Malformed body
/// - 503 Service Unavailable: No owner context bound
/// - 504 Gateway Timeout: Owner did not respond in time
#[instrument(
    skip_all,
    name = "gateway.context.get",
    fields(request_id = tracing::field::Empty)
)]
pub async fn get_context(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ContextResponse>, GatewayError> {
    let request: ContextRequest = parse_body(&body)?;
    tracing::Span::current().record("request_id", request.request_id.as_str());

    let now = Utc::now();
    let query = SearchQuery {
        text: request.query.clone(),
        start: request.time_range_start,
        end: request.time_range_end,
        limit: request.max_items(),
    };
    let window = Duration::days(DEFAULT_CALENDAR_WINDOW_DAYS);
    let calendar_query = SearchQuery {
        start: Some(request.time_range_start.unwrap_or(now - window)),
        end: Some(request.time_range_end.unwrap_or(now + window)),
        ..query.clone()
    };

    let want_emails = request.wants(ContextType::EmailDocument);
    let want_calendar = request.wants(ContextType::CalendarEvent);
    let want_contacts = request.wants(ContextType::ContactProfile);

    let lookup = state
        .dispatcher
        .submit_with_deadline(
            "get_context",
            state.config.dispatch_timeout,
            move |store: &mut OwnerStore| {
                Ok::<_, Infallible>(ContextLookup {
                    owner: store.current_user().to_string(),
                    emails: want_emails.then(|| store.search_emails(&query)),
                    calendar: want_calendar.then(|| store.search_calendar(&calendar_query)),
                    contacts: want_contacts.then(|| store.search_contacts(&query)),
                })
            },
        )
        .await?;

    let mut items = Vec::new();
    let mut errors = Vec::new();
    let mut counts = Vec::new();

    if let Some(result) = lookup.emails {
        collect(
            result,
            ContextType::EmailDocument,
            "EmailError",
            |email| ContextItem::from_email(email, &lookup.owner, now),
            &mut items,
            &mut errors,
            &mut counts,
        );
    }
    if let Some(result) = lookup.calendar {
        collect(
            result,
            ContextType::CalendarEvent,
            "CalendarError",
            |event| ContextItem::from_appointment(event, &lookup.owner, now),
            &mut items,
            &mut errors,
            &mut counts,
        );
    }
    if let Some(result) = lookup.contacts {
        collect(
            result,
            ContextType::ContactProfile,
            "ContactError",
            |contact| ContextItem::from_contact(contact, &lookup.owner, now),
            &mut items,
            &mut errors,
            &mut counts,
        );
    }

    let summary = (!counts.is_empty()).then(|| {
        format!(
            "Returned {} item(s): {}",
            items.len(),
            counts.join(", ")
        )
    });

    debug!(
        target: "gateway.handlers.context",
        items = items.len(),
        errors = errors.len(),
        "Context query complete"
    );

    Ok(Json(ContextResponse {
        request_id: request.request_id,
        provider_id: state.config.provider_id.clone(),
        context_items: items,
        summary,
        errors,
    }))
}

fn collect<T>(
    result: Result<Vec<T>, StoreError>,
    kind: ContextType,
    error_code: &str,
    to_item: impl Fn(T) -> ContextItem,
    items: &mut Vec<ContextItem>,
    errors: &mut Vec<ErrorEntry>,
    counts: &mut Vec<String>,
) {
    match result {
        Ok(records) => {
            counts.push(format!("{} {}", records.len(), kind.as_str()));
            items.extend(records.into_iter().map(to_item));
        }
        Err(e) => {
            warn!(
                target: "gateway.handlers.context",
                kind = kind.as_str(),
                error = %e,
                "Context search failed"
            );
            errors.push(ErrorEntry::new(error_code, e.to_string()));
        }
    }
}
