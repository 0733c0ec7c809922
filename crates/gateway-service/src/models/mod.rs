//! Gateway wire models.
//!
//! Request and response bodies for the `/mcp` endpoints, plus the mapping
//! from store records to context items. Field names are snake_case on the
//! wire; timestamps are RFC 3339 UTC.

use crate::store::{Appointment, BookedMeeting, Contact, EmailRecord, NewMeeting};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slot_engine::{AvailabilityStatus, CandidateSlot, DEFAULT_GRANULARITY_MINUTES};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default cap on items returned per context type.
pub const DEFAULT_MAX_ITEMS_PER_TYPE: usize = 10;

/// Default meeting duration for availability queries.
pub const DEFAULT_MEETING_DURATION_MINUTES: u32 = 60;

/// Default quorum for availability queries.
pub const DEFAULT_MINIMUM_PERCENTAGE_FREE: u8 = 100;

/// Days either side of now searched for calendar events when the request
/// gives no time range.
pub const DEFAULT_CALENDAR_WINDOW_DAYS: i64 = 7;

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

fn default_meeting_duration() -> u32 {
    DEFAULT_MEETING_DURATION_MINUTES
}

fn default_minimum_percentage() -> u8 {
    DEFAULT_MINIMUM_PERCENTAGE_FREE
}

/// One entry of a response's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub message: String,
}

impl ErrorEntry {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// Kind of context item a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    EmailDocument,
    CalendarEvent,
    ContactProfile,
}

impl ContextType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ContextType::EmailDocument => "email_document",
            ContextType::CalendarEvent => "calendar_event",
            ContextType::ContactProfile => "contact_profile",
        }
    }

    /// Parse a filter entry, ignoring ASCII case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [
            ContextType::EmailDocument,
            ContextType::CalendarEvent,
            ContextType::ContactProfile,
        ]
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Body of `POST /mcp/getContext`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextRequest {
    #[serde(default = "new_request_id")]
    pub request_id: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub context_types_filter: Option<Vec<String>>,
    #[serde(default)]
    pub max_items_per_type: Option<usize>,
    #[serde(default)]
    pub time_range_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_range_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_focus_identifier: Option<String>,
    #[serde(default)]
    pub additional_params: BTreeMap<String, String>,
}

impl ContextRequest {
    /// Whether items of `kind` were requested. Without a filter, emails and
    /// calendar events are returned.
    #[must_use]
    pub fn wants(&self, kind: ContextType) -> bool {
        match &self.context_types_filter {
            None => matches!(kind, ContextType::EmailDocument | ContextType::CalendarEvent),
            Some(filter) => filter
                .iter()
                .any(|entry| ContextType::parse(entry) == Some(kind)),
        }
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items_per_type.unwrap_or(DEFAULT_MAX_ITEMS_PER_TYPE)
    }
}

/// Fields shared by all context items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemHeader {
    pub id: String,
    pub source_detail: String,
    pub timestamp_retrieved_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ItemHeader {
    fn new(id: &str, source_detail: String, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            source_detail,
            timestamp_retrieved_utc: retrieved_at,
            relevance_score: None,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailContext {
    #[serde(flatten)]
    pub header: ItemHeader,
    pub subject: String,
    pub sender_name: String,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub recipients_to: Vec<String>,
    #[serde(default)]
    pub recipients_cc: Vec<String>,
    pub date_received_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_sent_utc: Option<DateTime<Utc>>,
    pub body_plain_text: String,
    pub importance: String,
    pub has_attachments: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventContext {
    #[serde(flatten)]
    pub header: ItemHeader,
    pub subject: String,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: DateTime<Utc>,
    pub is_all_day: bool,
    pub location: String,
    pub organizer: String,
    #[serde(default)]
    pub required_attendees: Vec<String>,
    #[serde(default)]
    pub optional_attendees: Vec<String>,
    pub body: String,
    pub response_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactContext {
    #[serde(flatten)]
    pub header: ItemHeader,
    pub full_name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<String>,
    #[serde(default)]
    pub phone_numbers: BTreeMap<String, String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A context item, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContextItem {
    #[serde(rename = "email_document")]
    Email(EmailContext),
    #[serde(rename = "calendar_event")]
    CalendarEvent(CalendarEventContext),
    #[serde(rename = "contact_profile")]
    Contact(ContactContext),
}

impl ContextItem {
    #[must_use]
    pub fn kind(&self) -> ContextType {
        match self {
            ContextItem::Email(_) => ContextType::EmailDocument,
            ContextItem::CalendarEvent(_) => ContextType::CalendarEvent,
            ContextItem::Contact(_) => ContextType::ContactProfile,
        }
    }

    #[must_use]
    pub fn from_email(email: EmailRecord, owner: &str, retrieved_at: DateTime<Utc>) -> Self {
        ContextItem::Email(EmailContext {
            header: ItemHeader::new(&email.id, format!("Mailbox/Inbox/{owner}"), retrieved_at),
            subject: email.subject,
            sender_name: email.sender_name,
            sender_email: email.sender_email,
            recipients_to: email.recipients_to,
            recipients_cc: email.recipients_cc,
            date_received_utc: email.received_at,
            date_sent_utc: email.sent_at,
            body_plain_text: email.body,
            importance: email.importance.as_str().to_string(),
            has_attachments: email.has_attachments,
        })
    }

    #[must_use]
    pub fn from_appointment(event: Appointment, owner: &str, retrieved_at: DateTime<Utc>) -> Self {
        ContextItem::CalendarEvent(CalendarEventContext {
            header: ItemHeader::new(&event.id, format!("Mailbox/Calendar/{owner}"), retrieved_at),
            subject: event.subject,
            start_time_utc: event.start,
            end_time_utc: event.end,
            is_all_day: event.is_all_day,
            location: event.location,
            organizer: event.organizer,
            required_attendees: event.required_attendees,
            optional_attendees: event.optional_attendees,
            body: event.body,
            response_status: event.response_status.as_str().to_string(),
        })
    }

    #[must_use]
    pub fn from_contact(contact: Contact, owner: &str, retrieved_at: DateTime<Utc>) -> Self {
        ContextItem::Contact(ContactContext {
            header: ItemHeader::new(&contact.id, format!("Mailbox/Contacts/{owner}"), retrieved_at),
            full_name: contact.full_name,
            first_name: contact.first_name,
            last_name: contact.last_name,
            company_name: contact.company_name,
            job_title: contact.job_title,
            email_addresses: contact.email_addresses,
            phone_numbers: contact.phone_numbers,
            notes: contact.notes,
        })
    }
}

/// Body returned by `POST /mcp/getContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    pub request_id: String,
    pub provider_id: String,
    pub context_items: Vec<ContextItem>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

// ============================================================================
// Availability
// ============================================================================

/// Body of `POST /mcp/getAvailability`.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityRequest {
    #[serde(default = "new_request_id")]
    pub request_id: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub start_date_utc: DateTime<Utc>,
    pub end_date_utc: DateTime<Utc>,
    #[serde(default = "default_meeting_duration")]
    pub meeting_duration_minutes: u32,
    #[serde(default = "default_true")]
    pub working_hours_only: bool,
    #[serde(default = "default_minimum_percentage")]
    pub minimum_percentage_of_attendees_free: u8,
}

/// One suggested meeting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingSlot {
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: DateTime<Utc>,
    pub attendee_availability: BTreeMap<String, AvailabilityStatus>,
    pub all_required_attendees_free: bool,
    pub percentage_free: f64,
}

impl From<CandidateSlot> for MeetingSlot {
    fn from(slot: CandidateSlot) -> Self {
        Self {
            start_time_utc: slot.start,
            end_time_utc: slot.end,
            attendee_availability: slot.attendee_availability,
            all_required_attendees_free: slot.all_required_free,
            percentage_free: slot.percentage_free,
        }
    }
}

/// Body returned by `POST /mcp/getAvailability`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub request_id: String,
    pub provider_id: String,
    pub suggested_slots: Vec<MeetingSlot>,
    /// Raw free/busy code string per resolved attendee.
    pub attendee_free_busy_details: BTreeMap<String, String>,
    /// Interval length the code strings use.
    pub free_busy_interval_minutes: u32,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

impl AvailabilityResponse {
    #[must_use]
    pub fn empty(request_id: String, provider_id: String) -> Self {
        Self {
            request_id,
            provider_id,
            suggested_slots: Vec::new(),
            attendee_free_busy_details: BTreeMap::new(),
            free_busy_interval_minutes: DEFAULT_GRANULARITY_MINUTES,
            errors: Vec::new(),
        }
    }
}

// ============================================================================
// Create meeting
// ============================================================================

/// Meeting fields of a create request. Uses the calendar event shape; item
/// header fields, `organizer` and `response_status` are ignored if sent.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingDetails {
    #[serde(default)]
    pub subject: String,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub required_attendees: Vec<String>,
    #[serde(default)]
    pub optional_attendees: Vec<String>,
}

impl MeetingDetails {
    #[must_use]
    pub fn into_new_meeting(self, send_invitations: bool) -> NewMeeting {
        NewMeeting {
            subject: self.subject,
            start: self.start_time_utc,
            end: self.end_time_utc,
            is_all_day: self.is_all_day,
            location: self.location,
            body: self.body,
            required_attendees: self.required_attendees,
            optional_attendees: self.optional_attendees,
            send_invitations,
        }
    }
}

/// Body of `POST /mcp/createMeeting`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMeetingRequest {
    #[serde(default = "new_request_id")]
    pub request_id: String,
    #[serde(default)]
    pub meeting_details: Option<MeetingDetails>,
    #[serde(default = "default_true")]
    pub send_invitations: bool,
}

/// Outcome of a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Success,
    PartialSuccess,
    Failure,
}

/// Body returned by `POST /mcp/createMeeting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMeetingResponse {
    pub request_id: String,
    pub provider_id: String,
    pub status: MeetingStatus,
    #[serde(default)]
    pub meeting_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

impl CreateMeetingResponse {
    /// Response for a request rejected before reaching the owner.
    #[must_use]
    pub fn input_error(request_id: String, provider_id: String, message: &str) -> Self {
        Self {
            request_id,
            provider_id,
            status: MeetingStatus::Failure,
            meeting_id: None,
            message: Some(message.to_string()),
            errors: vec![ErrorEntry::new("InputError", message)],
        }
    }

    #[must_use]
    pub fn from_booking(request_id: String, provider_id: String, booked: BookedMeeting) -> Self {
        let errors: Vec<ErrorEntry> = booked
            .unresolved
            .iter()
            .map(|address| {
                ErrorEntry::new("UnresolvedRecipient", format!("Could not resolve: {address}"))
            })
            .collect();
        let status = if errors.is_empty() {
            MeetingStatus::Success
        } else {
            MeetingStatus::PartialSuccess
        };
        let message = if booked.invitations_sent {
            "Meeting invitation sent."
        } else {
            "Meeting saved to calendar."
        };

        Self {
            request_id,
            provider_id,
            status,
            meeting_id: Some(booked.meeting_id),
            message: Some(message.to_string()),
            errors,
        }
    }
}

// ============================================================================
// Health
// ============================================================================

/// Body returned by `GET /mcp/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "OK" while the process serves requests.
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub owner_bound: bool,
    pub dispatcher_state: &'static str,
    pub queue_depth: usize,
}
