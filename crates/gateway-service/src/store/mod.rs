//! Owner-context mailbox store.
//!
//! [`MailboxStore`] is the resource the dispatcher's owner thread holds. Its
//! methods are only ever called on that thread, so implementations need not
//! be `Send` or `Sync`.
//!
//! # Components
//!
//! - [`MailboxStore`] - Search, free/busy and booking operations
//! - [`MemoryStore`] - In-memory implementation, optionally seeded from JSON
//! - Record types shared between the store and the wire mapping in
//!   `models`

pub mod memory;

pub use memory::{MemoryStore, StoreSeed};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slot_engine::{AvailabilityStatus, Timeline};
use std::collections::BTreeMap;
use thiserror::Error;

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The address is not known to the directory.
    #[error("Could not resolve: {0}")]
    Unresolved(String),

    /// `end` lies before `start`.
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    /// Free/busy data could not be produced for a resolved attendee.
    #[error("Error getting free/busy for {attendee}: {reason}")]
    FreeBusy { attendee: String, reason: String },

    /// The seed file could not be read or parsed.
    #[error("Failed to load store seed: {0}")]
    Seed(String),
}

/// Mail importance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

impl Importance {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Normal => "normal",
            Importance::High => "high",
        }
    }
}

/// The owner's response to an appointment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    None,
    Organized,
    Tentative,
    Accepted,
    Declined,
    NotResponded,
}

impl ResponseStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::None => "none",
            ResponseStatus::Organized => "organized",
            ResponseStatus::Tentative => "tentative",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Declined => "declined",
            ResponseStatus::NotResponded => "notresponded",
        }
    }
}

/// One message in the owner's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub subject: String,
    pub sender_name: String,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub recipients_to: Vec<String>,
    #[serde(default)]
    pub recipients_cc: Vec<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub has_attachments: bool,
}

fn default_show_as() -> AvailabilityStatus {
    AvailabilityStatus::Busy
}

/// One calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub organizer: String,
    #[serde(default)]
    pub required_attendees: Vec<String>,
    #[serde(default)]
    pub optional_attendees: Vec<String>,
    #[serde(default)]
    pub body: String,
    /// How the appointment shows on free/busy.
    #[serde(default = "default_show_as")]
    pub show_as: AvailabilityStatus,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

impl Appointment {
    /// Whether the appointment overlaps `[start, end)`.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// One address book entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
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
    /// Keyed by kind: `business`, `home`, `mobile`.
    #[serde(default)]
    pub phone_numbers: BTreeMap<String, String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filter shared by the search operations.
///
/// `text` is matched case-insensitively as a substring of the record's
/// searchable fields; `start`/`end` bound the record's primary timestamp
/// (inclusive on both ends). `limit` caps the result count after sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl SearchQuery {
    /// Whether any of `fields` contains the query text. An absent or blank
    /// query matches everything.
    #[must_use]
    pub fn matches_text<'a, I>(&self, fields: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(needle) = self
            .text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        else {
            return true;
        };
        let needle = needle.to_lowercase();
        fields
            .into_iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Whether `instant` lies inside the query's time bounds.
    #[must_use]
    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| instant >= start)
            && self.end.map_or(true, |end| instant <= end)
    }
}

/// A meeting to book in the owner's calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMeeting {
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    pub location: String,
    pub body: String,
    pub required_attendees: Vec<String>,
    pub optional_attendees: Vec<String>,
    pub send_invitations: bool,
}

/// Result of [`MailboxStore::create_meeting`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedMeeting {
    pub meeting_id: String,
    /// Attendees the directory did not know, in request order.
    pub unresolved: Vec<String>,
    pub invitations_sent: bool,
}

/// Mailbox, calendar and directory operations bound to the owner context.
pub trait MailboxStore {
    /// Identity of the mailbox owner, used in `source_detail` strings.
    fn current_user(&self) -> &str;

    /// Inbox messages received within the query bounds, newest first.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the in-memory store never fails.
    fn search_emails(&self, query: &SearchQuery) -> Result<Vec<EmailRecord>, StoreError>;

    /// Owner calendar entries starting within the query bounds, by start
    /// ascending.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the in-memory store never fails.
    fn search_calendar(&self, query: &SearchQuery) -> Result<Vec<Appointment>, StoreError>;

    /// Address book entries, by full name.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the in-memory store never fails.
    fn search_contacts(&self, query: &SearchQuery) -> Result<Vec<Contact>, StoreError>;

    /// Free/busy timeline of `attendee` over `[start, end)` at
    /// `granularity_minutes` resolution, anchored at `start`.
    ///
    /// # Errors
    ///
    /// - `Unresolved` if the attendee is not in the directory.
    /// - `InvalidRange` if `end < start`.
    /// - `FreeBusy` if the timeline cannot be built.
    fn free_busy(
        &self,
        attendee: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity_minutes: u32,
    ) -> Result<Timeline, StoreError>;

    /// Book a meeting organized by the current user.
    ///
    /// Unresolvable attendees do not fail the booking; they are reported in
    /// [`BookedMeeting::unresolved`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if the meeting ends before it starts.
    fn create_meeting(&mut self, meeting: NewMeeting) -> Result<BookedMeeting, StoreError>;
}

/// The store as held by the owner thread.
pub type OwnerStore = Box<dyn MailboxStore>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_matches_text_is_case_insensitive_substring() {
        let query = SearchQuery {
            text: Some("Budget".to_string()),
            ..SearchQuery::default()
        };
        assert!(query.matches_text(["Q3 budget review"]));
        assert!(query.matches_text(["nothing", "BUDGETS"]));
        assert!(!query.matches_text(["Q3 review"]));
    }

    #[test]
    fn test_blank_query_matches_everything() {
        let query = SearchQuery {
            text: Some("   ".to_string()),
            ..SearchQuery::default()
        };
        assert!(query.matches_text(["anything"]));
        assert!(SearchQuery::default().matches_text(std::iter::empty()));
    }

    #[test]
    fn test_contains_instant_bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 3, 17, 0, 0).unwrap();
        let query = SearchQuery {
            start: Some(start),
            end: Some(end),
            ..SearchQuery::default()
        };
        assert!(query.contains_instant(start));
        assert!(query.contains_instant(end));
        assert!(!query.contains_instant(start - chrono::Duration::seconds(1)));
        assert!(!query.contains_instant(end + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_appointment_overlap_is_half_open() {
        let nine = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let ten = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        let appointment: Appointment = serde_json::from_value(serde_json::json!({
            "id": "a1",
            "subject": "Standup",
            "start": nine,
            "end": ten,
        }))
        .unwrap();

        assert_eq!(appointment.show_as, AvailabilityStatus::Busy);
        assert!(appointment.overlaps(nine, ten));
        assert!(!appointment.overlaps(ten, ten + chrono::Duration::minutes(30)));
        assert!(!appointment.overlaps(nine - chrono::Duration::minutes(30), nine));
    }

    #[test]
    fn test_response_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ResponseStatus::NotResponded).unwrap(),
            "\"notresponded\""
        );
        assert_eq!(ResponseStatus::Organized.as_str(), "organized");
        assert_eq!(Importance::High.as_str(), "high");
    }
}
