//! In-memory mailbox store.
//!
//! Holds a directory of known addresses, one calendar per address, the
//! owner's inbox and an address book. Lookups are case-insensitive on
//! addresses. Optionally seeded from a JSON file:
//!
//! ```json
//! {
//!   "directory": ["alice@example.com"],
//!   "calendars": { "alice@example.com": [ { "id": "...", "subject": "...",
//!                  "start": "...", "end": "...", "show_as": "Busy" } ] },
//!   "inbox": [],
//!   "contacts": []
//! }
//! ```

use super::{
    Appointment, BookedMeeting, Contact, EmailRecord, MailboxStore, NewMeeting, ResponseStatus,
    SearchQuery, StoreError,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use slot_engine::{AvailabilityStatus, Timeline};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Initial store contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSeed {
    /// Addresses that resolve. Calendar owners resolve implicitly.
    pub directory: Vec<String>,
    pub calendars: BTreeMap<String, Vec<Appointment>>,
    pub inbox: Vec<EmailRecord>,
    pub contacts: Vec<Contact>,
}

/// Mailbox store backed by in-process collections.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    current_user: String,
    directory: BTreeSet<String>,
    calendars: HashMap<String, Vec<Appointment>>,
    inbox: Vec<EmailRecord>,
    contacts: Vec<Contact>,
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

impl MemoryStore {
    /// Empty store. The current user always resolves.
    #[must_use]
    pub fn new(current_user: impl Into<String>) -> Self {
        let current_user = current_user.into();
        let mut directory = BTreeSet::new();
        directory.insert(normalize(&current_user));
        Self {
            current_user,
            directory,
            calendars: HashMap::new(),
            inbox: Vec::new(),
            contacts: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_seed(current_user: impl Into<String>, seed: StoreSeed) -> Self {
        let mut store = Self::new(current_user);
        for address in seed.directory {
            store.directory.insert(normalize(&address));
        }
        for (owner, appointments) in seed.calendars {
            for appointment in appointments {
                store.add_appointment(&owner, appointment);
            }
        }
        store.inbox = seed.inbox;
        store.contacts = seed.contacts;
        store
    }

    /// Build a store from a JSON seed file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Seed` if the file cannot be read or parsed.
    pub fn load(current_user: impl Into<String>, path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
        let seed: StoreSeed = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;

        let store = Self::from_seed(current_user, seed);
        info!(
            target: "gateway.store",
            directory = store.directory.len(),
            calendars = store.calendars.len(),
            inbox = store.inbox.len(),
            contacts = store.contacts.len(),
            "Loaded store seed"
        );
        Ok(store)
    }

    #[must_use]
    pub fn with_directory_entry(mut self, address: &str) -> Self {
        self.directory.insert(normalize(address));
        self
    }

    #[must_use]
    pub fn with_appointment(mut self, owner: &str, appointment: Appointment) -> Self {
        self.add_appointment(owner, appointment);
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: EmailRecord) -> Self {
        self.inbox.push(email);
        self
    }

    #[must_use]
    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    /// Whether `address` is known to the directory.
    #[must_use]
    pub fn resolves(&self, address: &str) -> bool {
        self.directory.contains(&normalize(address))
    }

    /// Calendar entries of `owner`, in insertion order.
    #[must_use]
    pub fn calendar(&self, owner: &str) -> &[Appointment] {
        self.calendars
            .get(&normalize(owner))
            .map_or(&[][..], Vec::as_slice)
    }

    fn add_appointment(&mut self, owner: &str, appointment: Appointment) {
        let key = normalize(owner);
        self.directory.insert(key.clone());
        self.calendars.entry(key).or_default().push(appointment);
    }
}

impl MailboxStore for MemoryStore {
    fn current_user(&self) -> &str {
        &self.current_user
    }

    fn search_emails(&self, query: &SearchQuery) -> Result<Vec<EmailRecord>, StoreError> {
        let mut emails: Vec<EmailRecord> = self
            .inbox
            .iter()
            .filter(|email| query.contains_instant(email.received_at))
            .filter(|email| {
                query.matches_text([
                    email.subject.as_str(),
                    email.body.as_str(),
                    email.sender_name.as_str(),
                    email.sender_email.as_deref().unwrap_or_default(),
                ])
            })
            .cloned()
            .collect();

        emails.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        emails.truncate(query.limit);
        Ok(emails)
    }

    fn search_calendar(&self, query: &SearchQuery) -> Result<Vec<Appointment>, StoreError> {
        let mut events: Vec<Appointment> = self
            .calendar(&self.current_user)
            .iter()
            .filter(|event| query.contains_instant(event.start))
            .filter(|event| query.matches_text([event.subject.as_str(), event.location.as_str()]))
            .cloned()
            .collect();

        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        events.truncate(query.limit);
        Ok(events)
    }

    fn search_contacts(&self, query: &SearchQuery) -> Result<Vec<Contact>, StoreError> {
        let mut contacts: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|contact| {
                let fields = [
                    contact.full_name.as_str(),
                    contact.company_name.as_deref().unwrap_or_default(),
                ]
                .into_iter()
                .chain(contact.email_addresses.iter().map(String::as_str));
                query.matches_text(fields)
            })
            .cloned()
            .collect();

        contacts.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));
        contacts.truncate(query.limit);
        Ok(contacts)
    }

    fn free_busy(
        &self,
        attendee: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity_minutes: u32,
    ) -> Result<Timeline, StoreError> {
        let key = normalize(attendee);
        if !self.directory.contains(&key) {
            return Err(StoreError::Unresolved(attendee.to_string()));
        }
        if end < start {
            return Err(StoreError::InvalidRange(format!(
                "free/busy range ends at {end} before it starts at {start}"
            )));
        }
        if granularity_minutes == 0 {
            return Err(StoreError::FreeBusy {
                attendee: attendee.to_string(),
                reason: "granularity must be at least one minute".to_string(),
            });
        }

        let step = Duration::minutes(i64::from(granularity_minutes));
        let span_seconds = (end - start).num_seconds();
        let step_seconds = step.num_seconds();
        let intervals = (span_seconds + step_seconds - 1) / step_seconds;

        let appointments = self.calendars.get(&key).map_or(&[][..], Vec::as_slice);
        let statuses = (0..intervals)
            .map(|index| {
                let interval_start = start + Duration::seconds(index * step_seconds);
                let interval_end = interval_start + step;
                appointments
                    .iter()
                    .filter(|a| a.response_status != ResponseStatus::Declined)
                    .filter(|a| a.overlaps(interval_start, interval_end))
                    .map(|a| a.show_as)
                    .fold(AvailabilityStatus::Free, AvailabilityStatus::worst)
            })
            .collect();

        let timeline =
            Timeline::new(start, granularity_minutes, statuses).map_err(|e| StoreError::FreeBusy {
                attendee: attendee.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            target: "gateway.store",
            intervals = timeline.len(),
            appointments = appointments.len(),
            "Computed free/busy"
        );

        Ok(timeline)
    }

    fn create_meeting(&mut self, meeting: NewMeeting) -> Result<BookedMeeting, StoreError> {
        if meeting.end < meeting.start {
            return Err(StoreError::InvalidRange(format!(
                "meeting ends at {} before it starts at {}",
                meeting.end, meeting.start
            )));
        }

        let meeting_id = Uuid::new_v4().to_string();
        let organizer = self.current_user.clone();

        let mut unresolved = Vec::new();
        let mut resolved = Vec::new();
        for attendee in meeting
            .required_attendees
            .iter()
            .chain(meeting.optional_attendees.iter())
        {
            if self.resolves(attendee) {
                resolved.push(attendee.clone());
            } else {
                unresolved.push(attendee.clone());
            }
        }

        let appointment = Appointment {
            id: meeting_id.clone(),
            subject: meeting.subject,
            start: meeting.start,
            end: meeting.end,
            is_all_day: meeting.is_all_day,
            location: meeting.location,
            organizer: organizer.clone(),
            required_attendees: meeting.required_attendees,
            optional_attendees: meeting.optional_attendees,
            body: meeting.body,
            show_as: AvailabilityStatus::Busy,
            response_status: ResponseStatus::Organized,
        };

        if meeting.send_invitations {
            for attendee in &resolved {
                if normalize(attendee) == normalize(&organizer) {
                    continue;
                }
                let invitation = Appointment {
                    show_as: AvailabilityStatus::Tentative,
                    response_status: ResponseStatus::NotResponded,
                    ..appointment.clone()
                };
                self.add_appointment(attendee, invitation);
            }
        }
        self.add_appointment(&organizer, appointment);

        debug!(
            target: "gateway.store",
            resolved = resolved.len(),
            unresolved = unresolved.len(),
            invitations_sent = meeting.send_invitations,
            "Booked meeting"
        );

        Ok(BookedMeeting {
            meeting_id,
            unresolved,
            invitations_sent: meeting.send_invitations,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::store::Importance;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).unwrap()
    }

    fn appointment(
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        show_as: AvailabilityStatus,
    ) -> Appointment {
        Appointment {
            id: id.to_string(),
            subject: format!("Appointment {id}"),
            start,
            end,
            is_all_day: false,
            location: String::new(),
            organizer: "owner@example.com".to_string(),
            required_attendees: Vec::new(),
            optional_attendees: Vec::new(),
            body: String::new(),
            show_as,
            response_status: ResponseStatus::Accepted,
        }
    }

    fn email(id: &str, subject: &str, received_at: DateTime<Utc>) -> EmailRecord {
        EmailRecord {
            id: id.to_string(),
            subject: subject.to_string(),
            sender_name: "Bob".to_string(),
            sender_email: Some("bob@example.com".to_string()),
            recipients_to: vec!["owner@example.com".to_string()],
            recipients_cc: Vec::new(),
            received_at,
            sent_at: None,
            body: String::new(),
            importance: Importance::Normal,
            has_attachments: false,
        }
    }

    fn query(limit: usize) -> SearchQuery {
        SearchQuery {
            limit,
            ..SearchQuery::default()
        }
    }

    #[test]
    fn test_free_busy_unresolved_attendee() {
        let store = MemoryStore::new("owner@example.com");
        let err = store
            .free_busy("ghost@example.com", at(0, 0), at(2, 0), 30)
            .unwrap_err();
        assert!(matches!(err, StoreError::Unresolved(a) if a == "ghost@example.com"));
    }

    #[test]
    fn test_free_busy_worst_overlapping_status() {
        let store = MemoryStore::new("owner@example.com")
            .with_appointment(
                "Alice@Example.com",
                appointment("a", at(0, 30), at(1, 30), AvailabilityStatus::Tentative),
            )
            .with_appointment(
                "alice@example.com",
                appointment("b", at(1, 0), at(1, 30), AvailabilityStatus::Busy),
            )
            .with_appointment(
                "alice@example.com",
                appointment("c", at(2, 45), at(3, 0), AvailabilityStatus::OutOfOffice),
            );

        let timeline = store
            .free_busy("ALICE@example.com", at(0, 0), at(3, 0), 30)
            .unwrap();
        assert_eq!(timeline.start(), at(0, 0));
        assert_eq!(timeline.to_codes(), "012003");
    }

    #[test]
    fn test_free_busy_rounds_partial_interval_up() {
        let store = MemoryStore::new("owner@example.com");
        let timeline = store
            .free_busy("owner@example.com", at(0, 0), at(1, 10), 30)
            .unwrap();
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_free_busy_ignores_declined() {
        let mut declined = appointment("d", at(0, 0), at(1, 0), AvailabilityStatus::Busy);
        declined.response_status = ResponseStatus::Declined;
        let store =
            MemoryStore::new("owner@example.com").with_appointment("owner@example.com", declined);

        let timeline = store
            .free_busy("owner@example.com", at(0, 0), at(1, 0), 30)
            .unwrap();
        assert_eq!(timeline.to_codes(), "00");
    }

    #[test]
    fn test_free_busy_inverted_range() {
        let store = MemoryStore::new("owner@example.com");
        let err = store
            .free_busy("owner@example.com", at(2, 0), at(1, 0), 30)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange(_)));
    }

    #[test]
    fn test_search_emails_newest_first_with_limit() {
        let store = MemoryStore::new("owner@example.com")
            .with_email(email("e1", "Budget draft", at(8, 0)))
            .with_email(email("e2", "Lunch", at(9, 0)))
            .with_email(email("e3", "Budget final", at(10, 0)));

        let all = store.search_emails(&query(10)).unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["e3", "e2", "e1"]);

        let budget = store
            .search_emails(&SearchQuery {
                text: Some("budget".to_string()),
                limit: 1,
                ..SearchQuery::default()
            })
            .unwrap();
        assert_eq!(budget.len(), 1);
        assert_eq!(budget[0].id, "e3");
    }

    #[test]
    fn test_search_calendar_by_start_within_range() {
        let store = MemoryStore::new("owner@example.com")
            .with_appointment(
                "owner@example.com",
                appointment("late", at(15, 0), at(16, 0), AvailabilityStatus::Busy),
            )
            .with_appointment(
                "owner@example.com",
                appointment("early", at(9, 0), at(10, 0), AvailabilityStatus::Busy),
            )
            .with_appointment(
                "owner@example.com",
                appointment("outside", at(20, 0), at(21, 0), AvailabilityStatus::Busy),
            )
            .with_appointment(
                "someone@example.com",
                appointment("other", at(11, 0), at(12, 0), AvailabilityStatus::Busy),
            );

        let events = store
            .search_calendar(&SearchQuery {
                start: Some(at(8, 0)),
                end: Some(at(18, 0)),
                limit: 10,
                ..SearchQuery::default()
            })
            .unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["early", "late"]);
    }

    #[test]
    fn test_search_contacts_matches_email_and_company() {
        let contact = Contact {
            id: "c1".to_string(),
            full_name: "Carol Diaz".to_string(),
            first_name: Some("Carol".to_string()),
            last_name: Some("Diaz".to_string()),
            company_name: Some("Contoso".to_string()),
            job_title: None,
            email_addresses: vec!["carol@contoso.example".to_string()],
            phone_numbers: BTreeMap::new(),
            notes: None,
        };
        let store = MemoryStore::new("owner@example.com").with_contact(contact);

        for text in ["carol", "CONTOSO", "contoso.example"] {
            let found = store
                .search_contacts(&SearchQuery {
                    text: Some(text.to_string()),
                    limit: 10,
                    ..SearchQuery::default()
                })
                .unwrap();
            assert_eq!(found.len(), 1, "query {text}");
        }
        let none = store
            .search_contacts(&SearchQuery {
                text: Some("fabrikam".to_string()),
                limit: 10,
                ..SearchQuery::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_create_meeting_books_organizer_and_invitees() {
        let mut store =
            MemoryStore::new("owner@example.com").with_directory_entry("alice@example.com");

        let booked = store
            .create_meeting(NewMeeting {
                subject: "Planning".to_string(),
                start: at(10, 0),
                end: at(11, 0),
                is_all_day: false,
                location: "Room 1".to_string(),
                body: String::new(),
                required_attendees: vec!["alice@example.com".to_string()],
                optional_attendees: vec!["ghost@example.com".to_string()],
                send_invitations: true,
            })
            .unwrap();

        assert_eq!(booked.unresolved, vec!["ghost@example.com".to_string()]);
        assert!(booked.invitations_sent);

        let organizer = store.calendar("owner@example.com");
        assert_eq!(organizer.len(), 1);
        assert_eq!(organizer[0].id, booked.meeting_id);
        assert_eq!(organizer[0].show_as, AvailabilityStatus::Busy);
        assert_eq!(organizer[0].response_status, ResponseStatus::Organized);

        let invitee = store.calendar("alice@example.com");
        assert_eq!(invitee.len(), 1);
        assert_eq!(invitee[0].show_as, AvailabilityStatus::Tentative);

        let timeline = store
            .free_busy("alice@example.com", at(10, 0), at(11, 0), 30)
            .unwrap();
        assert_eq!(timeline.to_codes(), "11");
    }

    #[test]
    fn test_create_meeting_without_invitations_only_books_organizer() {
        let mut store =
            MemoryStore::new("owner@example.com").with_directory_entry("alice@example.com");

        let booked = store
            .create_meeting(NewMeeting {
                subject: "Focus".to_string(),
                start: at(10, 0),
                end: at(11, 0),
                is_all_day: false,
                location: String::new(),
                body: String::new(),
                required_attendees: vec!["alice@example.com".to_string()],
                optional_attendees: Vec::new(),
                send_invitations: false,
            })
            .unwrap();

        assert!(booked.unresolved.is_empty());
        assert!(!booked.invitations_sent);
        assert_eq!(store.calendar("owner@example.com").len(), 1);
        assert!(store.calendar("alice@example.com").is_empty());
    }

    #[test]
    fn test_seed_parsing() {
        let seed: StoreSeed = serde_json::from_str(
            r#"{
                "directory": ["Bob@Example.com"],
                "calendars": {
                    "alice@example.com": [
                        {
                            "id": "a1",
                            "subject": "Offsite",
                            "start": "2025-03-03T00:00:00Z",
                            "end": "2025-03-03T01:00:00Z",
                            "show_as": "OutOfOffice"
                        }
                    ]
                }
            }"#,
        )
        .unwrap();

        let store = MemoryStore::from_seed("owner@example.com", seed);
        assert!(store.resolves("bob@example.com"));
        assert!(store.resolves("alice@example.com"));
        assert!(store.resolves("owner@example.com"));
        assert!(!store.resolves("carol@example.com"));

        let timeline = store
            .free_busy("alice@example.com", at(0, 0), at(1, 0), 30)
            .unwrap();
        assert_eq!(timeline.to_codes(), "33");
    }

    #[test]
    fn test_load_missing_file_is_seed_error() {
        let err = MemoryStore::load("owner@example.com", Path::new("/nonexistent/seed.json"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Seed(_)));
    }
}
