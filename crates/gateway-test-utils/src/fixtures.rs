//! Store fixtures.
//!
//! All fixture times fall in the week of Monday 2025-03-03 (UTC).

use chrono::{DateTime, Duration, TimeZone, Utc};
use gateway_service::store::{
    Appointment, Contact, EmailRecord, Importance, MemoryStore, ResponseStatus,
};
use slot_engine::AvailabilityStatus;
use std::collections::BTreeMap;

pub const OWNER: &str = "owner@example.com";
pub const ALICE: &str = "alice@example.com";
pub const BOB: &str = "bob@example.com";
/// Not in the seeded directory.
pub const GHOST: &str = "ghost@example.com";

/// Monday 2025-03-03 00:00 UTC.
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()
}

/// `monday() + day` days at `hour:minute` UTC.
pub fn at(day: i64, hour: i64, minute: i64) -> DateTime<Utc> {
    monday() + Duration::days(day) + Duration::hours(hour) + Duration::minutes(minute)
}

pub fn appointment(
    id: &str,
    subject: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    show_as: AvailabilityStatus,
) -> Appointment {
    Appointment {
        id: id.to_string(),
        subject: subject.to_string(),
        start,
        end,
        is_all_day: false,
        location: String::new(),
        organizer: OWNER.to_string(),
        required_attendees: Vec::new(),
        optional_attendees: Vec::new(),
        body: String::new(),
        show_as,
        response_status: ResponseStatus::Accepted,
    }
}

pub fn email(id: &str, subject: &str, sender: &str, received_at: DateTime<Utc>) -> EmailRecord {
    EmailRecord {
        id: id.to_string(),
        subject: subject.to_string(),
        sender_name: sender.to_string(),
        sender_email: Some(format!("{}@example.com", sender.to_lowercase())),
        recipients_to: vec![OWNER.to_string()],
        recipients_cc: Vec::new(),
        received_at,
        sent_at: Some(received_at - Duration::minutes(1)),
        body: format!("{subject} (body)"),
        importance: Importance::Normal,
        has_attachments: false,
    }
}

pub fn contact(id: &str, full_name: &str, address: &str, company: &str) -> Contact {
    Contact {
        id: id.to_string(),
        full_name: full_name.to_string(),
        first_name: full_name.split_whitespace().next().map(str::to_string),
        last_name: full_name.split_whitespace().last().map(str::to_string),
        company_name: Some(company.to_string()),
        job_title: None,
        email_addresses: vec![address.to_string()],
        phone_numbers: BTreeMap::new(),
        notes: None,
    }
}

/// A store owned by [`OWNER`] that resolves [`ALICE`] and [`BOB`].
///
/// Monday calendars:
/// - owner: 09:00-10:00 Busy ("Standup"), Wednesday 14:00-15:00 Busy
///   ("Budget review", Room 4)
/// - alice: 10:00-11:00 Tentative
/// - bob: 13:00-14:00 OutOfOffice
///
/// Inbox holds two messages from Monday morning; the address book holds
/// Alice and Bob.
pub fn seeded_store() -> MemoryStore {
    let mut review = appointment(
        "evt-review",
        "Budget review",
        at(2, 14, 0),
        at(2, 15, 0),
        AvailabilityStatus::Busy,
    );
    review.location = "Room 4".to_string();

    MemoryStore::new(OWNER)
        .with_directory_entry(ALICE)
        .with_directory_entry(BOB)
        .with_appointment(
            OWNER,
            appointment(
                "evt-standup",
                "Standup",
                at(0, 9, 0),
                at(0, 10, 0),
                AvailabilityStatus::Busy,
            ),
        )
        .with_appointment(OWNER, review)
        .with_appointment(
            ALICE,
            appointment(
                "evt-alice",
                "Dentist",
                at(0, 10, 0),
                at(0, 11, 0),
                AvailabilityStatus::Tentative,
            ),
        )
        .with_appointment(
            BOB,
            appointment(
                "evt-bob",
                "Offsite",
                at(0, 13, 0),
                at(0, 14, 0),
                AvailabilityStatus::OutOfOffice,
            ),
        )
        .with_email(email("mail-1", "Quarterly budget", "Alice", at(0, 8, 0)))
        .with_email(email("mail-2", "Lunch?", "Bob", at(0, 11, 30)))
        .with_contact(contact("c-alice", "Alice Smith", ALICE, "Contoso"))
        .with_contact(contact("c-bob", "Bob Jones", BOB, "Fabrikam"))
}
