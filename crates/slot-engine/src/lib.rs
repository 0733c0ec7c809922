//! Availability slot engine.
//!
//! Pure computation over per-attendee free/busy timelines: given a
//! [`SlotRequest`] and one [`Timeline`] per attendee, produce the chronological
//! list of [`CandidateSlot`]s that satisfy the duration, working-hours and
//! quorum constraints.
//!
//! # Algorithm
//!
//! ```text
//! slots_needed = ceil(duration / granularity)
//! for each window of slots_needed intervals inside [from, to):
//!     skip if working_hours_only and window not inside one weekday 09:00-17:00
//!     status(attendee) = worst status over covered intervals (Unknown if any
//!                        covered interval has no data)
//!     admit if 100 * available / attendees >= min_percentage_free
//! ```
//!
//! No I/O and no concurrency: the engine always operates on a snapshot of
//! timelines that has already been fetched.
//!
//! # Modules
//!
//! - [`status`] - Severity-ordered availability status
//! - [`timeline`] - Fixed-granularity per-attendee status sequences
//! - [`request`] - Slot request parameters and validation
//! - [`engine`] - Sliding-window computation and working-hours policy
//! - [`error`] - Error types

#![warn(clippy::pedantic)]

pub mod engine;
pub mod error;
pub mod request;
pub mod status;
pub mod timeline;

pub use engine::{
    compute_slots, CandidateSlot, SlotComputation, SlotEngine, WorkingHours,
    DEFAULT_GRANULARITY_MINUTES, DEFAULT_MAX_RANGE_DAYS,
};
pub use error::SlotError;
pub use request::SlotRequest;
pub use status::AvailabilityStatus;
pub use timeline::{Timeline, Timelines};
