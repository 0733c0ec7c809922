//! Slot engine error types.

use thiserror::Error;

/// Errors raised before the sliding-window computation runs.
///
/// Missing attendee data is NOT an error: an attendee without a timeline is
/// reported as `Unknown` in every window instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Malformed scheduling parameters (no attendees, zero duration,
    /// inverted or over-long range, threshold above 100, granularity
    /// mismatch).
    #[error("Invalid slot request: {0}")]
    InvalidRequest(String),

    /// A timeline could not be constructed.
    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),
}
