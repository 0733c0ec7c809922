//! Slot request parameters.

use crate::error::SlotError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default quorum: every attendee must be available.
pub const DEFAULT_MIN_PERCENTAGE_FREE: u8 = 100;

/// Scheduling constraints for one availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    /// Attendee identifiers, in the order they were requested.
    pub attendees: Vec<String>,
    /// Inclusive range start.
    pub from: DateTime<Utc>,
    /// Exclusive range end.
    pub to: DateTime<Utc>,
    pub duration_minutes: u32,
    pub working_hours_only: bool,
    /// Quorum threshold `P`, a percentage in `0..=100`.
    pub min_percentage_free: u8,
}

impl SlotRequest {
    /// Create a request with no working-hours filter and a 100% quorum.
    ///
    /// Duplicate attendees collapse to their first occurrence.
    #[must_use]
    pub fn new<I, S>(
        attendees: I,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for attendee in attendees {
            let attendee = attendee.into();
            if !unique.contains(&attendee) {
                unique.push(attendee);
            }
        }

        Self {
            attendees: unique,
            from,
            to,
            duration_minutes,
            working_hours_only: false,
            min_percentage_free: DEFAULT_MIN_PERCENTAGE_FREE,
        }
    }

    /// Only admit windows inside one working day.
    #[must_use]
    pub fn working_hours_only(mut self, enabled: bool) -> Self {
        self.working_hours_only = enabled;
        self
    }

    /// Set the quorum threshold.
    #[must_use]
    pub fn min_percentage_free(mut self, percentage: u8) -> Self {
        self.min_percentage_free = percentage;
        self
    }

    /// Check the parameters before any window is computed.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidRequest` when there are no attendees, an
    /// attendee identifier is blank, the duration is zero, the range is
    /// inverted, or the threshold exceeds 100.
    pub fn validate(&self) -> Result<(), SlotError> {
        if self.attendees.is_empty() {
            return Err(SlotError::InvalidRequest(
                "at least one attendee is required".to_string(),
            ));
        }

        if self.attendees.iter().any(|a| a.trim().is_empty()) {
            return Err(SlotError::InvalidRequest(
                "attendee identifiers must not be blank".to_string(),
            ));
        }

        if self.duration_minutes == 0 {
            return Err(SlotError::InvalidRequest(
                "meeting duration must be positive".to_string(),
            ));
        }

        if self.from > self.to {
            return Err(SlotError::InvalidRequest(format!(
                "range start {} is after range end {}",
                self.from.to_rfc3339(),
                self.to.to_rfc3339()
            )));
        }

        if self.min_percentage_free > 100 {
            return Err(SlotError::InvalidRequest(format!(
                "minimum percentage free must be between 0 and 100, got {}",
                self.min_percentage_free
            )));
        }

        Ok(())
    }

    /// Check that `[from, to)` spans at most `max`.
    ///
    /// Window and free/busy interval counts grow linearly with the range.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidRequest` when the range is longer than `max`.
    pub fn validate_span(&self, max: Duration) -> Result<(), SlotError> {
        let span = self.to - self.from;
        if span > max {
            return Err(SlotError::InvalidRequest(format!(
                "range of {} days exceeds the maximum of {} days",
                span.num_days(),
                max.num_days()
            )));
        }

        Ok(())
    }
}
