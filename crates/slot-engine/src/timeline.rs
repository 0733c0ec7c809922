//! Fixed-granularity availability timelines.
//!
//! A [`Timeline`] is the free/busy view of one attendee: an ordered sequence
//! of [`AvailabilityStatus`] values, one per interval of `granularity`
//! minutes, anchored at `start`. Index `i` covers
//! `[start + i*G, start + (i+1)*G)`.

use crate::error::SlotError;
use crate::status::AvailabilityStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Timelines keyed by attendee identifier.
pub type Timelines = HashMap<String, Timeline>;

/// Free/busy statuses for a single attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    start: DateTime<Utc>,
    granularity_minutes: u32,
    statuses: Vec<AvailabilityStatus>,
}

impl Timeline {
    /// Create a timeline.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidTimeline` if `granularity_minutes` is zero.
    pub fn new(
        start: DateTime<Utc>,
        granularity_minutes: u32,
        statuses: Vec<AvailabilityStatus>,
    ) -> Result<Self, SlotError> {
        if granularity_minutes == 0 {
            return Err(SlotError::InvalidTimeline(
                "granularity must be at least one minute".to_string(),
            ));
        }

        Ok(Self {
            start,
            granularity_minutes,
            statuses,
        })
    }

    /// Decode a free/busy code string (`"0012..."`), one character per
    /// interval.
    ///
    /// Unrecognised characters decode as `Unknown`.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidTimeline` if `granularity_minutes` is zero.
    pub fn from_codes(
        start: DateTime<Utc>,
        granularity_minutes: u32,
        codes: &str,
    ) -> Result<Self, SlotError> {
        let statuses = codes.chars().map(AvailabilityStatus::from_code).collect();
        Self::new(start, granularity_minutes, statuses)
    }

    /// Encode the statuses as a free/busy code string.
    #[must_use]
    pub fn to_codes(&self) -> String {
        self.statuses.iter().map(|s| s.code()).collect()
    }

    /// Instant the first interval starts at.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Instant the last interval ends at.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.interval_start(self.statuses.len())
    }

    #[must_use]
    pub fn granularity_minutes(&self) -> u32 {
        self.granularity_minutes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    #[must_use]
    pub fn statuses(&self) -> &[AvailabilityStatus] {
        &self.statuses
    }

    /// Status of interval `index`, `None` when the index is past the end.
    #[must_use]
    pub fn status_at(&self, index: usize) -> Option<AvailabilityStatus> {
        self.statuses.get(index).copied()
    }

    /// Start instant of interval `index`.
    #[must_use]
    pub fn interval_start(&self, index: usize) -> DateTime<Utc> {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        let minutes = index.saturating_mul(i64::from(self.granularity_minutes));
        self.start + Duration::minutes(minutes)
    }

    /// Index of the interval that begins exactly at `instant`.
    ///
    /// Returns `None` if `instant` precedes the timeline or does not fall on
    /// an interval boundary.
    #[must_use]
    pub fn index_of(&self, instant: DateTime<Utc>) -> Option<usize> {
        let offset = (instant - self.start).num_seconds();
        let step = i64::from(self.granularity_minutes) * 60;
        if offset < 0 || offset % step != 0 {
            return None;
        }
        usize::try_from(offset / step).ok()
    }

    /// Worst status over the `count` intervals starting at `window_start`.
    ///
    /// Any covered interval without data (before the start, past the end,
    /// off the interval grid, or recorded as `Unknown`) makes the whole
    /// window `Unknown`.
    #[must_use]
    pub fn window_status(&self, window_start: DateTime<Utc>, count: usize) -> AvailabilityStatus {
        let covered = self.index_of(window_start).and_then(|first| {
            let range: Range<usize> = first..first.checked_add(count)?;
            self.statuses.get(range)
        });

        match covered {
            Some(intervals) => AvailabilityStatus::worst_of(intervals.iter().copied()),
            None => AvailabilityStatus::Unknown,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use AvailabilityStatus::{Busy, Free, OutOfOffice, Tentative, Unknown};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_zero_granularity_rejected() {
        let result = Timeline::new(at(0, 0), 0, vec![Free]);
        assert!(matches!(result, Err(SlotError::InvalidTimeline(_))));
    }

    #[test]
    fn test_codes_decode_and_encode() {
        let timeline = Timeline::from_codes(at(0, 0), 30, "0123x").unwrap();
        assert_eq!(
            timeline.statuses(),
            &[Free, Tentative, Busy, OutOfOffice, Unknown]
        );
        assert_eq!(timeline.to_codes(), "0123?");
    }

    #[test]
    fn test_interval_bounds() {
        let timeline = Timeline::from_codes(at(8, 0), 30, "0000").unwrap();
        assert_eq!(timeline.interval_start(0), at(8, 0));
        assert_eq!(timeline.interval_start(3), at(9, 30));
        assert_eq!(timeline.end(), at(10, 0));
    }

    #[test]
    fn test_index_of_requires_grid_alignment() {
        let timeline = Timeline::from_codes(at(8, 0), 30, "0000").unwrap();
        assert_eq!(timeline.index_of(at(8, 0)), Some(0));
        assert_eq!(timeline.index_of(at(9, 0)), Some(2));
        assert_eq!(timeline.index_of(at(8, 15)), None);
        assert_eq!(timeline.index_of(at(7, 30)), None);
    }

    #[test]
    fn test_window_status_takes_worst_covered_interval() {
        let timeline = Timeline::from_codes(at(8, 0), 30, "0102").unwrap();
        assert_eq!(timeline.window_status(at(8, 0), 1), Free);
        assert_eq!(timeline.window_status(at(8, 0), 2), Tentative);
        assert_eq!(timeline.window_status(at(8, 30), 3), Busy);
    }

    #[test]
    fn test_window_status_past_end_is_unknown() {
        let timeline = Timeline::from_codes(at(8, 0), 30, "000").unwrap();
        assert_eq!(timeline.window_status(at(9, 0), 1), Free);
        assert_eq!(timeline.window_status(at(9, 0), 2), Unknown);
        assert_eq!(timeline.window_status(at(10, 0), 1), Unknown);
    }

    #[test]
    fn test_window_status_before_start_is_unknown() {
        let timeline = Timeline::from_codes(at(8, 0), 30, "000").unwrap();
        assert_eq!(timeline.window_status(at(7, 30), 2), Unknown);
    }
}
