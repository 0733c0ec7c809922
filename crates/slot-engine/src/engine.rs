//! Sliding-window slot computation.
//!
//! [`SlotEngine`] holds the policies that do not change per request (the
//! timeline granularity, the working-day definition and the longest accepted
//! range) and evaluates a [`SlotRequest`] against a snapshot of [`Timelines`].

use crate::error::SlotError;
use crate::request::SlotRequest;
use crate::status::AvailabilityStatus;
use crate::timeline::Timelines;
use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Default timeline granularity `G`.
pub const DEFAULT_GRANULARITY_MINUTES: u32 = 30;

/// Default longest `[from, to)` range, in days.
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 62;

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// A working day: weekdays between two local hours in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    offset: FixedOffset,
    start_hour: u32,
    end_hour: u32,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl WorkingHours {
    /// Create a working-day definition.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidRequest` unless
    /// `start_hour < end_hour <= 24`.
    pub fn new(offset: FixedOffset, start_hour: u32, end_hour: u32) -> Result<Self, SlotError> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(SlotError::InvalidRequest(format!(
                "working hours {start_hour}-{end_hour} are not a valid day range"
            )));
        }

        Ok(Self {
            offset,
            start_hour,
            end_hour,
        })
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    #[must_use]
    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    #[must_use]
    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    /// Whether `[start, end)` lies inside a single working day.
    ///
    /// The local start must be on a weekday at or after the start hour, and
    /// the local end must fall on the same calendar day at or before the end
    /// hour. An end of exactly midnight belongs to the day it closes.
    #[must_use]
    pub fn admits(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let local_start = start.with_timezone(&self.offset);
        let local_end = end.with_timezone(&self.offset);

        if matches!(local_start.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let start_date = local_start.date_naive();
        let end_date = local_end.date_naive();
        let end_seconds = if end_date == start_date {
            local_end.num_seconds_from_midnight()
        } else if Some(end_date) == start_date.succ_opt()
            && local_end.num_seconds_from_midnight() == 0
        {
            SECONDS_PER_DAY
        } else {
            return false;
        };

        local_start.num_seconds_from_midnight() >= self.start_hour * 3600
            && end_seconds <= self.end_hour * 3600
    }
}

/// A window that satisfied the quorum threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start: DateTime<Utc>,
    /// `start` plus the requested duration.
    pub end: DateTime<Utc>,
    /// Worst status per attendee over the covered intervals.
    pub attendee_availability: BTreeMap<String, AvailabilityStatus>,
    /// Stricter than the quorum test: every attendee is Free (100% quorum)
    /// or Free/Tentative (lower quorum). Never true with an Unknown attendee.
    pub all_required_free: bool,
    pub percentage_free: f64,
}

/// Result of one evaluation, with counters for logging and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotComputation {
    pub candidates: Vec<CandidateSlot>,
    /// Windows that reached the attendee check.
    pub windows_considered: usize,
    /// Windows dropped by the working-hours filter.
    pub windows_outside_working_hours: usize,
}

/// Slot computation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEngine {
    granularity_minutes: u32,
    working_hours: WorkingHours,
    max_range_days: u32,
}

impl Default for SlotEngine {
    fn default() -> Self {
        Self {
            granularity_minutes: DEFAULT_GRANULARITY_MINUTES,
            working_hours: WorkingHours::default(),
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }
}

impl SlotEngine {
    /// Create an engine for timelines of the given granularity.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidRequest` if `granularity_minutes` is zero.
    pub fn new(granularity_minutes: u32) -> Result<Self, SlotError> {
        if granularity_minutes == 0 {
            return Err(SlotError::InvalidRequest(
                "granularity must be at least one minute".to_string(),
            ));
        }

        Ok(Self {
            granularity_minutes,
            working_hours: WorkingHours::default(),
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        })
    }

    #[must_use]
    pub fn with_working_hours(mut self, working_hours: WorkingHours) -> Self {
        self.working_hours = working_hours;
        self
    }

    /// Reject requests whose range is longer than `days`.
    #[must_use]
    pub fn with_max_range_days(mut self, days: u32) -> Self {
        self.max_range_days = days;
        self
    }

    #[must_use]
    pub fn max_range_days(&self) -> u32 {
        self.max_range_days
    }

    /// Validate `request` against this engine's limits.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidRequest` if the request parameters are
    /// invalid or the range exceeds [`SlotEngine::max_range_days`].
    pub fn validate(&self, request: &SlotRequest) -> Result<(), SlotError> {
        request.validate()?;
        request.validate_span(Duration::days(i64::from(self.max_range_days)))
    }

    #[must_use]
    pub fn granularity_minutes(&self) -> u32 {
        self.granularity_minutes
    }

    #[must_use]
    pub fn working_hours(&self) -> WorkingHours {
        self.working_hours
    }

    /// Number of intervals a meeting of `duration_minutes` covers, rounded up.
    #[must_use]
    pub fn slots_needed(&self, duration_minutes: u32) -> usize {
        let needed = duration_minutes.div_ceil(self.granularity_minutes);
        usize::try_from(needed).unwrap_or(usize::MAX)
    }

    /// Candidate slots for `request`, in chronological order.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::InvalidRequest` if the request fails
    /// [`SlotEngine::validate`] or a requested attendee's timeline uses a
    /// different granularity.
    pub fn compute_slots(
        &self,
        timelines: &Timelines,
        request: &SlotRequest,
    ) -> Result<Vec<CandidateSlot>, SlotError> {
        self.evaluate(timelines, request)
            .map(|computation| computation.candidates)
    }

    /// Like [`SlotEngine::compute_slots`], also returning window counters.
    ///
    /// # Errors
    ///
    /// See [`SlotEngine::compute_slots`].
    pub fn evaluate(
        &self,
        timelines: &Timelines,
        request: &SlotRequest,
    ) -> Result<SlotComputation, SlotError> {
        self.validate(request)?;

        for attendee in &request.attendees {
            if let Some(timeline) = timelines.get(attendee) {
                if timeline.granularity_minutes() != self.granularity_minutes {
                    return Err(SlotError::InvalidRequest(format!(
                        "timeline for {attendee} uses {} minute intervals, expected {}",
                        timeline.granularity_minutes(),
                        self.granularity_minutes
                    )));
                }
            }
        }

        let step_seconds = i64::from(self.granularity_minutes) * 60;
        let interval_count = (request.to - request.from).num_seconds() / step_seconds;
        let slots_needed = self.slots_needed(request.duration_minutes);
        let window_span = i64::from(request.duration_minutes.div_ceil(self.granularity_minutes));
        let duration = Duration::minutes(i64::from(request.duration_minutes));

        let mut computation = SlotComputation {
            candidates: Vec::new(),
            windows_considered: 0,
            windows_outside_working_hours: 0,
        };

        for index in 0..=(interval_count - window_span) {
            let start = request.from + Duration::seconds(index * step_seconds);
            let end = start + duration;

            if request.working_hours_only && !self.working_hours.admits(start, end) {
                computation.windows_outside_working_hours += 1;
                continue;
            }
            computation.windows_considered += 1;

            let mut attendee_availability = BTreeMap::new();
            let mut available = 0usize;
            for attendee in &request.attendees {
                let status = timelines
                    .get(attendee)
                    .map_or(AvailabilityStatus::Unknown, |timeline| {
                        timeline.window_status(start, slots_needed)
                    });
                if status.is_available() {
                    available += 1;
                }
                attendee_availability.insert(attendee.clone(), status);
            }

            let attendee_count = request.attendees.len();
            if !meets_quorum(available, attendee_count, request.min_percentage_free) {
                continue;
            }

            let all_required_free = if request.min_percentage_free == 100 {
                attendee_availability
                    .values()
                    .all(|status| *status == AvailabilityStatus::Free)
            } else {
                attendee_availability
                    .values()
                    .all(|status| status.is_available())
            };

            computation.candidates.push(CandidateSlot {
                start,
                end,
                attendee_availability,
                all_required_free,
                percentage_free: percentage(available, attendee_count),
            });
        }

        debug!(
            target: "slot_engine",
            attendees = request.attendees.len(),
            slots_needed = slots_needed,
            windows_considered = computation.windows_considered,
            windows_outside_working_hours = computation.windows_outside_working_hours,
            candidates = computation.candidates.len(),
            "Computed candidate slots"
        );

        Ok(computation)
    }
}

/// Compute candidate slots with the default engine (30 minute intervals,
/// 09:00-17:00 UTC working day, ranges up to 62 days).
///
/// # Errors
///
/// See [`SlotEngine::compute_slots`].
pub fn compute_slots(
    timelines: &Timelines,
    request: &SlotRequest,
) -> Result<Vec<CandidateSlot>, SlotError> {
    SlotEngine::default().compute_slots(timelines, request)
}

// Integer comparison so that e.g. 57 of 100 meets a 57% threshold exactly.
fn meets_quorum(available: usize, attendees: usize, threshold: u8) -> bool {
    if attendees == 0 {
        return true;
    }
    available.saturating_mul(100) >= usize::from(threshold).saturating_mul(attendees)
}

#[allow(clippy::cast_precision_loss)]
fn percentage(available: usize, attendees: usize) -> f64 {
    if attendees == 0 {
        return 100.0;
    }
    (available * 100) as f64 / attendees as f64
}
