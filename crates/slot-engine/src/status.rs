//! Severity-ordered availability status.
//!
//! The four known statuses form a strict total order:
//!
//! ```text
//! Free < Tentative < Busy < OutOfOffice
//! ```
//!
//! `Unknown` means "no data for this interval". It sits outside the order:
//! [`PartialOrd`] returns `None` whenever exactly one side is `Unknown`, and
//! collapsing a set of statuses yields `Unknown` only because it is assigned
//! explicitly, never because it compares as the maximum or minimum.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Availability of one attendee over one interval (or one window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    Free,
    Tentative,
    Busy,
    OutOfOffice,
    /// No data available for the interval.
    Unknown,
}

impl AvailabilityStatus {
    /// Rank within the severity order, `None` for `Unknown`.
    #[must_use]
    pub const fn severity(self) -> Option<u8> {
        match self {
            AvailabilityStatus::Free => Some(0),
            AvailabilityStatus::Tentative => Some(1),
            AvailabilityStatus::Busy => Some(2),
            AvailabilityStatus::OutOfOffice => Some(3),
            AvailabilityStatus::Unknown => None,
        }
    }

    /// Whether this status carries data.
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.severity().is_some()
    }

    /// Whether an attendee with this status counts toward the quorum.
    ///
    /// `Tentative` counts as available; `Busy`, `OutOfOffice` and `Unknown`
    /// do not.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(
            self,
            AvailabilityStatus::Free | AvailabilityStatus::Tentative
        )
    }

    /// The more severe of two statuses.
    ///
    /// If either side is `Unknown` the result is `Unknown`: a window with a
    /// gap in its data cannot be summarised from partial coverage.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => {
                if b > a {
                    other
                } else {
                    self
                }
            }
            _ => AvailabilityStatus::Unknown,
        }
    }

    /// Collapse a sequence of interval statuses into one window status.
    ///
    /// Returns `Unknown` for an empty sequence.
    pub fn worst_of<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AvailabilityStatus>,
    {
        let mut iter = statuses.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, AvailabilityStatus::worst),
            None => AvailabilityStatus::Unknown,
        }
    }

    /// Decode a free/busy character (`0`-`3`); anything else is `Unknown`.
    #[must_use]
    pub const fn from_code(code: char) -> Self {
        match code {
            '0' => AvailabilityStatus::Free,
            '1' => AvailabilityStatus::Tentative,
            '2' => AvailabilityStatus::Busy,
            '3' => AvailabilityStatus::OutOfOffice,
            _ => AvailabilityStatus::Unknown,
        }
    }

    /// Encode as a free/busy character. `Unknown` encodes as `?`.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            AvailabilityStatus::Free => '0',
            AvailabilityStatus::Tentative => '1',
            AvailabilityStatus::Busy => '2',
            AvailabilityStatus::OutOfOffice => '3',
            AvailabilityStatus::Unknown => '?',
        }
    }

    /// Returns the status as a string for log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AvailabilityStatus::Free => "free",
            AvailabilityStatus::Tentative => "tentative",
            AvailabilityStatus::Busy => "busy",
            AvailabilityStatus::OutOfOffice => "out_of_office",
            AvailabilityStatus::Unknown => "unknown",
        }
    }
}

impl PartialOrd for AvailabilityStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}
