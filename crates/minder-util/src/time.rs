//! Time utilities for minder
//!
//! Enforcement deadlines use monotonic time (immune to wall-clock changes);
//! the usage ledger is keyed by local calendar day and ISO week, which use
//! wall-clock time.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate};
use std::time::{Duration, Instant};

/// Get the current local time.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// The Monday that starts the ISO week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    let offset = day.weekday().num_days_from_monday() as i64;
    day - ChronoDuration::days(offset)
}

/// A point in monotonic time for deadline enforcement.
/// Immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.duration_since(earlier.0)
    }

    /// Returns duration until `self`, or zero if `self` is in the past
    pub fn saturating_duration_until(&self, from: MonotonicInstant) -> Duration {
        if self.0 > from.0 {
            self.0.duration_since(from.0)
        } else {
            Duration::ZERO
        }
    }
}

impl From<Instant> for MonotonicInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}
