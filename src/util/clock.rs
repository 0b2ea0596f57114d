//! Wall-clock access and minute arithmetic used by the scheduling strategies.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward for negative deltas).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Jump to an absolute time.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Truncate a timestamp to the start of its minute.
#[must_use]
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    let minute_start = at.timestamp().div_euclid(60) * 60;
    DateTime::from_timestamp(minute_start, 0).unwrap_or(at)
}

/// Signed time remaining until `due`; negative once `due` has passed.
#[must_use]
pub fn remaining(due: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    due - now
}

/// Non-negative delay until `due`. Overdue timestamps yield zero.
#[must_use]
pub fn delay_until(due: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    remaining(due, now).to_std().unwrap_or(Duration::ZERO)
}
