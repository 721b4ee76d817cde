//! Calendar source for staleness checks.

use chrono::{NaiveDate, Utc};
use std::fmt::Debug;

/// Supplies "today" for staleness evaluation.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the system time (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to a fixed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
