//! Store configuration.

use facts_core::Frequency;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default filing-lag grace for quarterly data, in days.
pub const DEFAULT_QUARTERLY_GRACE_DAYS: i64 = 100;

/// Default filing-lag grace for annual data, in days.
pub const DEFAULT_ANNUAL_GRACE_DAYS: i64 = 190;

/// Default bound on a single refresh.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default window after a successful refresh during which an entity counts as fresh.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Configuration for [`FactsStore`](crate::FactsStore).
///
/// Deserializable so it can be embedded in a host service's configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Days after a quarter's end before quarterly data counts as stale.
    pub quarterly_grace_days: i64,
    /// Days after a fiscal year's end before annual data counts as stale.
    pub annual_grace_days: i64,
    /// Upper bound on a refresh call to the facts source.
    pub refresh_timeout: Duration,
    /// An entity refreshed this recently is fresh regardless of its fact dates.
    pub refresh_cooldown: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            quarterly_grace_days: DEFAULT_QUARTERLY_GRACE_DAYS,
            annual_grace_days: DEFAULT_ANNUAL_GRACE_DAYS,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quarterly grace window.
    #[must_use]
    pub const fn with_quarterly_grace_days(mut self, days: i64) -> Self {
        self.quarterly_grace_days = days;
        self
    }

    /// Sets the annual grace window.
    #[must_use]
    pub const fn with_annual_grace_days(mut self, days: i64) -> Self {
        self.annual_grace_days = days;
        self
    }

    /// Sets the refresh timeout.
    #[must_use]
    pub const fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Sets the refresh cooldown. `Duration::ZERO` disables it.
    #[must_use]
    pub const fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Returns the grace window for a cadence, in days.
    #[must_use]
    pub const fn grace_days(&self, freq: Frequency) -> i64 {
        match freq {
            Frequency::Quarterly => self.quarterly_grace_days,
            Frequency::Annual => self.annual_grace_days,
        }
    }
}
