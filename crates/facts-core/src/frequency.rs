//! Reporting cadence and period definitions.
//!
//! This module defines [`Frequency`] for the cadence class a query asks for,
//! [`PeriodType`] for how a fact's period is measured, and [`PeriodQuery`] for
//! selecting a period within a timeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FactsError;

/// Reporting cadence of a fundamental series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Quarterly data (10-Q cadence).
    #[default]
    Quarterly,
    /// Annual data (10-K cadence).
    Annual,
}

impl Frequency {
    /// Returns the short code used by query strings (`"Q"` or `"A"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Quarterly => "Q",
            Self::Annual => "A",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Frequency {
    type Err = FactsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q" | "QUARTERLY" | "10-Q" => Ok(Self::Quarterly),
            "A" | "FY" | "Y" | "ANNUAL" | "10-K" => Ok(Self::Annual),
            other => Err(FactsError::InvalidParameter(format!(
                "unknown frequency: {other}"
            ))),
        }
    }
}

/// How a fact's period is measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodType {
    /// A balance as of a single date (e.g. total assets).
    Instant,
    /// A flow accumulated between two dates (e.g. revenue).
    Duration,
}

/// Which period of a timeline a query selects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodQuery {
    /// The fact with the greatest end date.
    #[default]
    Latest,
    /// The fact carrying exactly this period label (e.g. `"2024-Q3"`).
    Label(String),
}

impl PeriodQuery {
    /// Creates a query for an exact period label.
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }
}

impl fmt::Display for PeriodQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl FromStr for PeriodQuery {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            Ok(Self::Latest)
        } else {
            Ok(Self::Label(s.to_string()))
        }
    }
}

impl From<&str> for PeriodQuery {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(query) => query,
            Err(never) => match never {},
        }
    }
}

/// Quality flag on an instant fact that is a fiscal year-end balance.
///
/// Instants are labeled by calendar quarter, so the label alone cannot say
/// whether a balance closes a fiscal year.
pub const FISCAL_YEAR_END_FLAG: &str = "fiscal_year_end";

/// Returns true if a period label names a fiscal quarter (e.g. `2025-Q2`).
#[must_use]
pub fn is_quarter_label(label: &str) -> bool {
    label
        .rsplit('-')
        .next()
        .and_then(|tail| tail.strip_prefix('Q'))
        .is_some_and(|q| matches!(q, "1" | "2" | "3" | "4"))
}
