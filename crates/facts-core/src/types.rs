//! Core data types for identifiers and financial facts.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Ticker`] - Normalized trading symbol
//! - [`Cik`] - Canonical entity identifier (SEC Central Index Key)
//! - [`Mapping`] - Ticker to identifier mapping entry
//! - [`Fact`] - A single reported metric value with provenance
//! - [`Freshness`] and [`Served`] - Freshness signal attached to served data

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FactsError, FetchError};
use crate::frequency::PeriodType;

/// Width of a canonical identifier once zero-padded.
pub const CIK_WIDTH: usize = 10;

/// Segment axis to member mapping of a fact. Empty means consolidated.
pub type Dimensions = BTreeMap<String, String>;

/// A trading symbol/ticker.
///
/// Tickers are trimmed and uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    /// Creates a new ticker, trimming whitespace and converting to uppercase.
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_uppercase())
    }

    /// Returns the ticker as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the normalized ticker is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Canonical entity identifier: a zero-padded, ten digit SEC CIK.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cik(String);

impl Cik {
    /// Normalizes an identifier string.
    ///
    /// Accepts surrounding whitespace, an optional `CIK` prefix and fewer than
    /// ten digits, e.g. `"320193"`, `"CIK0000320193"`.
    ///
    /// # Errors
    /// Returns [`FactsError::InvalidParameter`] if the input is empty, contains
    /// non-digit characters or has more than ten digits.
    pub fn new(s: &str) -> Result<Self, FactsError> {
        let trimmed = s.trim();
        let digits = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("CIK") => &trimmed[3..],
            _ => trimmed,
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FactsError::InvalidParameter(format!(
                "invalid canonical identifier: {s:?}"
            )));
        }
        if digits.len() > CIK_WIDTH {
            return Err(FactsError::InvalidParameter(format!(
                "canonical identifier longer than {CIK_WIDTH} digits: {s:?}"
            )));
        }

        Ok(Self(format!("{digits:0>CIK_WIDTH$}")))
    }

    /// Creates an identifier from its numeric form.
    ///
    /// # Errors
    /// Returns [`FactsError::InvalidParameter`] if the number has more than ten digits.
    pub fn from_number(n: u64) -> Result<Self, FactsError> {
        Self::new(&n.to_string())
    }

    /// Returns the zero-padded identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier without leading zeros, as used in archive URLs.
    #[must_use]
    pub fn unpadded(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() { "0" } else { trimmed }
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cik {
    type Err = FactsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cik {
    type Error = FactsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<Cik> for String {
    fn from(cik: Cik) -> Self {
        cik.0
    }
}

/// A resolved ticker to identifier mapping.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mapping {
    /// Normalized ticker.
    pub ticker: Ticker,
    /// Canonical entity identifier.
    pub canonical_id: Cik,
    /// Registrant name.
    pub company_name: String,
}

impl Mapping {
    /// Creates a new mapping.
    #[must_use]
    pub fn new(ticker: Ticker, canonical_id: Cik, company_name: impl Into<String>) -> Self {
        Self {
            ticker,
            canonical_id,
            company_name: company_name.into(),
        }
    }
}

/// A single reported financial fact with provenance.
///
/// Facts are values: a refresh produces new facts instead of editing stored ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Namespaced concept, e.g. `us-gaap:Revenues`.
    pub concept: String,
    /// Reported value.
    pub value: f64,
    /// Unit of measure, e.g. `USD` or `shares`.
    pub unit: String,
    /// Period label, e.g. `2025-Q2` or `2024-FY`.
    pub period: String,
    /// Whether the value is a balance or a flow.
    pub period_type: PeriodType,
    /// Accession number of the source filing.
    pub accession: String,
    /// Optional pointer into the source document.
    pub fragment_id: Option<String>,
    /// Provenance URL.
    pub url: String,
    /// Segment dimensions; empty for consolidated values.
    pub dimensions: Dimensions,
    /// Advisory quality flags (e.g. `restated`, `amended`).
    pub quality_flags: Vec<String>,
    /// Registrant name.
    pub company_name: String,
    /// Canonical entity identifier.
    pub canonical_id: Cik,
    /// Period start; absent for instant facts.
    pub start_date: Option<NaiveDate>,
    /// Period end (or the instant).
    pub end_date: NaiveDate,
}

impl Fact {
    /// Creates a new fact with required fields.
    #[must_use]
    pub fn new(
        canonical_id: Cik,
        concept: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        period: impl Into<String>,
        period_type: PeriodType,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            concept: concept.into(),
            value,
            unit: unit.into(),
            period: period.into(),
            period_type,
            accession: String::new(),
            fragment_id: None,
            url: String::new(),
            dimensions: Dimensions::new(),
            quality_flags: Vec::new(),
            company_name: String::new(),
            canonical_id,
            start_date: None,
            end_date,
        }
    }

    /// Sets the period start date.
    #[must_use]
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Sets the source accession number.
    #[must_use]
    pub fn with_accession(mut self, accession: impl Into<String>) -> Self {
        self.accession = accession.into();
        self
    }

    /// Sets the fragment pointer into the source document.
    #[must_use]
    pub fn with_fragment_id(mut self, fragment_id: impl Into<String>) -> Self {
        self.fragment_id = Some(fragment_id.into());
        self
    }

    /// Sets the provenance URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Adds a segment dimension.
    #[must_use]
    pub fn with_dimension(mut self, axis: impl Into<String>, member: impl Into<String>) -> Self {
        self.dimensions.insert(axis.into(), member.into());
        self
    }

    /// Replaces all segment dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Adds a quality flag if not already present.
    #[must_use]
    pub fn with_quality_flag(mut self, flag: impl Into<String>) -> Self {
        let flag = flag.into();
        if !self.quality_flags.contains(&flag) {
            self.quality_flags.push(flag);
        }
        self
    }

    /// Sets the registrant name.
    #[must_use]
    pub fn with_company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = company_name.into();
        self
    }

    /// Returns true if the fact is a consolidated (non-segment) value.
    #[must_use]
    pub fn is_consolidated(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Returns true if the fact carries the given quality flag.
    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.quality_flags.iter().any(|f| f == flag)
    }

    /// Number of days covered by a duration fact.
    #[must_use]
    pub fn span_days(&self) -> Option<i64> {
        self.start_date
            .map(|start| self.end_date.signed_duration_since(start).num_days())
    }
}

/// Freshness of data returned by the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Freshness {
    /// Data is within its grace window, or was just refreshed.
    #[default]
    Fresh,
    /// Data is past its grace window and the refresh attempt failed.
    ///
    /// The data is still returned; the error explains why it was not refreshed.
    StaleDataServed(FetchError),
}

impl Freshness {
    /// Returns true if stale data was served.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleDataServed(_))
    }
}

/// Data returned by the store together with its freshness signal.
#[derive(Clone, Debug, PartialEq)]
pub struct Served<T> {
    data: T,
    freshness: Freshness,
}

impl<T> Served<T> {
    /// Wraps fresh data.
    #[must_use]
    pub const fn fresh(data: T) -> Self {
        Self {
            data,
            freshness: Freshness::Fresh,
        }
    }

    /// Wraps data with an explicit freshness signal.
    #[must_use]
    pub const fn new(data: T, freshness: Freshness) -> Self {
        Self { data, freshness }
    }

    /// Returns the served data.
    #[must_use]
    pub const fn data(&self) -> &T {
        &self.data
    }

    /// Returns the freshness signal.
    #[must_use]
    pub const fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    /// Returns true if stale data was served.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.freshness.is_stale()
    }

    /// Consumes the wrapper and returns the data.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Maps the served data, keeping the freshness signal.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served {
            data: f(self.data),
            freshness: self.freshness,
        }
    }
}
