//! Per-entity, per-concept fact timelines.
//!
//! A [`Timeline`] holds the facts of one concept for one entity, newest end
//! date first, with at most one fact per (period, dimensions) pair.

use chrono::NaiveDate;
use facts_core::{
    Dimensions, FISCAL_YEAR_END_FLAG, Fact, Frequency, PeriodType, is_quarter_label,
};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Day span of a duration fact that counts as one fiscal quarter.
pub const QUARTER_SPAN_DAYS: RangeInclusive<i64> = 80..=100;

/// Day span of a duration fact that counts as one fiscal year.
pub const YEAR_SPAN_DAYS: RangeInclusive<i64> = 350..=380;

/// Quality flag set on a fact that replaced a different value for the same period.
pub const RESTATED_FLAG: &str = "restated";

/// Quality flag set on computed trailing-twelve-month facts.
pub const TTM_FLAG: &str = "ttm_calculated";

/// Accession placeholder for computed trailing-twelve-month facts.
pub const TTM_ACCESSION: &str = "TTM-CALCULATED";

/// Returns true if a fact belongs to the given reporting cadence.
///
/// Duration facts are classified by their span, or by their period label when
/// no start date is known. Instant facts are quarter-end balances, so every
/// instant matches the quarterly cadence. Annual takes fiscal-year labels and
/// instants flagged [`FISCAL_YEAR_END_FLAG`].
#[must_use]
pub fn matches_cadence(fact: &Fact, freq: Frequency) -> bool {
    match fact.period_type {
        PeriodType::Instant => match freq {
            Frequency::Quarterly => true,
            Frequency::Annual => {
                !is_quarter_label(&fact.period) || fact.has_flag(FISCAL_YEAR_END_FLAG)
            }
        },
        PeriodType::Duration => match fact.span_days() {
            Some(days) => match freq {
                Frequency::Quarterly => QUARTER_SPAN_DAYS.contains(&days),
                Frequency::Annual => YEAR_SPAN_DAYS.contains(&days),
            },
            None => is_quarter_label(&fact.period) == (freq == Frequency::Quarterly),
        },
    }
}

/// Facts for one (entity, concept) pair, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    facts: Vec<Fact>,
}

impl Timeline {
    /// Builds a timeline, keeping one fact per (period, dimensions).
    ///
    /// Later facts replace earlier ones for the same key; a replacement with a
    /// different value is flagged [`RESTATED_FLAG`].
    #[must_use]
    pub fn from_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut slots: HashMap<(String, Dimensions), usize> = HashMap::new();
        let mut kept: Vec<Fact> = Vec::new();

        for fact in facts {
            let key = (fact.period.clone(), fact.dimensions.clone());
            match slots.get(&key) {
                Some(&index) => {
                    let restated = kept[index].value != fact.value;
                    kept[index] = if restated {
                        fact.with_quality_flag(RESTATED_FLAG)
                    } else {
                        fact
                    };
                }
                None => {
                    slots.insert(key, kept.len());
                    kept.push(fact);
                }
            }
        }

        kept.sort_by(|a, b| {
            b.end_date
                .cmp(&a.end_date)
                .then_with(|| a.period.cmp(&b.period))
        });

        Self { facts: kept }
    }

    /// Returns all facts, newest first.
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if the timeline holds no facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Facts of the given cadence and exact dimensions, newest first.
    pub fn matching<'a>(
        &'a self,
        freq: Frequency,
        dimensions: &Dimensions,
    ) -> impl Iterator<Item = &'a Fact> {
        self.facts
            .iter()
            .filter(move |f| &f.dimensions == dimensions && matches_cadence(f, freq))
    }

    /// The matching fact with the greatest end date.
    #[must_use]
    pub fn latest(&self, freq: Frequency, dimensions: &Dimensions) -> Option<&Fact> {
        self.matching(freq, dimensions).next()
    }

    /// The matching fact with exactly this period label. There is no
    /// nearest-period fallback.
    #[must_use]
    pub fn by_period(
        &self,
        period: &str,
        freq: Frequency,
        dimensions: &Dimensions,
    ) -> Option<&Fact> {
        self.matching(freq, dimensions).find(|f| f.period == period)
    }

    /// Up to `limit` matching facts, newest first.
    #[must_use]
    pub fn series(&self, freq: Frequency, dimensions: &Dimensions, limit: usize) -> Vec<Fact> {
        self.matching(freq, dimensions).take(limit).cloned().collect()
    }

    /// Returns true if the newest fact of this cadence ended more than
    /// `grace_days` before `today`, or if there is no such fact.
    #[must_use]
    pub fn is_stale(&self, freq: Frequency, today: NaiveDate, grace_days: i64) -> bool {
        match self.facts.iter().find(|f| matches_cadence(f, freq)) {
            Some(newest) => today.signed_duration_since(newest.end_date).num_days() > grace_days,
            None => true,
        }
    }

    /// Trailing twelve months ending at `anchor`.
    ///
    /// Sums the four most recent quarterly facts (same dimensions) ending on or
    /// before the anchor. Instant facts are returned unchanged; fewer than four
    /// quarters yields `None`.
    #[must_use]
    pub fn ttm(&self, anchor: &Fact) -> Option<Fact> {
        if anchor.period_type == PeriodType::Instant {
            return Some(anchor.clone());
        }

        let quarters: Vec<&Fact> = self
            .matching(Frequency::Quarterly, &anchor.dimensions)
            .filter(|f| f.period_type == PeriodType::Duration && f.end_date <= anchor.end_date)
            .take(4)
            .collect();
        if quarters.len() < 4 {
            return None;
        }

        let newest = quarters[0];
        let total: f64 = quarters.iter().map(|f| f.value).sum();
        let mut fact = Fact::new(
            newest.canonical_id.clone(),
            newest.concept.clone(),
            total,
            newest.unit.clone(),
            format!("TTM-{}", anchor.period),
            PeriodType::Duration,
            newest.end_date,
        )
        .with_accession(TTM_ACCESSION)
        .with_dimensions(newest.dimensions.clone())
        .with_company_name(newest.company_name.clone())
        .with_quality_flag(TTM_FLAG);
        if let Some(start) = quarters[3].start_date {
            fact = fact.with_start_date(start);
        }
        Some(fact)
    }
}
