//! Conversion of the EDGAR companyfacts response into [`Fact`]s.

use chrono::{Datelike, Days, Months, NaiveDate};
use facts_core::{Cik, FISCAL_YEAR_END_FLAG, Fact, FetchError, PeriodType};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Taxonomies converted into facts, in lookup order.
pub const TAXONOMIES: [&str; 3] = ["us-gaap", "ifrs-full", "dei"];

/// Quality flag set on facts reported in an amended filing.
pub const AMENDED_FLAG: &str = "amended";

/// Forms that report a full fiscal year.
const ANNUAL_FORMS: [&str; 3] = ["10-K", "20-F", "40-F"];

/// Day span of a duration fact treated as a fiscal quarter.
const QUARTER_DAYS: std::ops::RangeInclusive<i64> = 80..=100;

/// Day span of a duration fact treated as a fiscal year.
const YEAR_DAYS: std::ops::RangeInclusive<i64> = 350..=380;

/// Response from the SEC EDGAR Company Facts API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanyFactsResponse {
    #[serde(default)]
    entity_name: String,
    /// Facts organized by taxonomy and tag
    #[serde(default)]
    facts: HashMap<String, HashMap<String, TagFacts>>,
}

/// Facts for a specific XBRL tag.
#[derive(Debug, Deserialize)]
struct TagFacts {
    /// Units (USD, shares, etc.) containing the actual fact values
    #[serde(default)]
    units: HashMap<String, Vec<FactValue>>,
}

/// A single fact value with metadata.
///
/// Dates stay strings here so one malformed row does not reject the document.
#[derive(Debug, Deserialize)]
struct FactValue {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    val: Option<f64>,
    #[serde(default)]
    accn: Option<String>,
    #[serde(default)]
    form: Option<String>,
    /// ISO date, so string order is filing order
    #[serde(default)]
    filed: Option<String>,
    /// Calendar frame, e.g. `CY2025Q2`, `CY2024` or `CY2025Q2I`
    #[serde(default)]
    frame: Option<String>,
}

impl FactValue {
    fn is_annual_form(&self) -> bool {
        self.form
            .as_deref()
            .is_some_and(|form| ANNUAL_FORMS.iter().any(|f| form.starts_with(f)))
    }
}

/// Parses a companyfacts JSON document into facts for `canonical_id`.
///
/// Values are emitted in filing order per concept so that a later filing
/// supersedes an earlier one for the same period. Cumulative year-to-date
/// durations that are neither a quarter nor a year are skipped, as are rows
/// with a missing or malformed date or value.
///
/// # Errors
/// [`FetchError::Parse`] if the document is not a companyfacts response.
pub fn parse_company_facts(canonical_id: &Cik, json: &str) -> Result<Vec<Fact>, FetchError> {
    let response: CompanyFactsResponse = serde_json::from_str(json)
        .map_err(|e| FetchError::Parse(format!("Failed to parse company facts: {e}")))?;

    let mut facts = Vec::new();
    let mut skipped = 0usize;

    for taxonomy in TAXONOMIES {
        let Some(tags) = response.facts.get(taxonomy) else {
            continue;
        };
        for (tag, tag_facts) in tags {
            let concept = format!("{taxonomy}:{tag}");
            for (unit, values) in &tag_facts.units {
                let mut ordered: Vec<&FactValue> = values.iter().collect();
                ordered.sort_by(|a, b| a.filed.cmp(&b.filed));

                // A balance reported in an annual form closes a fiscal year,
                // including its re-reports in later quarterly forms.
                let year_ends: HashSet<&str> = values
                    .iter()
                    .filter(|v| v.start.is_none() && v.is_annual_form())
                    .filter_map(|v| v.end.as_deref())
                    .collect();

                for value in ordered {
                    let year_end = value.start.is_none()
                        && value.end.as_deref().is_some_and(|end| year_ends.contains(end));
                    let entity = (canonical_id, response.entity_name.as_str());
                    match to_fact(entity, &concept, unit, value, year_end) {
                        Some(fact) => facts.push(fact),
                        None => skipped += 1,
                    }
                }
            }
        }
    }

    debug!(
        canonical_id = %canonical_id,
        facts = facts.len(),
        skipped,
        "Converted company facts"
    );
    Ok(facts)
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn to_fact(
    (canonical_id, company_name): (&Cik, &str),
    concept: &str,
    unit: &str,
    value: &FactValue,
    year_end: bool,
) -> Option<Fact> {
    let end = parse_date(value.end.as_deref()?)?;
    let val = value.val?;
    let start = match value.start.as_deref() {
        Some(start) => Some(parse_date(start)?),
        None => None,
    };

    let framed = value.frame.as_deref().and_then(frame_label);
    let (period_type, period) = match start {
        Some(start) => (PeriodType::Duration, framed.or_else(|| span_label(start, end))?),
        None => (
            PeriodType::Instant,
            framed.unwrap_or_else(|| instant_label(end)),
        ),
    };

    let mut fact = Fact::new(
        canonical_id.clone(),
        concept,
        val,
        unit,
        period,
        period_type,
        end,
    )
    .with_company_name(company_name);

    if let Some(start) = start {
        fact = fact.with_start_date(start);
    }
    if let Some(accn) = &value.accn {
        fact = fact
            .with_url(filing_url(canonical_id, accn))
            .with_accession(accn.clone());
    }
    if let Some(frame) = &value.frame {
        fact = fact.with_fragment_id(frame.clone());
    }
    if value.form.as_deref().is_some_and(|form| form.ends_with("/A")) {
        fact = fact.with_quality_flag(AMENDED_FLAG);
    }
    if year_end {
        fact = fact.with_quality_flag(FISCAL_YEAR_END_FLAG);
    }
    Some(fact)
}

/// Label for a calendar frame: `CY2025Q2` and `CY2025Q2I` are `2025-Q2`,
/// `CY2024` is `2024-FY`.
pub(crate) fn frame_label(frame: &str) -> Option<String> {
    let frame = frame.strip_prefix("CY")?;
    let frame = frame.strip_suffix('I').unwrap_or(frame);
    let year = frame.get(..4).filter(|y| y.bytes().all(|b| b.is_ascii_digit()))?;

    match &frame[4..] {
        "" => Some(format!("{year}-FY")),
        quarter @ ("Q1" | "Q2" | "Q3" | "Q4") => Some(format!("{year}-{quarter}")),
        _ => None,
    }
}

/// Label for a duration without a frame: the calendar quarter or year holding
/// most of the span, matching the frame EDGAR assigns.
fn span_label(start: NaiveDate, end: NaiveDate) -> Option<String> {
    let days = end.signed_duration_since(start).num_days();
    let midpoint = start.checked_add_days(Days::new(u64::try_from(days / 2).ok()?))?;
    if QUARTER_DAYS.contains(&days) {
        Some(quarter_label(midpoint))
    } else if YEAR_DAYS.contains(&days) {
        Some(format!("{}-FY", midpoint.year()))
    } else {
        None
    }
}

/// Label for an instant without a frame: the nearest calendar quarter end.
fn instant_label(end: NaiveDate) -> String {
    let quarter_start = NaiveDate::from_ymd_opt(end.year(), end.month0() / 3 * 3 + 1, 1);
    let previous = quarter_start.and_then(|start| start.pred_opt());
    let current = quarter_start
        .and_then(|start| start.checked_add_months(Months::new(3)))
        .and_then(|next| next.pred_opt());

    match (previous, current) {
        (Some(previous), Some(current)) if end - previous < current - end => {
            quarter_label(previous)
        }
        _ => quarter_label(end),
    }
}

fn quarter_label(date: NaiveDate) -> String {
    format!("{}-Q{}", date.year(), date.month0() / 3 + 1)
}

/// Archive location of the filing with accession number `accn`.
pub(crate) fn filing_url(canonical_id: &Cik, accn: &str) -> String {
    format!(
        "https://www.sec.gov/Archives/edgar/data/{}/{}",
        canonical_id.unpadded(),
        accn.replace('-', "")
    )
}
