//! Identifier table rows and the SEC `company_tickers.json` format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::{FactsError, Result},
    types::{Cik, Mapping, Ticker},
};

/// One row of the static identifier table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRow {
    /// Ticker as listed in the source.
    pub ticker: String,
    /// Canonical identifier as listed in the source (padding optional).
    pub canonical_id: String,
    /// Registrant name.
    pub company_name: String,
}

impl IdentifierRow {
    /// Creates a new row.
    #[must_use]
    pub fn new(
        ticker: impl Into<String>,
        canonical_id: impl Into<String>,
        company_name: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            canonical_id: canonical_id.into(),
            company_name: company_name.into(),
        }
    }

    /// Normalizes the row into a [`Mapping`].
    ///
    /// # Errors
    /// Returns [`FactsError::InvalidParameter`] if the ticker is blank or the
    /// identifier is malformed.
    pub fn to_mapping(&self) -> Result<Mapping> {
        let ticker = Ticker::new(&self.ticker);
        if ticker.is_empty() {
            return Err(FactsError::InvalidParameter(format!(
                "blank ticker for identifier {}",
                self.canonical_id
            )));
        }
        let canonical_id = Cik::new(&self.canonical_id)?;
        Ok(Mapping::new(ticker, canonical_id, self.company_name.trim()))
    }
}

/// Company ticker information from SEC JSON.
#[derive(Debug, Deserialize)]
struct CompanyTickerInfo {
    /// CIK as a number (SEC returns this as an integer)
    cik_str: u64,
    /// Ticker symbol
    ticker: String,
    /// Company name
    #[serde(default)]
    title: String,
}

/// Parses the SEC `company_tickers.json` document.
///
/// The document is an object keyed by row index:
/// `{"0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}, ...}`.
/// Rows come back in index order.
///
/// # Errors
/// Returns [`FactsError::Parse`] if the document is not in that shape.
pub fn parse_company_tickers(json: &str) -> Result<Vec<IdentifierRow>> {
    let raw: BTreeMap<String, CompanyTickerInfo> = serde_json::from_str(json)
        .map_err(|e| FactsError::Parse(format!("Failed to parse company tickers: {e}")))?;

    let mut indexed: Vec<(u64, IdentifierRow)> = raw
        .into_iter()
        .map(|(key, info)| {
            let order = key.parse::<u64>().unwrap_or(u64::MAX);
            (
                order,
                IdentifierRow::new(info.ticker, info.cik_str.to_string(), info.title),
            )
        })
        .collect();
    indexed.sort_by_key(|(order, _)| *order);

    Ok(indexed.into_iter().map(|(_, row)| row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_company_tickers_keeps_index_order() {
        let json = r#"{
            "10": {"cik_str": 1652044, "ticker": "GOOG", "title": "Alphabet Inc."},
            "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
            "2": {"cik_str": 1652044, "ticker": "GOOGL", "title": "Alphabet Inc."}
        }"#;
        let rows = parse_company_tickers(json).unwrap();
        let tickers: Vec<_> = rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "GOOGL", "GOOG"]);
        assert_eq!(rows[0].canonical_id, "320193");
    }

    #[test]
    fn test_parse_company_tickers_rejects_garbage() {
        assert!(matches!(
            parse_company_tickers("[1, 2, 3]"),
            Err(FactsError::Parse(_))
        ));
    }

    #[test]
    fn test_row_to_mapping() {
        let mapping = IdentifierRow::new(" amd", "2488", "Advanced Micro Devices, Inc. ")
            .to_mapping()
            .unwrap();
        assert_eq!(mapping.ticker.as_str(), "AMD");
        assert_eq!(mapping.canonical_id.as_str(), "0000002488");
        assert_eq!(mapping.company_name, "Advanced Micro Devices, Inc.");

        assert!(IdentifierRow::new("", "2488", "x").to_mapping().is_err());
        assert!(IdentifierRow::new("AMD", "n/a", "x").to_mapping().is_err());
    }
}
