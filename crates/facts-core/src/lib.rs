#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/facts/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and collaborator traits for point-in-time financial facts.
//!
//! This crate provides the foundational abstractions shared by the store and
//! its collaborators:
//!
//! - [`Fact`](types::Fact) - A reported metric value with provenance
//! - [`Mapping`](types::Mapping) - Ticker to canonical identifier entry
//! - [`FactsSource`](source::FactsSource) - External facts fetcher
//! - [`IdentifierTable`](source::IdentifierTable) - Static identifier table loader
//! - [`Served`](types::Served) - Data plus its freshness signal

/// Error types for resolution and retrieval.
pub mod error;
/// Reporting cadence and period definitions.
pub mod frequency;
/// Collaborator traits consumed by the store.
pub mod source;
/// Identifier table rows and SEC ticker file parsing.
pub mod table;
/// Core data types (Ticker, Cik, Fact, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{FactsError, FetchError, Result};
pub use frequency::{FISCAL_YEAR_END_FLAG, Frequency, PeriodQuery, PeriodType, is_quarter_label};
pub use source::{FactsSource, IdentifierTable};
pub use table::{IdentifierRow, parse_company_tickers};
pub use types::{CIK_WIDTH, Cik, Dimensions, Fact, Freshness, Mapping, Served, Ticker};
