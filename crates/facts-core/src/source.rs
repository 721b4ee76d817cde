//! Collaborator traits consumed by the facts store.
//!
//! This module defines the capability interfaces that are injected into the
//! store and resolver:
//!
//! - [`FactsSource`] - Fetches the complete current set of facts for an entity
//! - [`IdentifierTable`] - Loads the static ticker/identifier table

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::{FetchError, Result},
    table::IdentifierRow,
    types::{Cik, Fact},
};

/// External source of financial facts.
///
/// Implementations may call a regulatory filings API or read a local cache.
/// Retry and backoff belong to the implementation, not to its callers.
#[async_trait]
pub trait FactsSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g., "SEC EDGAR").
    fn name(&self) -> &str;

    /// Fetches every current fact for an entity across all concepts.
    ///
    /// When `force_refresh` is true, implementations backed by a cache must
    /// bypass it.
    async fn fetch_company_facts(
        &self,
        canonical_id: &Cik,
        force_refresh: bool,
    ) -> std::result::Result<Vec<Fact>, FetchError>;
}

/// Read-only table of `(ticker, canonical_id, company_name)` rows.
///
/// Tickers are expected to be unique ignoring case.
#[async_trait]
pub trait IdentifierTable: Send + Sync + Debug {
    /// Loads every row of the table.
    async fn load_identifier_table(&self) -> Result<Vec<IdentifierRow>>;
}
