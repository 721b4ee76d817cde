//! Ticker to canonical identifier resolution.
//!
//! [`IdentifierResolver`] loads the static identifier table on first use and
//! answers lookups in both directions from memory. Concurrent first callers
//! share a single load.

use facts_core::{Cik, FactsError, IdentifierRow, IdentifierTable, Mapping, Result, Ticker};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Loaded identifier table with forward and reverse indices.
///
/// Lookups are pure: the async resolver answers every query through this type,
/// so a snapshot gives the same answers synchronously.
#[derive(Debug, Default, Clone)]
pub struct MappingTable {
    by_ticker: HashMap<Ticker, Mapping>,
    by_id: HashMap<Cik, Mapping>,
    tickers: HashMap<Cik, Vec<Ticker>>,
}

impl MappingTable {
    /// Builds both indices from raw rows.
    ///
    /// Rows with a blank ticker or malformed identifier are skipped. When a
    /// ticker repeats the first row wins; when several tickers share an
    /// identifier the reverse index keeps the first of them.
    #[must_use]
    pub fn build(rows: impl IntoIterator<Item = IdentifierRow>) -> Self {
        let mut table = Self::default();

        for row in rows {
            let mapping = match row.to_mapping() {
                Ok(mapping) => mapping,
                Err(e) => {
                    warn!(ticker = %row.ticker, "Skipping identifier row: {e}");
                    continue;
                }
            };

            match table.by_ticker.entry(mapping.ticker.clone()) {
                Entry::Occupied(existing) => {
                    warn!(
                        ticker = %mapping.ticker,
                        kept = %existing.get().canonical_id,
                        dropped = %mapping.canonical_id,
                        "Duplicate ticker in identifier table"
                    );
                    continue;
                }
                Entry::Vacant(slot) => {
                    slot.insert(mapping.clone());
                }
            }

            table
                .tickers
                .entry(mapping.canonical_id.clone())
                .or_default()
                .push(mapping.ticker.clone());

            table
                .by_id
                .entry(mapping.canonical_id.clone())
                .or_insert(mapping);
        }

        table
    }

    /// Looks up a normalized ticker.
    #[must_use]
    pub fn by_ticker(&self, ticker: &Ticker) -> Option<&Mapping> {
        self.by_ticker.get(ticker)
    }

    /// Looks up a normalized identifier.
    #[must_use]
    pub fn by_id(&self, canonical_id: &Cik) -> Option<&Mapping> {
        self.by_id.get(canonical_id)
    }

    /// Every ticker listed for an identifier, in table order. The first is
    /// the one [`by_id`](Self::by_id) returns.
    #[must_use]
    pub fn tickers_for(&self, canonical_id: &Cik) -> &[Ticker] {
        self.tickers.get(canonical_id).map_or(&[], Vec::as_slice)
    }

    /// Normalizes `ticker` and looks it up.
    ///
    /// # Errors
    /// [`FactsError::InvalidParameter`] for a blank ticker,
    /// [`FactsError::TickerNotFound`] when absent.
    pub fn lookup_ticker(&self, ticker: &str) -> Result<Mapping> {
        let ticker = Ticker::new(ticker);
        if ticker.is_empty() {
            return Err(FactsError::InvalidParameter("Empty ticker".to_string()));
        }
        self.by_ticker(&ticker)
            .cloned()
            .ok_or_else(|| FactsError::TickerNotFound(ticker.to_string()))
    }

    /// Normalizes `canonical_id` (zero-padding it) and looks it up.
    ///
    /// # Errors
    /// [`FactsError::InvalidParameter`] for a malformed identifier,
    /// [`FactsError::IdentifierNotFound`] when absent.
    pub fn lookup_id(&self, canonical_id: &str) -> Result<Mapping> {
        let cik = Cik::new(canonical_id)?;
        self.by_id(&cik)
            .cloned()
            .ok_or_else(|| FactsError::IdentifierNotFound(cik.to_string()))
    }

    /// Number of tickers in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_ticker.len()
    }

    /// Returns true if the table has no tickers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_ticker.is_empty()
    }
}

/// Bidirectional ticker/identifier cache backed by a lazily loaded table.
#[derive(Debug)]
pub struct IdentifierResolver {
    source: Arc<dyn IdentifierTable>,
    loaded: RwLock<Option<Arc<MappingTable>>>,
    loading: Mutex<()>,
}

impl IdentifierResolver {
    /// Creates a resolver over an identifier table. Nothing is loaded until
    /// the first lookup.
    #[must_use]
    pub fn new(source: Arc<dyn IdentifierTable>) -> Self {
        Self {
            source,
            loaded: RwLock::new(None),
            loading: Mutex::new(()),
        }
    }

    /// Resolves a ticker to its mapping, loading the table if needed.
    ///
    /// # Errors
    /// [`FactsError::TickerNotFound`] if the ticker is unknown after the table
    /// is loaded, [`FactsError::Table`] if loading fails.
    #[instrument(skip(self))]
    pub async fn resolve_by_ticker(&self, ticker: &str) -> Result<Mapping> {
        self.table().await?.lookup_ticker(ticker)
    }

    /// Resolves a canonical identifier to its mapping, loading the table if needed.
    ///
    /// # Errors
    /// [`FactsError::IdentifierNotFound`] if the identifier is unknown after the
    /// table is loaded, [`FactsError::Table`] if loading fails.
    #[instrument(skip(self))]
    pub async fn resolve_by_id(&self, canonical_id: &str) -> Result<Mapping> {
        self.table().await?.lookup_id(canonical_id)
    }

    /// Every ticker listed for an identifier, loading the table if needed.
    /// Empty for an unknown identifier.
    ///
    /// # Errors
    /// [`FactsError::Table`] if loading fails.
    pub async fn tickers_for(&self, canonical_id: &Cik) -> Result<Vec<Ticker>> {
        Ok(self.table().await?.tickers_for(canonical_id).to_vec())
    }

    /// Drops the loaded table; the next lookup reloads it from the source.
    pub fn clear_cache(&self) {
        let previous = self
            .loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(table) = previous {
            info!(tickers = table.len(), "Identifier cache cleared");
        }
    }

    /// Returns the loaded table, if any, for synchronous lookups.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<MappingTable>> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn table(&self) -> Result<Arc<MappingTable>> {
        if let Some(table) = self.snapshot() {
            return Ok(table);
        }

        let _loading = self.loading.lock().await;
        if let Some(table) = self.snapshot() {
            debug!("Identifier table loaded by a concurrent caller");
            return Ok(table);
        }

        let rows = self.source.load_identifier_table().await?;
        let table = Arc::new(MappingTable::build(rows));
        info!(tickers = table.len(), "Identifier table loaded");

        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&table));
        Ok(table)
    }
}
