//! Identifier table implementations backed by memory or a local file.

use async_trait::async_trait;
use facts_core::{FactsError, IdentifierRow, IdentifierTable, Result, parse_company_tickers};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Identifier table held in memory.
///
/// Useful for tests and for hosts that already have the rows at hand.
#[derive(Debug, Clone, Default)]
pub struct StaticTable {
    rows: Vec<IdentifierRow>,
}

impl StaticTable {
    /// Creates a table from rows.
    #[must_use]
    pub const fn new(rows: Vec<IdentifierRow>) -> Self {
        Self { rows }
    }
}

impl FromIterator<IdentifierRow> for StaticTable {
    fn from_iter<I: IntoIterator<Item = IdentifierRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentifierTable for StaticTable {
    async fn load_identifier_table(&self) -> Result<Vec<IdentifierRow>> {
        Ok(self.rows.clone())
    }
}

/// Identifier table read from an SEC `company_tickers.json` file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileTable {
    path: PathBuf,
}

impl JsonFileTable {
    /// Creates a table reading from `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IdentifierTable for JsonFileTable {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_identifier_table(&self) -> Result<Vec<IdentifierRow>> {
        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FactsError::Table(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        let rows = parse_company_tickers(&json)?;
        debug!("Read {} identifier rows", rows.len());
        Ok(rows)
    }
}
