//! Builder wiring a resolver, a facts source and configuration into a store.

use std::sync::Arc;

use tracing::debug;

use facts_core::{FactsError, FactsSource, IdentifierTable, Result};
use facts_store::{Clock, FactsStore, IdentifierResolver, StoreConfig};

/// Assembles a [`FactsStore`] from its collaborators.
///
/// # Example
///
/// ```no_run
/// use facts::{FactsStoreBuilder, Frequency, StoreConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> facts::Result<()> {
///     let store = FactsStoreBuilder::new()
///         .with_edgar("MyApp/1.0 (contact@example.com)")?
///         .with_config(StoreConfig::new().with_refresh_timeout(Duration::from_secs(10)))
///         .build()?;
///
///     let revenue = store
///         .get_series("AMD", "us-gaap:Revenues", Frequency::Quarterly, 8)
///         .await?;
///     println!("{} quarters", revenue.data().len());
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct FactsStoreBuilder {
    table: Option<Arc<dyn IdentifierTable>>,
    source: Option<Arc<dyn FactsSource>>,
    resolver: Option<Arc<IdentifierResolver>>,
    config: StoreConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl std::fmt::Debug for FactsStoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactsStoreBuilder")
            .field("table", &self.table.as_ref().map(|_| "configured"))
            .field("source", &self.source.as_ref().map(|s| s.name()))
            .field("resolver", &self.resolver.as_ref().map(|_| "shared"))
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

impl FactsStoreBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifier table the store's resolver loads from.
    #[must_use]
    pub fn with_table(mut self, table: Arc<dyn IdentifierTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Share an existing resolver instead of creating one from a table.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<IdentifierResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the facts source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn FactsSource>) -> Self {
        debug!(source = source.name(), "Registering facts source");
        self.source = Some(source);
        self
    }

    /// Set the store configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock used for staleness checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use SEC EDGAR for both the identifier table and the facts source.
    ///
    /// # Errors
    /// [`FactsError::InvalidParameter`] if the HTTP clients cannot be built.
    #[cfg(feature = "edgar")]
    pub fn with_edgar(self, user_agent: &str) -> Result<Self> {
        let table = facts_edgar::EdgarTickerTable::new(user_agent)?;
        let source = facts_edgar::EdgarFactsSource::new(user_agent)?;
        Ok(self.with_table(Arc::new(table)).with_source(Arc::new(source)))
    }

    /// Build the store.
    ///
    /// # Errors
    /// [`FactsError::InvalidParameter`] if no facts source was set, or if
    /// neither a resolver nor an identifier table was set.
    pub fn build(self) -> Result<FactsStore> {
        let source = self
            .source
            .ok_or_else(|| FactsError::InvalidParameter("No facts source configured".into()))?;
        let resolver = match (self.resolver, self.table) {
            (Some(resolver), _) => resolver,
            (None, Some(table)) => Arc::new(IdentifierResolver::new(table)),
            (None, None) => {
                return Err(FactsError::InvalidParameter(
                    "No identifier table or resolver configured".into(),
                ));
            }
        };

        let store = FactsStore::new(resolver, source).with_config(self.config);
        Ok(match self.clock {
            Some(clock) => store.with_clock(clock),
            None => store,
        })
    }
}
