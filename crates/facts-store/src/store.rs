//! Facts store with staleness-driven refresh.
//!
//! [`FactsStore`] serves point queries and series from its in-memory indices.
//! When the requested timeline is missing or past its grace window it asks the
//! [`FactsSource`] for the entity's complete fact set, at most once at a time
//! per entity, and publishes the result in one swap.

use facts_core::{
    Cik, Dimensions, Fact, FactsError, FactsSource, FetchError, Frequency, Freshness, Mapping,
    PeriodQuery, Result, Served,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::index::{CompanyMetadata, EntityFacts, FactIndices, RefreshStamp, StoreStats};
use crate::resolver::IdentifierResolver;
use crate::single_flight::SingleFlight;

/// Default number of facts returned by a series query.
pub const DEFAULT_SERIES_LIMIT: usize = 12;

type RefreshResult = std::result::Result<(), FetchError>;

/// Parameters of a single-fact query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactQuery {
    /// Namespaced concept, e.g. `us-gaap:Revenues`.
    pub concept: String,
    /// Period to select.
    pub period: PeriodQuery,
    /// Reporting cadence.
    pub freq: Frequency,
    /// Exact dimensions to match; empty selects consolidated facts.
    pub dimensions: Dimensions,
    /// Return the trailing twelve months ending at the selected period.
    pub ttm: bool,
}

impl FactQuery {
    /// Creates a query for the latest quarterly consolidated value of a concept.
    #[must_use]
    pub fn new(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            period: PeriodQuery::Latest,
            freq: Frequency::Quarterly,
            dimensions: Dimensions::new(),
            ttm: false,
        }
    }

    /// Sets the period to select.
    #[must_use]
    pub fn with_period(mut self, period: impl Into<PeriodQuery>) -> Self {
        self.period = period.into();
        self
    }

    /// Sets the reporting cadence.
    #[must_use]
    pub const fn with_freq(mut self, freq: Frequency) -> Self {
        self.freq = freq;
        self
    }

    /// Restricts the query to a segment member.
    #[must_use]
    pub fn with_dimension(mut self, axis: impl Into<String>, member: impl Into<String>) -> Self {
        self.dimensions.insert(axis.into(), member.into());
        self
    }

    /// Requests a trailing-twelve-month value.
    #[must_use]
    pub const fn with_ttm(mut self, ttm: bool) -> Self {
        self.ttm = ttm;
        self
    }
}

/// Parameters of a series query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuery {
    /// Namespaced concept.
    pub concept: String,
    /// Reporting cadence.
    pub freq: Frequency,
    /// Maximum number of facts, most recent first.
    pub limit: usize,
    /// Exact dimensions to match; empty selects consolidated facts.
    pub dimensions: Dimensions,
}

impl SeriesQuery {
    /// Creates a quarterly consolidated series query with the default limit.
    #[must_use]
    pub fn new(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            freq: Frequency::Quarterly,
            limit: DEFAULT_SERIES_LIMIT,
            dimensions: Dimensions::new(),
        }
    }

    /// Sets the reporting cadence.
    #[must_use]
    pub const fn with_freq(mut self, freq: Frequency) -> Self {
        self.freq = freq;
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts the series to a segment member.
    #[must_use]
    pub fn with_dimension(mut self, axis: impl Into<String>, member: impl Into<String>) -> Self {
        self.dimensions.insert(axis.into(), member.into());
        self
    }
}

/// Per-entity, per-concept fact timelines with on-demand refresh.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use facts_core::{Cik, Fact, FactsSource, FetchError, Frequency};
/// use facts_store::{FactsStore, IdentifierResolver, JsonFileTable};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Filings;
///
/// #[async_trait]
/// impl FactsSource for Filings {
///     fn name(&self) -> &str {
///         "filings"
///     }
///
///     async fn fetch_company_facts(
///         &self,
///         _canonical_id: &Cik,
///         _force_refresh: bool,
///     ) -> Result<Vec<Fact>, FetchError> {
///         Ok(Vec::new())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> facts_core::Result<()> {
///     let table = JsonFileTable::new("company_tickers.json");
///     let resolver = Arc::new(IdentifierResolver::new(Arc::new(table)));
///     let store = FactsStore::new(resolver, Arc::new(Filings));
///
///     let revenue = store
///         .get_fact("AMD", "us-gaap:Revenues", "latest", Frequency::Quarterly)
///         .await?;
///     if revenue.is_stale() {
///         println!("served stale: {:?}", revenue.freshness());
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FactsStore {
    resolver: Arc<IdentifierResolver>,
    source: Arc<dyn FactsSource>,
    indices: Arc<RwLock<FactIndices>>,
    flights: SingleFlight<Cik, RefreshResult>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl FactsStore {
    /// Creates an empty store with default configuration and the system clock.
    #[must_use]
    pub fn new(resolver: Arc<IdentifierResolver>, source: Arc<dyn FactsSource>) -> Self {
        Self {
            resolver,
            source,
            indices: Arc::new(RwLock::new(FactIndices::default())),
            flights: SingleFlight::new(),
            config: StoreConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for staleness checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the identifier resolver.
    #[must_use]
    pub const fn resolver(&self) -> &Arc<IdentifierResolver> {
        &self.resolver
    }

    /// Resolves a ticker through the store's resolver.
    ///
    /// # Errors
    /// See [`IdentifierResolver::resolve_by_ticker`].
    pub async fn resolve_by_ticker(&self, ticker: &str) -> Result<Mapping> {
        self.resolver.resolve_by_ticker(ticker).await
    }

    /// Resolves a canonical identifier through the store's resolver.
    ///
    /// # Errors
    /// See [`IdentifierResolver::resolve_by_id`].
    pub async fn resolve_by_id(&self, canonical_id: &str) -> Result<Mapping> {
        self.resolver.resolve_by_id(canonical_id).await
    }

    /// Clears the resolver's identifier cache.
    pub fn clear_cache(&self) {
        self.resolver.clear_cache();
    }

    /// Gets one consolidated fact.
    ///
    /// `period` is `"latest"` or an exact label such as `"2024-Q3"`. Returns
    /// `None` inside [`Served`] when no fact matches.
    ///
    /// # Errors
    /// Resolver errors are returned without any refresh attempt.
    /// [`FactsError::Fetch`] if a needed refresh failed and nothing is cached.
    pub async fn get_fact(
        &self,
        ticker: &str,
        concept: &str,
        period: impl Into<PeriodQuery>,
        freq: Frequency,
    ) -> Result<Served<Option<Fact>>> {
        let query = FactQuery::new(concept).with_period(period).with_freq(freq);
        self.query_fact(ticker, &query).await
    }

    /// Gets up to `limit` consolidated facts, most recent first.
    ///
    /// # Errors
    /// Same as [`get_fact`](Self::get_fact).
    pub async fn get_series(
        &self,
        ticker: &str,
        concept: &str,
        freq: Frequency,
        limit: usize,
    ) -> Result<Served<Vec<Fact>>> {
        let query = SeriesQuery::new(concept).with_freq(freq).with_limit(limit);
        self.query_series(ticker, &query).await
    }

    /// Gets one fact using the full set of query options.
    ///
    /// # Errors
    /// Same as [`get_fact`](Self::get_fact).
    #[instrument(
        skip(self, query),
        fields(
            ticker = %ticker,
            concept = %query.concept,
            period = %query.period,
            freq = %query.freq,
        )
    )]
    pub async fn query_fact(
        &self,
        ticker: &str,
        query: &FactQuery,
    ) -> Result<Served<Option<Fact>>> {
        let mapping = self.resolver.resolve_by_ticker(ticker).await?;
        let (entity, freshness) = self
            .load(&mapping.canonical_id, &query.concept, query.freq)
            .await?;

        let fact = entity
            .as_deref()
            .and_then(|entity| entity.timeline(&query.concept))
            .and_then(|timeline| {
                let selected = match &query.period {
                    PeriodQuery::Latest => timeline.latest(query.freq, &query.dimensions),
                    PeriodQuery::Label(label) => {
                        timeline.by_period(label, query.freq, &query.dimensions)
                    }
                }?;
                if query.ttm {
                    timeline.ttm(selected)
                } else {
                    Some(selected.clone())
                }
            });

        if fact.is_none() {
            debug!("No matching fact");
        }
        Ok(Served::new(fact, freshness))
    }

    /// Gets a series using the full set of query options.
    ///
    /// A resolvable entity with no facts for the concept yields an empty series.
    ///
    /// # Errors
    /// Same as [`get_fact`](Self::get_fact).
    #[instrument(
        skip(self, query),
        fields(ticker = %ticker, concept = %query.concept, freq = %query.freq, limit = query.limit)
    )]
    pub async fn query_series(
        &self,
        ticker: &str,
        query: &SeriesQuery,
    ) -> Result<Served<Vec<Fact>>> {
        let mapping = self.resolver.resolve_by_ticker(ticker).await?;
        let (entity, freshness) = self
            .load(&mapping.canonical_id, &query.concept, query.freq)
            .await?;

        let series = entity
            .as_deref()
            .and_then(|entity| entity.timeline(&query.concept))
            .map(|timeline| timeline.series(query.freq, &query.dimensions, query.limit))
            .unwrap_or_default();

        debug!("Serving {} facts", series.len());
        Ok(Served::new(series, freshness))
    }

    /// Replaces an entity's facts without contacting the source.
    ///
    /// Seeded data is not treated as confirmed by the source: it is still
    /// checked for staleness on read. Returns the number of facts stored.
    #[instrument(skip(self, facts), fields(canonical_id = %canonical_id, count = facts.len()))]
    pub async fn store_company_facts(&self, canonical_id: &Cik, facts: Vec<Fact>) -> usize {
        let mut indices = self.indices.write().await;
        let generation = indices.entity(canonical_id).map_or(0, |e| e.generation());
        let entity = indices.publish(EntityFacts::build(
            canonical_id.clone(),
            facts,
            generation,
            None,
        ));
        let stored = entity.fact_count();
        info!(stored, "Stored company facts");
        stored
    }

    /// Current facts for an entity, if any are stored.
    pub async fn entity_facts(&self, canonical_id: &Cik) -> Option<Arc<EntityFacts>> {
        self.indices.read().await.entity(canonical_id)
    }

    /// Every stored fact for a concept across all entities. Never refreshes.
    pub async fn concept_facts(&self, concept: &str) -> Vec<Fact> {
        self.indices.read().await.concept_facts(concept)
    }

    /// Counts of stored companies, concepts and facts.
    pub async fn stats(&self) -> StoreStats {
        self.indices.read().await.stats()
    }

    /// Mapping, listed tickers and refresh state of a company. Never
    /// refreshes; counts are zero when nothing is stored.
    ///
    /// # Errors
    /// Same resolver errors as [`resolve_by_ticker`](Self::resolve_by_ticker).
    #[instrument(skip(self))]
    pub async fn company_metadata(&self, ticker: &str) -> Result<CompanyMetadata> {
        let mapping = self.resolver.resolve_by_ticker(ticker).await?;
        let tickers = self.resolver.tickers_for(&mapping.canonical_id).await?;
        let entity = self.entity_facts(&mapping.canonical_id).await;

        Ok(CompanyMetadata {
            mapping,
            tickers,
            last_refreshed: entity.as_deref().and_then(EntityFacts::last_refreshed),
            concepts: entity.as_deref().map_or(0, EntityFacts::concept_count),
            facts: entity.as_deref().map_or(0, EntityFacts::fact_count),
        })
    }

    /// Drops every stored fact. Refreshes already running still publish.
    pub async fn clear(&self) {
        self.indices.write().await.clear();
        info!("Facts store cleared");
    }

    /// Returns the entity with a usable timeline for `concept`, refreshing it
    /// first when missing or stale.
    async fn load(
        &self,
        canonical_id: &Cik,
        concept: &str,
        freq: Frequency,
    ) -> Result<(Option<Arc<EntityFacts>>, Freshness)> {
        let current = self.indices.read().await.entity(canonical_id);
        if !self.is_stale(current.as_deref(), concept, freq) {
            debug!("Cache hit for timeline");
            return Ok((current, Freshness::Fresh));
        }

        let observed = current.as_ref().map_or(0, |e| e.generation());
        debug!(observed_generation = observed, "Timeline missing or stale");
        let outcome = self.refresh(canonical_id, observed).await;
        let current = self.indices.read().await.entity(canonical_id);

        match outcome {
            Ok(()) => Ok((current, Freshness::Fresh)),
            Err(error) => {
                let has_data = current
                    .as_deref()
                    .and_then(|entity| entity.timeline(concept))
                    .is_some_and(|timeline| !timeline.is_empty());
                if has_data {
                    warn!(%error, "Refresh failed; serving stale data");
                    Ok((current, Freshness::StaleDataServed(error)))
                } else {
                    warn!(%error, "Refresh failed and no cached data is available");
                    Err(FactsError::Fetch(error))
                }
            }
        }
    }

    fn is_stale(&self, entity: Option<&EntityFacts>, concept: &str, freq: Frequency) -> bool {
        let Some(entity) = entity else {
            return true;
        };
        if entity.refreshed_within(self.config.refresh_cooldown, Instant::now()) {
            return false;
        }
        match entity.timeline(concept) {
            Some(timeline) => {
                timeline.is_stale(freq, self.clock.today(), self.config.grace_days(freq))
            }
            None => true,
        }
    }

    /// Joins or starts the refresh flight for an entity.
    async fn refresh(&self, canonical_id: &Cik, observed_generation: u64) -> RefreshResult {
        let span = info_span!("refresh", canonical_id = %canonical_id);
        let work = refresh_entity(
            Arc::clone(&self.indices),
            Arc::clone(&self.source),
            canonical_id.clone(),
            observed_generation,
            self.config.refresh_timeout,
        )
        .instrument(span);

        self.flights
            .run(canonical_id.clone(), work)
            .await
            .unwrap_or_else(|aborted| Err(FetchError::Aborted(aborted.to_string())))
    }
}

/// Fetches an entity's facts and publishes them, unless another refresh
/// completed after the caller observed `observed_generation`.
async fn refresh_entity(
    indices: Arc<RwLock<FactIndices>>,
    source: Arc<dyn FactsSource>,
    canonical_id: Cik,
    observed_generation: u64,
    timeout: Duration,
) -> RefreshResult {
    let current_generation = indices
        .read()
        .await
        .entity(&canonical_id)
        .map_or(0, |e| e.generation());
    if current_generation > observed_generation {
        debug!("Already refreshed by an earlier flight");
        return Ok(());
    }

    let started = Instant::now();
    let fetch = source.fetch_company_facts(&canonical_id, true);
    let facts = match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result?,
        Err(_) => return Err(FetchError::Timeout(timeout)),
    };
    let fetched = facts.len();

    let mut indices = indices.write().await;
    let generation = indices
        .entity(&canonical_id)
        .map_or(0, |e| e.generation())
        + 1;
    indices.publish(EntityFacts::build(
        canonical_id,
        facts,
        generation,
        Some(RefreshStamp::now()),
    ));
    drop(indices);

    info!(
        source = source.name(),
        fetched,
        generation,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Refreshed company facts"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::table::StaticTable;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use facts_core::{IdentifierRow, PeriodType, Ticker};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const REVENUES: &str = "us-gaap:Revenues";

    #[derive(Debug, Default)]
    struct StubSource {
        facts: HashMap<Cik, Vec<Fact>>,
        failure: Option<FetchError>,
        delay: Duration,
        gate: Option<(Cik, Arc<Notify>)>,
        calls: AtomicUsize,
        unforced: AtomicUsize,
    }

    impl StubSource {
        fn with_facts(facts: Vec<Fact>) -> Self {
            let mut by_cik: HashMap<Cik, Vec<Fact>> = HashMap::new();
            for fact in facts {
                by_cik.entry(fact.canonical_id.clone()).or_default().push(fact);
            }
            Self {
                facts: by_cik,
                ..Self::default()
            }
        }

        fn failing(error: FetchError) -> Self {
            Self {
                failure: Some(error),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FactsSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch_company_facts(
            &self,
            canonical_id: &Cik,
            force_refresh: bool,
        ) -> std::result::Result<Vec<Fact>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !force_refresh {
                self.unforced.fetch_add(1, Ordering::SeqCst);
            }
            if let Some((gated, gate)) = &self.gate {
                if gated == canonical_id {
                    gate.notified().await;
                }
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            Ok(self.facts.get(canonical_id).cloned().unwrap_or_default())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn amd() -> Cik {
        Cik::new("2488").unwrap()
    }

    fn nvda() -> Cik {
        Cik::new("1045810").unwrap()
    }

    fn revenue(cik: &Cik, period: &str, value: f64, start: NaiveDate, end: NaiveDate) -> Fact {
        Fact::new(cik.clone(), REVENUES, value, "USD", period, PeriodType::Duration, end)
            .with_start_date(start)
            .with_accession(format!("{}-{}", cik.as_str(), period))
            .with_company_name("Advanced Micro Devices, Inc.")
    }

    fn stale_amd_fact() -> Fact {
        revenue(&amd(), "2018-Q1", 1_647_000_000.0, date(2017, 12, 31), date(2018, 3, 31))
    }

    fn refreshed_amd_fact() -> Fact {
        revenue(&amd(), "2025-Q2", 7_685_000_000.0, date(2025, 3, 31), date(2025, 6, 30))
    }

    fn recent_amd_quarters() -> Vec<Fact> {
        vec![
            revenue(&amd(), "2024-Q3", 6_819.0, date(2024, 6, 30), date(2024, 9, 28)),
            revenue(&amd(), "2024-Q4", 7_658.0, date(2024, 9, 29), date(2024, 12, 28)),
            revenue(&amd(), "2025-Q1", 7_438.0, date(2024, 12, 29), date(2025, 3, 29)),
            revenue(&amd(), "2025-Q2", 7_685.0, date(2025, 3, 30), date(2025, 6, 28)),
        ]
    }

    fn resolver() -> Arc<IdentifierResolver> {
        Arc::new(IdentifierResolver::new(Arc::new(StaticTable::new(vec![
            IdentifierRow::new("AMD", "2488", "Advanced Micro Devices, Inc."),
            IdentifierRow::new("NVDA", "1045810", "NVIDIA Corp"),
        ]))))
    }

    fn store(source: Arc<StubSource>) -> FactsStore {
        FactsStore::new(resolver(), source).with_clock(Arc::new(FixedClock(date(2025, 8, 1))))
    }

    #[tokio::test]
    async fn test_stale_timeline_triggers_one_refresh() {
        let source = Arc::new(StubSource::with_facts(vec![refreshed_amd_fact()]));
        let store = store(Arc::clone(&source));
        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;

        let served = store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();

        assert!(!served.is_stale());
        let fact = served.into_inner().unwrap();
        assert_eq!(fact.period, "2025-Q2");
        assert!((fact.value - 7.685e9).abs() < 1.0);
        assert_eq!(source.calls(), 1);
        assert_eq!(source.unforced.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_history() {
        let source = Arc::new(StubSource::with_facts(vec![refreshed_amd_fact()]));
        let store = store(Arc::clone(&source));
        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;

        store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();
        let old = store
            .get_fact("AMD", REVENUES, "2018-Q1", Frequency::Quarterly)
            .await
            .unwrap();

        assert!(old.data().is_none());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_reads_are_idempotent_and_local() {
        let source = Arc::new(StubSource::default());
        let store = store(Arc::clone(&source));
        store.store_company_facts(&amd(), recent_amd_quarters()).await;

        let first = store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();
        let second = store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.data().as_ref().unwrap().period, "2025-Q2");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stale_reads_fetch_once() {
        let source = Arc::new(StubSource {
            delay: Duration::from_millis(50),
            ..StubSource::with_facts(vec![refreshed_amd_fact()])
        });
        let store = Arc::new(store(Arc::clone(&source)));
        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap().into_inner().unwrap());
        }

        assert_eq!(source.calls(), 1);
        assert!(results.iter().all(|fact| fact == &results[0]));
        assert_eq!(results[0].period, "2025-Q2");
    }

    #[tokio::test]
    async fn test_exact_period_without_match_is_none() {
        let source = Arc::new(StubSource::default());
        let store = store(Arc::clone(&source));
        store
            .store_company_facts(&amd(), recent_amd_quarters()[2..].to_vec())
            .await;

        let served = store
            .get_fact("AMD", REVENUES, "2024-Q3", Frequency::Quarterly)
            .await
            .unwrap();
        assert!(served.data().is_none());

        let served = store
            .get_fact("AMD", REVENUES, "2025-Q1", Frequency::Quarterly)
            .await
            .unwrap();
        assert_eq!(served.into_inner().unwrap().value, 7_438.0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_series_is_not_an_error() {
        let source = Arc::new(StubSource::with_facts(recent_amd_quarters()));
        let store = store(Arc::clone(&source));

        let served = store
            .get_series("AMD", "us-gaap:Goodwill", Frequency::Quarterly, 8)
            .await
            .unwrap();

        assert!(served.data().is_empty());
        assert!(!served.is_stale());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_series_is_newest_first_and_limited() {
        let source = Arc::new(StubSource::with_facts(recent_amd_quarters()));
        let store = store(Arc::clone(&source));

        let series = store
            .get_series("amd", REVENUES, Frequency::Quarterly, 3)
            .await
            .unwrap()
            .into_inner();

        let periods: Vec<_> = series.iter().map(|f| f.period.as_str()).collect();
        assert_eq!(periods, vec!["2025-Q2", "2025-Q1", "2024-Q4"]);
    }

    #[tokio::test]
    async fn test_unresolvable_ticker_never_fetches() {
        let source = Arc::new(StubSource::with_facts(vec![refreshed_amd_fact()]));
        let store = store(Arc::clone(&source));

        let err = store
            .get_fact("NOTAREALTICKER", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_serves_stale_data() {
        let error = FetchError::Status {
            status: 503,
            url: "https://data.sec.gov/api/xbrl/companyfacts/CIK0000002488.json".into(),
        };
        let source = Arc::new(StubSource::failing(error.clone()));
        let store = store(Arc::clone(&source));
        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;

        let served = store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();

        assert_eq!(served.freshness(), &Freshness::StaleDataServed(error));
        assert_eq!(served.into_inner().unwrap().period, "2018-Q1");
    }

    #[tokio::test]
    async fn test_fetch_failure_without_data_propagates() {
        let source = Arc::new(StubSource::failing(FetchError::Network("reset".into())));
        let store = store(Arc::clone(&source));

        let err = store
            .get_series("NVDA", REVENUES, Frequency::Quarterly, 4)
            .await
            .unwrap_err();

        assert!(matches!(err, FactsError::Fetch(FetchError::Network(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_timeout_serves_stale_or_fails() {
        let source = Arc::new(StubSource {
            delay: Duration::from_secs(3600),
            ..StubSource::with_facts(vec![refreshed_amd_fact()])
        });
        let store = store(Arc::clone(&source))
            .with_config(StoreConfig::new().with_refresh_timeout(Duration::from_millis(50)));
        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;

        let served = store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();
        assert_eq!(
            served.freshness(),
            &Freshness::StaleDataServed(FetchError::Timeout(Duration::from_millis(50)))
        );
        assert_eq!(served.into_inner().unwrap().period, "2018-Q1");

        let err = store
            .get_fact("NVDA", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap_err();
        assert!(matches!(err, FactsError::Fetch(FetchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_refetch_of_old_data() {
        let source = Arc::new(StubSource::with_facts(vec![stale_amd_fact()]));
        let store = store(Arc::clone(&source));

        for _ in 0..3 {
            let served = store
                .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
                .await
                .unwrap();
            assert_eq!(served.into_inner().unwrap().period, "2018-Q1");
        }
        assert_eq!(source.calls(), 1);

        let eager = FactsStore::new(resolver(), Arc::clone(&source) as Arc<dyn FactsSource>)
            .with_clock(Arc::new(FixedClock(date(2025, 8, 1))))
            .with_config(StoreConfig::new().with_refresh_cooldown(Duration::ZERO));
        for _ in 0..2 {
            eager
                .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
                .await
                .unwrap();
        }
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_cancel_refresh() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(StubSource {
            gate: Some((amd(), Arc::clone(&gate))),
            ..StubSource::with_facts(vec![refreshed_amd_fact()])
        });
        let store = Arc::new(store(Arc::clone(&source)));
        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;

        let abandoned = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
                    .await
            })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        abandoned.abort();
        assert!(abandoned.await.is_err());

        gate.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while store
                .entity_facts(&amd())
                .await
                .is_none_or(|entity| entity.generation() == 0)
            {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let served = store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();
        assert_eq!(served.into_inner().unwrap().period, "2025-Q2");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_behind_newer_generation_skips_fetch() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(StubSource {
            gate: Some((amd(), Arc::clone(&gate))),
            ..StubSource::with_facts(vec![refreshed_amd_fact()])
        });
        let store = Arc::new(store(Arc::clone(&source)));
        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;

        // Generation read before the first flight publishes.
        let observed = store.entity_facts(&amd()).await.unwrap().generation();

        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
                    .await
            })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(store.entity_facts(&amd()).await.unwrap().generation(), observed + 1);

        // A second fetch would wait on the gate forever.
        tokio::time::timeout(Duration::from_secs(5), store.refresh(&amd(), observed))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.calls(), 1);

        let served = store
            .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
            .await
            .unwrap();
        assert_eq!(served.freshness(), &Freshness::Fresh);
        assert_eq!(served.into_inner().unwrap().period, "2025-Q2");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unrelated_entities_refresh_independently() {
        let gate = Arc::new(Notify::new());
        let nvda_fact = Fact::new(
            nvda(),
            REVENUES,
            46_743.0,
            "USD",
            "2025-Q2",
            PeriodType::Duration,
            date(2025, 7, 27),
        )
        .with_start_date(date(2025, 4, 28));
        let source = Arc::new(StubSource {
            gate: Some((amd(), Arc::clone(&gate))),
            ..StubSource::with_facts(vec![refreshed_amd_fact(), nvda_fact])
        });
        let store = Arc::new(store(Arc::clone(&source)));

        let blocked = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .get_fact("AMD", REVENUES, "latest", Frequency::Quarterly)
                    .await
            })
        };

        let nvda = tokio::time::timeout(
            Duration::from_secs(5),
            store.get_fact("NVDA", REVENUES, "latest", Frequency::Quarterly),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(nvda.into_inner().unwrap().value, 46_743.0);
        assert!(!blocked.is_finished());

        gate.notify_one();
        let amd = blocked.await.unwrap().unwrap();
        assert_eq!(amd.into_inner().unwrap().period, "2025-Q2");
    }

    #[tokio::test]
    async fn test_segment_and_ttm_queries() {
        let segment = revenue(&amd(), "2025-Q2", 3_240.0, date(2025, 3, 30), date(2025, 6, 28))
            .with_dimension("us-gaap:StatementBusinessSegmentsAxis", "DataCenter");
        let mut facts = recent_amd_quarters();
        facts.push(segment);
        let source = Arc::new(StubSource::default());
        let store = store(Arc::clone(&source));
        store.store_company_facts(&amd(), facts).await;

        let query = FactQuery::new(REVENUES)
            .with_dimension("us-gaap:StatementBusinessSegmentsAxis", "DataCenter");
        let fact = store.query_fact("AMD", &query).await.unwrap().into_inner().unwrap();
        assert_eq!(fact.value, 3_240.0);

        let ttm = store
            .query_fact("AMD", &FactQuery::new(REVENUES).with_ttm(true))
            .await
            .unwrap()
            .into_inner()
            .unwrap();
        assert_eq!(ttm.value, 6_819.0 + 7_658.0 + 7_438.0 + 7_685.0);
        assert_eq!(ttm.period, "TTM-2025-Q2");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_concept_index_stats_and_clear() {
        let nvda_fact = Fact::new(
            nvda(),
            REVENUES,
            46_743.0,
            "USD",
            "2025-Q2",
            PeriodType::Duration,
            date(2025, 7, 27),
        );
        let store = store(Arc::new(StubSource::default()));
        store.store_company_facts(&amd(), recent_amd_quarters()).await;
        store.store_company_facts(&nvda(), vec![nvda_fact]).await;

        assert_eq!(store.concept_facts(REVENUES).await.len(), 5);
        assert_eq!(
            store.stats().await,
            StoreStats {
                companies: 2,
                concepts: 1,
                total_facts: 5,
            }
        );

        store.clear().await;
        assert_eq!(store.stats().await, StoreStats::default());
        assert!(store.concept_facts(REVENUES).await.is_empty());
    }

    #[tokio::test]
    async fn test_company_metadata_reports_refresh_state() {
        let source = Arc::new(StubSource::with_facts(recent_amd_quarters()));
        let store = store(Arc::clone(&source));

        let unknown = store.company_metadata("NOTAREALTICKER").await.unwrap_err();
        assert!(unknown.is_not_found());

        let empty = store.company_metadata("amd").await.unwrap();
        assert_eq!(empty.mapping.canonical_id, amd());
        assert_eq!(empty.mapping.company_name, "Advanced Micro Devices, Inc.");
        assert_eq!(empty.tickers, vec![Ticker::new("AMD")]);
        assert_eq!((empty.concepts, empty.facts), (0, 0));
        assert!(empty.last_refreshed.is_none());

        store.store_company_facts(&amd(), vec![stale_amd_fact()]).await;
        let seeded = store.company_metadata("AMD").await.unwrap();
        assert_eq!((seeded.concepts, seeded.facts), (1, 1));
        assert!(seeded.last_refreshed.is_none());

        let before = Utc::now();
        store
            .get_series("AMD", REVENUES, Frequency::Quarterly, 4)
            .await
            .unwrap();
        let refreshed = store.company_metadata("AMD").await.unwrap();
        assert_eq!((refreshed.concepts, refreshed.facts), (1, 4));
        assert!(refreshed.last_refreshed.is_some_and(|at| at >= before));
        assert_eq!(refreshed.mapping, empty.mapping);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolution_passthrough_and_cache_clear() {
        let store = store(Arc::new(StubSource::default()));
        let mapping = store.resolve_by_ticker("nvda").await.unwrap();
        assert_eq!(store.resolve_by_id("1045810").await.unwrap(), mapping);

        store.clear_cache();
        assert!(store.resolver().snapshot().is_none());
        assert_eq!(store.resolve_by_ticker("NVDA").await.unwrap(), mapping);
    }
}
