#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/facts/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC EDGAR collaborators for the facts store.
//!
//! This crate provides:
//!
//! - [`EdgarFactsSource`] - Company facts from the EDGAR XBRL API
//! - [`EdgarTickerTable`] - The SEC ticker to CIK table
//!
//! # Example
//!
//! ```no_run
//! use facts_core::Frequency;
//! use facts_edgar::{EdgarFactsSource, EdgarTickerTable};
//! use facts_store::{FactsStore, IdentifierResolver};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> facts_core::Result<()> {
//!     let user_agent = "MyApp/1.0 (contact@example.com)";
//!     let table = Arc::new(EdgarTickerTable::new(user_agent)?);
//!     let resolver = Arc::new(IdentifierResolver::new(table));
//!     let store = FactsStore::new(resolver, Arc::new(EdgarFactsSource::new(user_agent)?));
//!
//!     let assets = store
//!         .get_fact("NVDA", "us-gaap:Assets", "latest", Frequency::Quarterly)
//!         .await?;
//!     println!("{:?}", assets.data());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use facts_core::{
    Cik, Fact, FactsError, FactsSource, FetchError, IdentifierRow, IdentifierTable, Result,
    parse_company_tickers,
};
use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument};

/// Company facts conversion.
pub mod companyfacts;

pub use companyfacts::{AMENDED_FLAG, TAXONOMIES, parse_company_facts};

/// SEC EDGAR API base URL
const EDGAR_BASE_URL: &str = "https://data.sec.gov";

/// SEC company tickers URL
const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// Default rate limit: 10 requests per second (SEC requirement)
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(100);

/// Default per-request HTTP timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Rate limiter to ensure we don't exceed SEC's rate limits
#[derive(Debug)]
struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    const fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

fn build_client(user_agent: &str) -> std::result::Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
}

/// Company facts from the SEC EDGAR XBRL API.
///
/// Implements rate limiting per SEC requirements (max 10 requests/second).
/// A forced refresh sends `Cache-Control: no-cache` so intermediaries do not
/// answer with a cached document. There is no retry; a failed request is
/// reported to the store, which decides whether to serve stale data.
#[derive(Debug, Clone)]
pub struct EdgarFactsSource {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
}

impl EdgarFactsSource {
    /// Create a source with the specified user agent.
    ///
    /// The SEC requires identifying user agent headers. Format should be:
    /// "AppName/Version (contact@email.com)"
    ///
    /// # Errors
    /// [`FactsError::InvalidParameter`] if the HTTP client cannot be built
    /// with this user agent.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = build_client(user_agent).map_err(|e| {
            FactsError::InvalidParameter(format!("Failed to build HTTP client: {e}"))
        })?;
        Ok(Self::with_client(client))
    }

    /// Create a source with a pre-configured client.
    ///
    /// The client must already send an identifying user agent.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(DEFAULT_RATE_LIMIT))),
            base_url: EDGAR_BASE_URL.to_string(),
        }
    }

    /// Points the source at another host serving the same API.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// URL of the companyfacts document for an entity.
    #[must_use]
    pub fn company_facts_url(&self, canonical_id: &Cik) -> String {
        format!(
            "{}/api/xbrl/companyfacts/CIK{}.json",
            self.base_url.trim_end_matches('/'),
            canonical_id.as_str()
        )
    }
}

#[async_trait]
impl FactsSource for EdgarFactsSource {
    fn name(&self) -> &str {
        "SEC EDGAR"
    }

    #[instrument(skip(self), fields(canonical_id = %canonical_id))]
    async fn fetch_company_facts(
        &self,
        canonical_id: &Cik,
        force_refresh: bool,
    ) -> std::result::Result<Vec<Fact>, FetchError> {
        self.rate_limiter.lock().await.wait().await;

        let url = self.company_facts_url(canonical_id);
        debug!("Fetching company facts from {}", url);

        let mut request = self.client.get(&url);
        if force_refresh {
            request = request.header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(DEFAULT_HTTP_TIMEOUT)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        // Registrants that never filed XBRL have no companyfacts document.
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No company facts published");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        parse_company_facts(canonical_id, &body)
    }
}

/// The SEC `company_tickers.json` table, fetched over HTTP.
#[derive(Debug, Clone)]
pub struct EdgarTickerTable {
    client: reqwest::Client,
    url: String,
}

impl EdgarTickerTable {
    /// Create a table reader with the specified user agent.
    ///
    /// # Errors
    /// [`FactsError::InvalidParameter`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = build_client(user_agent).map_err(|e| {
            FactsError::InvalidParameter(format!("Failed to build HTTP client: {e}"))
        })?;
        Ok(Self::with_client(client))
    }

    /// Create a table reader with a pre-configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            url: COMPANY_TICKERS_URL.to_string(),
        }
    }

    /// Reads the table from another URL serving the same format.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl IdentifierTable for EdgarTickerTable {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn load_identifier_table(&self) -> Result<Vec<IdentifierRow>> {
        debug!("Fetching company tickers from SEC");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FactsError::Table(format!("Failed to fetch company tickers: {e}")))?;

        if !response.status().is_success() {
            return Err(FactsError::Table(format!(
                "Failed to fetch company tickers: HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FactsError::Table(format!("Failed to read company tickers: {e}")))?;
        parse_company_tickers(&body)
    }
}
