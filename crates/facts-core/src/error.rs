//! Error types for fact resolution and retrieval.
//!
//! [`FactsError`] is what store and resolver callers see. [`FetchError`] is
//! what a [`FactsSource`](crate::source::FactsSource) reports; it is `Clone`
//! so that every caller waiting on the same refresh can receive it.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while resolving identifiers or serving facts.
#[derive(Error, Debug, Clone)]
pub enum FactsError {
    /// The ticker has no entry in the identifier table.
    #[error("Ticker not found: {0}")]
    TickerNotFound(String),

    /// The canonical identifier has no entry in the identifier table.
    #[error("Identifier not found: {0}")]
    IdentifierNotFound(String),

    /// The external source failed and no cached data was available.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The identifier table could not be loaded.
    #[error("Identifier table error: {0}")]
    Table(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error parsing input data.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FactsError {
    /// Returns true if the error means the requested key does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TickerNotFound(_) | Self::IdentifierNotFound(_))
    }
}

/// Errors reported by an external facts source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection failures, DNS errors, and similar transport problems.
    #[error("Network error: {0}")]
    Network(String),

    /// The source answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The refresh did not complete within the configured bound.
    #[error("Refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The refresh task ended without producing a result.
    #[error("Refresh aborted: {0}")]
    Aborted(String),

    /// Any other source failure.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using [`FactsError`].
pub type Result<T> = std::result::Result<T, FactsError>;
