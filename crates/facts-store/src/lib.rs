#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/facts/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! In-memory facts store with on-demand refresh.
//!
//! This crate provides the stateful half of the system:
//!
//! - [`IdentifierResolver`] - Lazily loaded ticker and CIK lookup
//! - [`FactsStore`] - Per-entity fact timelines, refreshed when stale
//! - [`StaticTable`] / [`JsonFileTable`] - Identifier tables from memory or disk
//! - [`Timeline`] - Ordered facts for one (entity, concept) pair

/// Clock abstraction used for staleness checks.
pub mod clock;
/// Store configuration.
pub mod config;
/// Entity and concept indices.
pub mod index;
/// Ticker and canonical identifier resolution.
pub mod resolver;
mod single_flight;
/// The facts store.
pub mod store;
/// Identifier table implementations.
pub mod table;
/// Per-concept fact timelines and selection rules.
pub mod timeline;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::StoreConfig;
pub use index::{CompanyMetadata, EntityFacts, StoreStats};
pub use resolver::{IdentifierResolver, MappingTable};
pub use store::{DEFAULT_SERIES_LIMIT, FactQuery, FactsStore, SeriesQuery};
pub use table::{JsonFileTable, StaticTable};
pub use timeline::{Timeline, matches_cadence};
