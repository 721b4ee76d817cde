#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/facts/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Point-in-time financial facts with on-demand refresh.
//!
//! This crate re-exports the core types, the store and, with the `edgar`
//! feature, the SEC EDGAR collaborators. [`FactsStoreBuilder`] wires them
//! together.
//!
//! # Features
//!
//! - `edgar` - SEC EDGAR facts source and ticker table (default)
//!
//! # Example
//!
//! ```no_run
//! use facts::{FactsStoreBuilder, Frequency};
//!
//! #[tokio::main]
//! async fn main() -> facts::Result<()> {
//!     let store = FactsStoreBuilder::new()
//!         .with_edgar("MyApp/1.0 (contact@example.com)")?
//!         .build()?;
//!
//!     let served = store
//!         .get_fact("AMD", "us-gaap:Revenues", "latest", Frequency::Quarterly)
//!         .await?;
//!     println!("{:?} (stale: {})", served.data(), served.is_stale());
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use facts_core::*;

// Store
pub use facts_store::{
    Clock, CompanyMetadata, DEFAULT_SERIES_LIMIT, EntityFacts, FactQuery, FactsStore, FixedClock,
    IdentifierResolver, JsonFileTable, MappingTable, SeriesQuery, StaticTable, StoreConfig,
    StoreStats, SystemClock, Timeline,
};

// Collaborators
#[cfg(feature = "edgar")]
pub use facts_edgar::{EdgarFactsSource, EdgarTickerTable};

mod builder;
pub use builder::FactsStoreBuilder;
