//! # harvest-adapters
//!
//! Source adapters for job-harvest.
//!
//! Each external job board is wrapped in a [`SourceAdapter`] that fetches
//! raw items for a [`SearchQuery`](harvest_types::SearchQuery) and
//! normalizes them into `RawPosting`s.
//!
//! ## Core Components
//!
//! - [`SourceAdapter`]: Trait every source implements
//! - [`ScrapedItem`]: Item data before normalization
//! - [`SourceRegistry`]: Explicit id -> adapter map built at startup
//! - [`HttpFetcher`]: reqwest client with exponential-backoff retry
//! - [`RequestPacer`]: Randomized delay between requests
//! - [`AdapterError`]: Error types for adapter operations

pub mod adapter;
pub mod config;
pub mod dates;
pub mod error;
pub mod http;
pub mod pacing;
pub mod registry;
pub mod sources;

pub use adapter::{normalize_item, ScrapeBatch, ScrapedItem, SourceAdapter};
pub use config::AdapterConfig;
pub use dates::parse_posted_date;
pub use error::AdapterError;
pub use http::HttpFetcher;
pub use pacing::RequestPacer;
pub use registry::SourceRegistry;
pub use sources::{ArbeitnowAdapter, ArbeitsagenturAdapter, JoobleAdapter, StaticSource};
