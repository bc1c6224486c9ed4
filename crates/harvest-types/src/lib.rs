//! # harvest-types
//!
//! Shared domain types for the job-harvest ingestion pipeline.
//!
//! - Postings: normalized job advertisements and their adapter-side form
//! - Runs: per-source ingestion outcomes recorded in the run ledger
//! - Queries: ingestion requests and listing filters
//! - Settings: layered configuration

pub mod config;
pub mod error;
pub mod posting;
pub mod query;
pub mod run;

pub use config::{
    ArbeitnowSettings, ArbeitsagenturSettings, FilterSettings, JoobleSettings, ScheduleSettings,
    Settings, SourceSettings,
};
pub use error::HarvestError;
pub use posting::{Posting, PostingId, RawPosting};
pub use query::{PostingPage, PostingQuery, SearchQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use run::{IngestionRun, RunStatus};
