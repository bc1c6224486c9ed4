//! # harvest-pipeline
//!
//! The ingestion pipeline: for each source, adapter output flows through
//! the [`ContentFilter`] into the [`PersistenceMerger`]; once every source
//! is committed the [`DeduplicationEngine`] and [`CapacityManager`] run over
//! the whole corpus. The [`Orchestrator`] drives a run and returns a
//! [`RunSummary`]; each source outcome is appended to the [`RunLedger`].

pub mod capacity;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod merger;
pub mod orchestrator;
pub mod summary;

#[cfg(test)]
mod testing;

pub use capacity::{CapacityManager, CapacityReport, DEFAULT_MAX_ACTIVE};
pub use dedup::{
    similarity, DedupReport, DeduplicationEngine, DuplicateMatch, MergeReport,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use error::PipelineError;
pub use filter::{
    ContentFilter, FilterOutcome, FilterRule, InternshipRule, JobTypeRule,
    LanguageRequirementRule, Rejection,
};
pub use ledger::{RunLedger, DEFAULT_HISTORY_LIMIT};
pub use merger::{MergeOutcome, PersistenceMerger};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use summary::{RunSummary, SourceReport};
