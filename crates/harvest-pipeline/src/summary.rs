//! Run summary returned to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_types::{IngestionRun, RunStatus};

/// Outcome for one source in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub status: RunStatus,
    pub found: u32,
    pub new: u32,
    pub updated: u32,
    pub rejected: u32,
    pub malformed: u32,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub completed_at: DateTime<Utc>,
}

impl SourceReport {
    /// A source that produced nothing because of `error`.
    pub fn failed(
        source: impl Into<String>,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            source: source.into(),
            status: RunStatus::Failed,
            found: 0,
            new: 0,
            updated: 0,
            rejected: 0,
            malformed: 0,
            duration_ms: elapsed_ms(started_at, completed_at),
            error: Some(error.into()),
            started_at,
            completed_at,
        }
    }

    /// The ledger record for this report.
    pub fn to_run(&self, run_id: &str, keyword: &str, location: &str) -> IngestionRun {
        IngestionRun {
            run_id: run_id.to_string(),
            source: self.source.clone(),
            keyword: keyword.to_string(),
            location: location.to_string(),
            found: self.found,
            new: self.new,
            updated: self.updated,
            rejected: self.rejected,
            malformed: self.malformed,
            status: self.status,
            error: self.error.clone(),
            duration_ms: self.duration_ms,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

pub(crate) fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

/// Aggregate outcome of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub keyword: String,
    pub location: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub total_found: u32,
    pub total_new: u32,
    pub total_updated: u32,
    pub total_rejected: u32,
    pub duplicates_found: usize,
    /// Postings soft-deleted by the capacity ceiling
    pub deactivated: usize,
}

impl RunSummary {
    pub fn new(
        run_id: impl Into<String>,
        keyword: impl Into<String>,
        location: impl Into<String>,
        started_at: DateTime<Utc>,
        sources: Vec<SourceReport>,
    ) -> Self {
        let total_found = sources.iter().map(|s| s.found).sum();
        let total_new = sources.iter().map(|s| s.new).sum();
        let total_updated = sources.iter().map(|s| s.updated).sum();
        let total_rejected = sources.iter().map(|s| s.rejected).sum();
        Self {
            run_id: run_id.into(),
            keyword: keyword.into(),
            location: location.into(),
            started_at,
            completed_at: Utc::now(),
            sources,
            total_found,
            total_new,
            total_updated,
            total_rejected,
            duplicates_found: 0,
            deactivated: 0,
        }
    }

    pub fn source(&self, id: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == id)
    }

    /// `Success` if every source succeeded, `Failed` if none did.
    pub fn status(&self) -> RunStatus {
        if self.sources.iter().all(|s| s.status == RunStatus::Success) {
            RunStatus::Success
        } else if self.sources.iter().all(|s| s.status == RunStatus::Failed) {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        }
    }

    pub fn duration_ms(&self) -> u64 {
        elapsed_ms(self.started_at, self.completed_at)
    }
}
