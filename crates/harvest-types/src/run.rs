//! Ingestion run records.
//!
//! One `IngestionRun` is appended per (source, run). Records are immutable
//! once written and exist for observability only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one source within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Fetched, filtered and committed without error
    Success,
    /// Fetched, but the persistence batch was rolled back
    Partial,
    /// The adapter could not produce a result
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger record for one source in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRun {
    /// Run identifier (ULID string), shared by every source of the same run
    pub run_id: String,
    pub source: String,
    pub keyword: String,
    pub location: String,

    /// Valid postings returned by the adapter
    pub found: u32,
    /// Postings inserted for the first time
    pub new: u32,
    /// Existing postings overwritten by a rescrape
    pub updated: u32,
    /// Postings excluded by the content filter
    #[serde(default)]
    pub rejected: u32,
    /// Raw items dropped during normalization
    #[serde(default)]
    pub malformed: u32,

    pub status: RunStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
}

impl IngestionRun {
    /// Serialize run to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize run from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Start time as milliseconds since Unix epoch
    pub fn started_ms(&self) -> i64 {
        self.started_at.timestamp_millis()
    }
}
