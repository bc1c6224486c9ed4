//! Append-only record of per-source run outcomes.

use std::sync::Arc;

use tracing::{debug, warn};

use harvest_storage::PostingStore;
use harvest_types::IngestionRun;

use crate::error::PipelineError;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Writes run records. Ingestion never reads them back.
pub struct RunLedger {
    store: Arc<dyn PostingStore>,
}

impl RunLedger {
    pub fn new(store: Arc<dyn PostingStore>) -> Self {
        Self { store }
    }

    /// Append a record. A failed write is logged and otherwise ignored.
    pub fn record(&self, run: &IngestionRun) -> bool {
        match self.store.append_run(run) {
            Ok(()) => {
                debug!(run_id = %run.run_id, source = %run.source, status = %run.status, "Run recorded");
                true
            }
            Err(e) => {
                warn!(run_id = %run.run_id, source = %run.source, error = %e, "Failed to record run");
                false
            }
        }
    }

    /// Most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<IngestionRun>, PipelineError> {
        Ok(self.store.recent_runs(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyStore;
    use chrono::{Duration, Utc};
    use harvest_types::RunStatus;
    use tempfile::TempDir;

    fn run(source: &str, minutes_ago: i64) -> IngestionRun {
        let started_at = Utc::now() - Duration::minutes(minutes_ago);
        IngestionRun {
            run_id: ulid::Ulid::new().to_string(),
            source: source.to_string(),
            keyword: "Data Scientist".to_string(),
            location: "Berlin".to_string(),
            found: 3,
            new: 2,
            updated: 1,
            rejected: 0,
            malformed: 0,
            status: RunStatus::Success,
            error: None,
            duration_ms: 1200,
            started_at,
            completed_at: started_at + Duration::seconds(1),
        }
    }

    #[test]
    fn test_record_and_recent() {
        let dir = TempDir::new().unwrap();
        let ledger = RunLedger::new(Arc::new(FlakyStore::open(dir.path())));

        assert!(ledger.record(&run("a", 30)));
        assert!(ledger.record(&run("b", 10)));
        assert!(ledger.record(&run("c", 20)));

        let recent = ledger.recent(2).unwrap();
        let sources: Vec<_> = recent.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["b", "c"]);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FlakyStore::open(dir.path()));
        store.fail_runs(true);
        let ledger = RunLedger::new(store);

        assert!(!ledger.record(&run("a", 1)));
        assert!(ledger.recent(DEFAULT_HISTORY_LIMIT).unwrap().is_empty());
    }
}
