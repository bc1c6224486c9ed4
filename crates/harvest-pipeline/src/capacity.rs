//! Corpus size ceiling.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use harvest_storage::PostingStore;
use harvest_types::PostingId;

use crate::error::PipelineError;

pub const DEFAULT_MAX_ACTIVE: usize = 5000;

/// Result of one enforcement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapacityReport {
    pub active_before: usize,
    pub active_after: usize,
    /// Postings soft-deleted, oldest first
    pub deactivated: Vec<PostingId>,
}

/// Soft-deletes the oldest active postings once the active count exceeds
/// the ceiling.
///
/// Duplicates count toward the ceiling like any other active posting.
/// Oldest means earliest `posted_at`, then lowest id.
pub struct CapacityManager {
    store: Arc<dyn PostingStore>,
    max_active: usize,
}

impl CapacityManager {
    pub fn new(store: Arc<dyn PostingStore>, max_active: usize) -> Self {
        Self { store, max_active }
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn enforce(&self) -> Result<CapacityReport, PipelineError> {
        let mut active: Vec<_> = self
            .store
            .scan_postings()?
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        let active_before = active.len();

        if active_before <= self.max_active {
            debug!(active = active_before, max = self.max_active, "Under capacity");
            return Ok(CapacityReport {
                active_before,
                active_after: active_before,
                deactivated: Vec::new(),
            });
        }

        active.sort_by(|a, b| a.posted_at.cmp(&b.posted_at).then(a.id.cmp(&b.id)));
        let excess = active_before - self.max_active;
        let now = Utc::now();
        let evicted: Vec<_> = active
            .into_iter()
            .take(excess)
            .map(|mut p| {
                p.is_active = false;
                p.updated_at = now;
                p
            })
            .collect();

        self.store.commit_postings(&evicted)?;
        info!(
            active_before,
            deactivated = evicted.len(),
            max = self.max_active,
            "Deactivated oldest postings"
        );

        Ok(CapacityReport {
            active_before,
            active_after: active_before - evicted.len(),
            deactivated: evicted.iter().map(|p| p.id).collect(),
        })
    }
}
