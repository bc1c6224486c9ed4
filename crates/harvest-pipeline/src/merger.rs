//! Upsert of normalized postings keyed by canonical URL.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};

use harvest_storage::PostingStore;
use harvest_types::{Posting, RawPosting, RunStatus};

/// Outcome of merging one source batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub new: u32,
    pub updated: u32,
    /// `Partial` when the batch commit failed or an item could not be merged
    pub status: RunStatus,
    pub error: Option<String>,
}

impl MergeOutcome {
    fn success(new: u32, updated: u32) -> Self {
        Self {
            new,
            updated,
            status: RunStatus::Success,
            error: None,
        }
    }
}

/// Writes source batches into the store.
///
/// An existing posting keeps its id, `created_at`, `is_active`,
/// `is_duplicate`, `duplicate_of` and `view_count`; everything else is
/// overwritten from the fresh scrape. The whole batch is committed
/// atomically.
pub struct PersistenceMerger {
    store: Arc<dyn PostingStore>,
}

impl PersistenceMerger {
    pub fn new(store: Arc<dyn PostingStore>) -> Self {
        Self { store }
    }

    /// Merge one batch.
    ///
    /// A lookup failure for one item skips that item and marks the outcome
    /// partial. A commit failure rolls back the whole batch and reports zero
    /// new and updated.
    pub fn merge(&self, postings: Vec<RawPosting>) -> MergeOutcome {
        if postings.is_empty() {
            return MergeOutcome::success(0, 0);
        }

        let now = Utc::now();
        let mut staged: Vec<Posting> = Vec::with_capacity(postings.len());
        let mut by_url: HashMap<String, usize> = HashMap::new();
        let mut new = 0u32;
        let mut updated = 0u32;
        let mut item_errors = 0usize;

        for raw in postings {
            // Repeated URL within one batch: later item wins, counted once
            if let Some(&index) = by_url.get(&raw.canonical_url) {
                staged[index].apply_rescrape(raw, now);
                continue;
            }

            let url = raw.canonical_url.clone();
            let posting = match self.store.posting_by_url(&url) {
                Ok(Some(mut existing)) => {
                    existing.apply_rescrape(raw, now);
                    updated += 1;
                    existing
                }
                Ok(None) => {
                    new += 1;
                    Posting::from_raw(self.store.next_posting_id(), raw, now)
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping posting, lookup failed");
                    item_errors += 1;
                    continue;
                }
            };

            by_url.insert(url, staged.len());
            staged.push(posting);
        }

        if !staged.is_empty() {
            if let Err(e) = self.store.commit_postings(&staged) {
                error!(error = %e, batch = staged.len(), "Batch commit failed, rolled back");
                return MergeOutcome {
                    new: 0,
                    updated: 0,
                    status: RunStatus::Partial,
                    error: Some(format!("batch commit failed: {e}")),
                };
            }
        }

        debug!(new, updated, item_errors, "Batch merged");

        let mut outcome = MergeOutcome::success(new, updated);
        if item_errors > 0 {
            outcome.status = RunStatus::Partial;
            outcome.error = Some(format!("{item_errors} postings could not be merged"));
        }
        outcome
    }
}
