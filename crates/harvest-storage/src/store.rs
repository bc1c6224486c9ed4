//! The store interface the pipeline depends on.
//!
//! `Storage` is the RocksDB implementation. The trait exists so the pipeline
//! can be driven against wrappers that inject failures.

use harvest_types::{IngestionRun, Posting, PostingId, PostingPage, PostingQuery};

use crate::error::StorageError;

/// Persistence operations for postings and run records.
pub trait PostingStore: Send + Sync {
    /// Get a posting by surrogate id.
    fn get_posting(&self, id: PostingId) -> Result<Option<Posting>, StorageError>;

    /// Look up a posting through the canonical URL index.
    fn posting_by_url(&self, url: &str) -> Result<Option<Posting>, StorageError>;

    /// Allocate the next surrogate id.
    ///
    /// Ids increase monotonically; an id allocated for a batch that is later
    /// rolled back is never reused.
    fn next_posting_id(&self) -> PostingId;

    /// Write a batch of new or updated postings atomically.
    ///
    /// Fails with `StorageError::Conflict` without writing anything if any
    /// canonical URL in the batch is already indexed under a different id,
    /// or appears twice in the batch with different ids.
    fn commit_postings(&self, postings: &[Posting]) -> Result<(), StorageError>;

    /// All postings in insertion (id) order.
    fn scan_postings(&self) -> Result<Vec<Posting>, StorageError>;

    /// Append an immutable run record.
    fn append_run(&self, run: &IngestionRun) -> Result<(), StorageError>;

    /// Most recent run records, newest first.
    fn recent_runs(&self, limit: usize) -> Result<Vec<IngestionRun>, StorageError>;

    /// Number of postings with `is_active = true`, duplicates included.
    fn count_active(&self) -> Result<usize, StorageError> {
        Ok(self
            .scan_postings()?
            .iter()
            .filter(|p| p.is_active)
            .count())
    }

    /// Filtered, paginated listing sorted by `posted_at` descending.
    ///
    /// Ties sort by id descending so the order is stable across pages.
    fn list_postings(&self, query: &PostingQuery) -> Result<PostingPage, StorageError> {
        let mut matching: Vec<Posting> = self
            .scan_postings()?
            .into_iter()
            .filter(|p| query.matches(p))
            .collect();

        matching.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(b.id.cmp(&a.id)));

        let total = matching.len();
        let postings = matching
            .into_iter()
            .skip(query.offset())
            .take(query.effective_page_size() as usize)
            .collect();

        Ok(PostingPage {
            postings,
            total,
            page: query.effective_page(),
            page_size: query.effective_page_size(),
        })
    }

    /// Fetch a posting for display and bump its view counter.
    fn record_view(&self, id: PostingId) -> Result<Option<Posting>, StorageError> {
        let Some(mut posting) = self.get_posting(id)? else {
            return Ok(None);
        };
        posting.view_count += 1;
        self.commit_postings(std::slice::from_ref(&posting))?;
        Ok(Some(posting))
    }
}
