//! Test helpers: posting builders and a store that fails on demand.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use harvest_storage::{PostingStore, Storage, StorageError};
use harvest_types::{IngestionRun, Posting, PostingId, RawPosting};

pub fn raw(source: &str, url: &str) -> RawPosting {
    raw_titled(source, url, "Data Engineer", Utc::now())
}

pub fn raw_titled(source: &str, url: &str, title: &str, posted_at: DateTime<Utc>) -> RawPosting {
    RawPosting {
        title: title.to_string(),
        company: "Acme GmbH".to_string(),
        location: "Berlin".to_string(),
        description: "Build data pipelines".to_string(),
        canonical_url: url.to_string(),
        source: source.to_string(),
        requirements: None,
        benefits: None,
        salary: None,
        job_type: None,
        contract_type: None,
        remote_type: None,
        experience_level: None,
        deadline_at: None,
        posted_at,
        scraped_at: Utc::now(),
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// Wraps [`Storage`] and injects failures.
pub struct FlakyStore {
    inner: Storage,
    fail_commits: AtomicBool,
    fail_reads: AtomicBool,
    fail_runs: AtomicBool,
    bad_urls: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn open(path: &Path) -> Self {
        Self {
            inner: Storage::open(path).unwrap(),
            fail_commits: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_runs: AtomicBool::new(false),
            bad_urls: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Make scans and counts fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_runs(&self, fail: bool) {
        self.fail_runs.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookup_for(&self, url: &str) {
        self.bad_urls.lock().unwrap().insert(url.to_string());
    }

    fn injected(what: &str) -> StorageError {
        StorageError::Unavailable(format!("injected {what} failure"))
    }
}

impl PostingStore for FlakyStore {
    fn get_posting(&self, id: PostingId) -> Result<Option<Posting>, StorageError> {
        self.inner.get_posting(id)
    }

    fn posting_by_url(&self, url: &str) -> Result<Option<Posting>, StorageError> {
        if self.bad_urls.lock().unwrap().contains(url) {
            return Err(Self::injected("lookup"));
        }
        self.inner.posting_by_url(url)
    }

    fn next_posting_id(&self) -> PostingId {
        self.inner.next_posting_id()
    }

    fn commit_postings(&self, postings: &[Posting]) -> Result<(), StorageError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::Conflict("injected commit failure".to_string()));
        }
        self.inner.commit_postings(postings)
    }

    fn scan_postings(&self) -> Result<Vec<Posting>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("scan"));
        }
        self.inner.scan_postings()
    }

    fn count_active(&self) -> Result<usize, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("count"));
        }
        self.inner.count_active()
    }

    fn append_run(&self, run: &IngestionRun) -> Result<(), StorageError> {
        if self.fail_runs.load(Ordering::SeqCst) {
            return Err(Self::injected("run append"));
        }
        self.inner.append_run(run)
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<IngestionRun>, StorageError> {
        self.inner.recent_runs(limit)
    }
}
