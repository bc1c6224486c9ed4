//! RocksDB wrapper for job-harvest storage.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Atomic posting batches (rows + URL index in one WriteBatch)
//! - Append-only run records
//! - Admin stats and compaction

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info};

use harvest_types::{IngestionRun, Posting, PostingId};

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_POSTINGS, CF_POSTING_URLS, CF_RUNS};
use crate::error::StorageError;
use crate::keys::{decode_id, encode_id, PostingKey, RunKey, UrlKey};
use crate::store::PostingStore;

/// Main storage interface for job-harvest
pub struct Storage {
    db: DB,
    /// Next posting id; ids start at 1
    posting_sequence: AtomicU64,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        // Initialize id sequence from highest existing key
        let posting_sequence = Self::load_posting_sequence(&db)?;

        Ok(Self {
            db,
            posting_sequence: AtomicU64::new(posting_sequence),
        })
    }

    /// Load the next posting id from the highest stored key
    fn load_posting_sequence(db: &DB) -> Result<u64, StorageError> {
        let cf = db
            .cf_handle(CF_POSTINGS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_POSTINGS.to_string()))?;

        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            let posting_key = PostingKey::from_bytes(&key)?;
            return Ok(posting_key.id + 1);
        }
        Ok(1)
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    // ===== Admin Operations =====

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        info!("Starting full compaction...");
        self.db.compact_range::<&[u8], &[u8]>(None, None);

        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Trigger compaction on a specific column family.
    pub fn compact_cf(&self, cf_name: &str) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        info!(cf = %cf_name, "Starting compaction...");
        self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
        info!(cf = %cf_name, "Compaction complete");
        Ok(())
    }

    /// Get corpus and database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats::default();

        for posting in self.scan_postings()? {
            stats.posting_count += 1;
            if posting.is_duplicate {
                stats.duplicate_count += 1;
            }
            if posting.is_active {
                stats.active_count += 1;
                *stats.active_by_source.entry(posting.source).or_insert(0) += 1;
            }
        }

        stats.run_count = self.count_cf_entries(self.cf(CF_RUNS)?)?;
        stats.disk_usage_bytes = self.get_disk_usage()?;

        Ok(stats)
    }

    fn count_cf_entries(&self, cf: &rocksdb::ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        for item in iter {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> Result<u64, StorageError> {
        let path = self.db.path();
        let mut total_size = 0u64;

        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }
}

impl PostingStore for Storage {
    fn get_posting(&self, id: PostingId) -> Result<Option<Posting>, StorageError> {
        let cf = self.cf(CF_POSTINGS)?;
        match self.db.get_cf(cf, PostingKey::new(id).to_bytes())? {
            Some(bytes) => Ok(Some(Posting::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn posting_by_url(&self, url: &str) -> Result<Option<Posting>, StorageError> {
        let urls_cf = self.cf(CF_POSTING_URLS)?;
        match self.db.get_cf(urls_cf, UrlKey::new(url).to_bytes())? {
            Some(bytes) => self.get_posting(decode_id(&bytes)?),
            None => Ok(None),
        }
    }

    fn next_posting_id(&self) -> PostingId {
        self.posting_sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn commit_postings(&self, postings: &[Posting]) -> Result<(), StorageError> {
        let postings_cf = self.cf(CF_POSTINGS)?;
        let urls_cf = self.cf(CF_POSTING_URLS)?;

        let mut in_batch: HashMap<&str, PostingId> = HashMap::new();
        let mut batch = WriteBatch::default();

        for posting in postings {
            let url = posting.canonical_url.as_str();
            if let Some(other) = in_batch.insert(url, posting.id) {
                if other != posting.id {
                    return Err(StorageError::Conflict(format!(
                        "{} appears twice in batch (ids {} and {})",
                        url, other, posting.id
                    )));
                }
            }

            let url_key = UrlKey::new(url).to_bytes();
            if let Some(bytes) = self.db.get_cf(urls_cf, &url_key)? {
                let existing = decode_id(&bytes)?;
                if existing != posting.id {
                    return Err(StorageError::Conflict(format!(
                        "{} already belongs to posting {}",
                        url, existing
                    )));
                }
            }

            batch.put_cf(postings_cf, PostingKey::new(posting.id).to_bytes(), posting.to_bytes()?);
            batch.put_cf(urls_cf, url_key, encode_id(posting.id));
        }

        self.db.write(batch)?;
        debug!(count = postings.len(), "Committed posting batch");
        Ok(())
    }

    fn scan_postings(&self) -> Result<Vec<Posting>, StorageError> {
        let cf = self.cf(CF_POSTINGS)?;
        let mut postings = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            postings.push(Posting::from_bytes(&value)?);
        }
        Ok(postings)
    }

    fn append_run(&self, run: &IngestionRun) -> Result<(), StorageError> {
        let cf = self.cf(CF_RUNS)?;
        let key = RunKey::new(run.started_ms());
        self.db.put_cf(cf, key.to_bytes(), run.to_bytes()?)?;
        debug!(run_id = %run.run_id, source = %run.source, "Appended run record");
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<IngestionRun>, StorageError> {
        let cf = self.cf(CF_RUNS)?;
        let mut runs = Vec::with_capacity(limit.min(256));
        for item in self.db.iterator_cf(cf, IteratorMode::End).take(limit) {
            let (_, value) = item?;
            runs.push(IngestionRun::from_bytes(&value)?);
        }
        Ok(runs)
    }

    fn count_active(&self) -> Result<usize, StorageError> {
        let cf = self.cf(CF_POSTINGS)?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            if Posting::from_bytes(&value)?.is_active {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Statistics about the corpus and database.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of postings ever stored
    pub posting_count: u64,
    /// Postings with is_active = true
    pub active_count: u64,
    /// Postings marked as duplicates
    pub duplicate_count: u64,
    /// Active postings per source
    pub active_by_source: BTreeMap<String, u64>,
    /// Number of run records
    pub run_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}
