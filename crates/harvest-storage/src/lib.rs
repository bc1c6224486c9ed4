//! Storage layer for job-harvest.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for postings, the URL index and run records
//! - Atomic per-batch writes via WriteBatch, so a failed batch leaves no trace
//! - Uniqueness of canonical URLs enforced at commit time
//! - Time-prefixed run keys for newest-first history scans

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod store;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{PostingKey, RunKey, UrlKey};
pub use store::PostingStore;
