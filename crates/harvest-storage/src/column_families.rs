//! Column family definitions for RocksDB.
//!
//! - postings: Posting rows keyed by surrogate id (default compaction)
//! - posting_urls: canonical_url -> id index (default compaction)
//! - runs: Append-only ingestion run records (compressed)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for posting rows
pub const CF_POSTINGS: &str = "postings";

/// Column family name for the canonical URL index
pub const CF_POSTING_URLS: &str = "posting_urls";

/// Column family name for ingestion run records
pub const CF_RUNS: &str = "runs";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_POSTINGS, CF_POSTING_URLS, CF_RUNS];

/// Create column family options for postings (large JSON rows, compressed)
fn postings_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Create column family options for runs (append-only, compressed)
fn runs_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_POSTINGS, postings_options()),
        ColumnFamilyDescriptor::new(CF_POSTING_URLS, Options::default()),
        ColumnFamilyDescriptor::new(CF_RUNS, runs_options()),
    ]
}
