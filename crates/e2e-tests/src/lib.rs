//! End-to-end test infrastructure for job-harvest.
//!
//! Provides a shared TestHarness over a temporary RocksDB store, builders
//! for scraped items, and a store wrapper that fails on demand.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use harvest_adapters::{ScrapedItem, SourceAdapter, SourceRegistry, StaticSource};
use harvest_pipeline::{ContentFilter, Orchestrator, OrchestratorConfig};
use harvest_storage::{PostingStore, Storage, StorageError};
use harvest_types::{FilterSettings, IngestionRun, Posting, PostingId};

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));
        Self {
            _temp_dir: temp_dir,
            storage,
        }
    }

    /// Orchestrator over the harness store with the default filter rules.
    ///
    /// Every given source is a default source, in order.
    pub fn orchestrator(&self, sources: Vec<Arc<dyn SourceAdapter>>) -> Orchestrator {
        self.orchestrator_with(sources, test_config())
    }

    pub fn orchestrator_with(
        &self,
        sources: Vec<Arc<dyn SourceAdapter>>,
        config: OrchestratorConfig,
    ) -> Orchestrator {
        orchestrator_over(self.storage.clone(), sources, config)
    }

    /// Every stored posting in id order.
    pub fn postings(&self) -> Vec<Posting> {
        self.storage.scan_postings().expect("Failed to scan postings")
    }

    /// Active postings that are not duplicates.
    pub fn live(&self) -> Vec<Posting> {
        self.postings().into_iter().filter(|p| p.is_live()).collect()
    }

    pub fn by_url(&self, url: &str) -> Posting {
        self.storage
            .posting_by_url(url)
            .expect("Failed to look up posting")
            .unwrap_or_else(|| panic!("No posting for {url}"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrator config with a short source timeout and the default ceiling.
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        source_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Build an orchestrator over any store.
///
/// `config.default_sources` is replaced by the ids of `sources`.
pub fn orchestrator_over(
    store: Arc<dyn PostingStore>,
    sources: Vec<Arc<dyn SourceAdapter>>,
    mut config: OrchestratorConfig,
) -> Orchestrator {
    let mut registry = SourceRegistry::new();
    config.default_sources = sources.iter().map(|s| s.source_id().to_string()).collect();
    for source in sources {
        registry.register(source);
    }
    let filter =
        ContentFilter::from_settings(&FilterSettings::default()).expect("Default filter rules");
    Orchestrator::new(registry, store, filter, config)
}

/// Upcast static sources for [`TestHarness::orchestrator`].
pub fn sources<const N: usize>(list: [Arc<StaticSource>; N]) -> Vec<Arc<dyn SourceAdapter>> {
    list.into_iter()
        .map(|s| s as Arc<dyn SourceAdapter>)
        .collect()
}

/// Static source returning `items` on every scrape.
pub fn source(id: &str, items: Vec<ScrapedItem>) -> Arc<StaticSource> {
    Arc::new(StaticSource::new(id, items))
}

/// A posting item at Acme GmbH in Berlin.
pub fn item(url: &str, title: &str) -> ScrapedItem {
    ScrapedItem::new(title, "Acme GmbH", "Berlin", "Build and ship data products", url)
}

/// Like [`item`] with a fixed publication time.
pub fn item_posted(url: &str, title: &str, posted_at: DateTime<Utc>) -> ScrapedItem {
    item(url, title).with_posted_at(Some(posted_at))
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}

/// Title and company pairs far enough apart that no two reach the
/// similarity threshold.
const DISTINCT: &[(&str, &str)] = &[
    ("Data Scientist", "Zalando"),
    ("Backend Developer", "N26"),
    ("Site Reliability Engineer", "Delivery Hero"),
    ("Product Designer", "Celonis"),
    ("Frontend Engineer", "Personio"),
    ("Security Analyst", "SAP"),
    ("Database Administrator", "Trivago"),
    ("Mobile Developer", "HelloFresh"),
];

/// The `n`th of a set of mutually distinct items.
pub fn distinct_item(url: &str, n: usize) -> ScrapedItem {
    let (title, company) = DISTINCT[n % DISTINCT.len()];
    ScrapedItem::new(title, company, "Berlin", "Build and ship data products", url)
}

/// Wraps [`Storage`] and injects failures.
pub struct FaultyStore {
    inner: Arc<Storage>,
    failing_sources: Mutex<HashSet<String>>,
    fail_reads: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<Storage>) -> Self {
        Self {
            inner,
            failing_sources: Mutex::new(HashSet::new()),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Reject every commit that contains a posting from `source`.
    pub fn fail_commits_for(&self, source: &str) {
        self.failing_sources
            .lock()
            .unwrap()
            .insert(source.to_string());
    }

    /// Make scans and counts fail, as if the database were gone.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }
}

impl PostingStore for FaultyStore {
    fn get_posting(&self, id: PostingId) -> Result<Option<Posting>, StorageError> {
        self.inner.get_posting(id)
    }

    fn posting_by_url(&self, url: &str) -> Result<Option<Posting>, StorageError> {
        self.inner.posting_by_url(url)
    }

    fn next_posting_id(&self) -> PostingId {
        self.inner.next_posting_id()
    }

    fn commit_postings(&self, postings: &[Posting]) -> Result<(), StorageError> {
        let failing = self.failing_sources.lock().unwrap();
        if let Some(p) = postings.iter().find(|p| failing.contains(&p.source)) {
            return Err(StorageError::Conflict(format!(
                "injected conflict for {}",
                p.canonical_url
            )));
        }
        drop(failing);
        self.inner.commit_postings(postings)
    }

    fn scan_postings(&self) -> Result<Vec<Posting>, StorageError> {
        self.check_reads()?;
        self.inner.scan_postings()
    }

    fn count_active(&self) -> Result<usize, StorageError> {
        self.check_reads()?;
        self.inner.count_active()
    }

    fn append_run(&self, run: &IngestionRun) -> Result<(), StorageError> {
        self.inner.append_run(run)
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<IngestionRun>, StorageError> {
        self.inner.recent_runs(limit)
    }
}
