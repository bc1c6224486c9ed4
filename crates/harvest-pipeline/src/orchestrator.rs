//! Drives one ingestion run.
//!
//! Sources are processed one at a time. Each adapter call runs on its own
//! task under a timeout, so an error, a panic or a stall fails only that
//! source. Deduplication and capacity enforcement run once, after every
//! source batch has been committed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use ulid::Ulid;

use harvest_adapters::SourceRegistry;
use harvest_storage::PostingStore;
use harvest_types::{RunStatus, SearchQuery, Settings};

use crate::capacity::{CapacityManager, DEFAULT_MAX_ACTIVE};
use crate::dedup::{DeduplicationEngine, DEFAULT_SIMILARITY_THRESHOLD};
use crate::error::PipelineError;
use crate::filter::ContentFilter;
use crate::ledger::RunLedger;
use crate::merger::PersistenceMerger;
use crate::summary::{elapsed_ms, RunSummary, SourceReport};

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sources used when a query names none
    pub default_sources: Vec<String>,
    pub source_timeout: Duration,
    pub max_active_postings: usize,
    pub similarity_threshold: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_sources: Vec::new(),
            source_timeout: Duration::from_secs(600),
            max_active_postings: DEFAULT_MAX_ACTIVE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_sources: settings.default_sources.clone(),
            source_timeout: Duration::from_secs(settings.source_timeout_secs),
            max_active_postings: settings.max_active_postings,
            similarity_threshold: settings.similarity_threshold,
        }
    }
}

/// Runs ingestion for a query across sources.
pub struct Orchestrator {
    registry: SourceRegistry,
    store: Arc<dyn PostingStore>,
    filter: ContentFilter,
    merger: PersistenceMerger,
    dedup: DeduplicationEngine,
    capacity: CapacityManager,
    ledger: RunLedger,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: SourceRegistry,
        store: Arc<dyn PostingStore>,
        filter: ContentFilter,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            merger: PersistenceMerger::new(store.clone()),
            dedup: DeduplicationEngine::new(store.clone(), config.similarity_threshold),
            capacity: CapacityManager::new(store.clone(), config.max_active_postings),
            ledger: RunLedger::new(store.clone()),
            registry,
            store,
            filter,
            config,
        }
    }

    /// Build every component from settings.
    pub fn from_settings(
        settings: &Settings,
        registry: SourceRegistry,
        store: Arc<dyn PostingStore>,
    ) -> Result<Self, PipelineError> {
        let filter = ContentFilter::from_settings(&settings.filter)?;
        Ok(Self::new(
            registry,
            store,
            filter,
            OrchestratorConfig::from_settings(settings),
        ))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn dedup(&self) -> &DeduplicationEngine {
        &self.dedup
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Source ids for a query, in request order with repeats removed.
    pub fn resolve_sources(&self, query: &SearchQuery) -> Vec<String> {
        let requested = query
            .sources
            .as_ref()
            .filter(|sources| !sources.is_empty())
            .unwrap_or(&self.config.default_sources);

        let mut seen = HashSet::new();
        requested
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect()
    }

    /// Run ingestion for one query.
    ///
    /// Always returns a summary once the store health check passes; source
    /// failures are reported per source. Errors only when the store fails
    /// the health check or during deduplication or capacity enforcement.
    pub async fn run(&self, query: &SearchQuery) -> Result<RunSummary, PipelineError> {
        let run_id = Ulid::new().to_string();
        let started_at = Utc::now();

        let active = self.store.count_active().map_err(|e| {
            error!(run_id = %run_id, error = %e, "Store health check failed");
            PipelineError::HealthCheck(e)
        })?;

        let sources = self.resolve_sources(query);
        info!(
            run_id = %run_id,
            keyword = %query.keyword,
            location = %query.location,
            sources = ?sources,
            active,
            "Starting ingestion run"
        );

        let mut reports = Vec::with_capacity(sources.len());
        for source_id in &sources {
            let report = self.run_source(source_id, query).await;
            self.ledger
                .record(&report.to_run(&run_id, &query.keyword, &query.location));
            reports.push(report);
        }

        let dedup = self.dedup.run()?;
        let capacity = self.capacity.enforce()?;

        let mut summary = RunSummary::new(
            run_id,
            query.keyword.clone(),
            query.location.clone(),
            started_at,
            reports,
        );
        summary.duplicates_found = dedup.duplicates_found();
        summary.deactivated = capacity.deactivated.len();

        info!(
            run_id = %summary.run_id,
            status = %summary.status(),
            found = summary.total_found,
            new = summary.total_new,
            updated = summary.total_updated,
            rejected = summary.total_rejected,
            duplicates = summary.duplicates_found,
            deactivated = summary.deactivated,
            duration_ms = summary.duration_ms(),
            "Ingestion run complete"
        );
        Ok(summary)
    }

    async fn run_source(&self, source_id: &str, query: &SearchQuery) -> SourceReport {
        let started_at = Utc::now();

        let Some(adapter) = self.registry.get(source_id) else {
            warn!(source = %source_id, "Unknown source");
            return SourceReport::failed(source_id, format!("unknown source '{source_id}'"), started_at);
        };
        if !adapter.is_available() {
            warn!(source = %source_id, "Source not available");
            return SourceReport::failed(
                source_id,
                format!("source '{source_id}' is not available (check its configuration)"),
                started_at,
            );
        }

        let task = {
            let adapter = adapter.clone();
            let query = query.clone();
            tokio::spawn(async move { adapter.scrape(&query).await })
        };
        let abort = task.abort_handle();

        let batch = match tokio::time::timeout(self.config.source_timeout, task).await {
            Ok(Ok(Ok(batch))) => batch,
            Ok(Ok(Err(e))) => {
                error!(source = %source_id, error = %e, "Source failed");
                return SourceReport::failed(source_id, e.to_string(), started_at);
            }
            Ok(Err(join_error)) => {
                error!(source = %source_id, error = %join_error, "Source task aborted");
                return SourceReport::failed(
                    source_id,
                    format!("adapter task failed: {join_error}"),
                    started_at,
                );
            }
            Err(_) => {
                abort.abort();
                error!(
                    source = %source_id,
                    timeout_secs = self.config.source_timeout.as_secs(),
                    "Source timed out"
                );
                return SourceReport::failed(
                    source_id,
                    format!("timed out after {}s", self.config.source_timeout.as_secs_f64()),
                    started_at,
                );
            }
        };

        let found = batch.found() as u32;
        let malformed = batch.malformed as u32;
        let filtered = self.filter.apply(batch.postings);
        let rejected = filtered.rejected() as u32;
        let merged = self.merger.merge(filtered.accepted);

        let completed_at = Utc::now();
        let report = SourceReport {
            source: source_id.to_string(),
            status: merged.status,
            found,
            new: merged.new,
            updated: merged.updated,
            rejected,
            malformed,
            duration_ms: elapsed_ms(started_at, completed_at),
            error: merged.error,
            started_at,
            completed_at,
        };

        if report.status == RunStatus::Success {
            info!(
                source = %source_id,
                found,
                new = report.new,
                updated = report.updated,
                rejected,
                malformed,
                "Source complete"
            );
        } else {
            warn!(source = %source_id, status = %report.status, error = ?report.error, "Source incomplete");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyStore;
    use harvest_adapters::{ScrapedItem, StaticSource};
    use harvest_storage::Storage;
    use harvest_types::FilterSettings;
    use tempfile::TempDir;

    fn item(url: &str, title: &str) -> ScrapedItem {
        ScrapedItem::new(title, "Acme GmbH", "Berlin", "Build things", url)
    }

    fn orchestrator(store: Arc<dyn PostingStore>, registry: SourceRegistry) -> Orchestrator {
        let config = OrchestratorConfig {
            default_sources: vec!["alpha".to_string(), "beta".to_string()],
            source_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let filter = ContentFilter::from_settings(&FilterSettings::default()).unwrap();
        Orchestrator::new(registry, store, filter, config)
    }

    fn storage() -> (TempDir, Arc<Storage>) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        (dir, storage)
    }

    #[test]
    fn test_resolve_sources() {
        let (_dir, store) = storage();
        let orch = orchestrator(store, SourceRegistry::new());

        let query = SearchQuery::new("k", "l");
        assert_eq!(orch.resolve_sources(&query), vec!["alpha", "beta"]);

        let query = query.with_sources(["Beta", "alpha", "beta", " "]);
        assert_eq!(orch.resolve_sources(&query), vec!["beta", "alpha"]);
    }

    #[tokio::test]
    async fn test_run_counts_and_records() {
        let (_dir, store) = storage();
        let registry = SourceRegistry::new()
            .with(StaticSource::new(
                "alpha",
                vec![
                    item("https://a/1", "Data Scientist"),
                    item("https://a/2", "Software Engineering Intern"),
                    item("", "No URL"),
                ],
            ))
            .with(StaticSource::new("beta", vec![item("https://b/1", "Backend Developer")]));
        let orch = orchestrator(store.clone(), registry);

        let summary = orch.run(&SearchQuery::new("data", "Berlin")).await.unwrap();

        let alpha = summary.source("alpha").unwrap();
        assert_eq!(alpha.status, RunStatus::Success);
        assert_eq!(alpha.found, 2);
        assert_eq!(alpha.new, 1);
        assert_eq!(alpha.rejected, 1);
        assert_eq!(alpha.malformed, 1);
        assert_eq!(summary.total_new, 2);
        assert_eq!(store.count_active().unwrap(), 2);

        let runs = orch.ledger().recent(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.run_id == summary.run_id));
    }

    #[tokio::test]
    async fn test_unknown_and_unavailable_sources_fail() {
        let (_dir, store) = storage();
        let registry = SourceRegistry::new()
            .with(StaticSource::new("alpha", vec![item("https://a/1", "Dev")]).unavailable());
        let orch = orchestrator(store, registry);

        let query = SearchQuery::new("dev", "Berlin").with_sources(["alpha", "nope"]);
        let summary = orch.run(&query).await.unwrap();

        assert_eq!(summary.status(), RunStatus::Failed);
        assert!(summary.source("alpha").unwrap().error.as_ref().unwrap().contains("not available"));
        assert!(summary.source("nope").unwrap().error.as_ref().unwrap().contains("unknown source"));
    }

    #[tokio::test]
    async fn test_failed_source_isolated() {
        let (_dir, store) = storage();
        let registry = SourceRegistry::new()
            .with(StaticSource::failing("alpha", "connection reset"))
            .with(StaticSource::new("beta", vec![item("https://b/1", "Dev")]));
        let orch = orchestrator(store.clone(), registry);

        let summary = orch.run(&SearchQuery::new("dev", "Berlin")).await.unwrap();
        assert_eq!(summary.source("alpha").unwrap().status, RunStatus::Failed);
        assert_eq!(summary.source("alpha").unwrap().found, 0);
        assert_eq!(summary.source("beta").unwrap().status, RunStatus::Success);
        assert_eq!(summary.status(), RunStatus::Partial);
        assert!(store.posting_by_url("https://b/1").unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let (_dir, store) = storage();
        let registry = SourceRegistry::new()
            .with(
                StaticSource::new("alpha", vec![item("https://a/1", "Dev")])
                    .with_delay(Duration::from_secs(60)),
            )
            .with(StaticSource::new("beta", vec![item("https://b/1", "Dev Ops")]));
        let orch = orchestrator(store.clone(), registry);

        let summary = orch.run(&SearchQuery::new("dev", "Berlin")).await.unwrap();
        let alpha = summary.source("alpha").unwrap();
        assert_eq!(alpha.status, RunStatus::Failed);
        assert!(alpha.error.as_ref().unwrap().contains("timed out"));
        assert!(store.posting_by_url("https://a/1").unwrap().is_none());
        assert_eq!(summary.source("beta").unwrap().new, 1);
    }

    #[tokio::test]
    async fn test_health_check_aborts_before_adapters() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FlakyStore::open(dir.path()));
        store.fail_reads(true);
        let source = Arc::new(StaticSource::new("alpha", vec![item("https://a/1", "Dev")]));
        let mut registry = SourceRegistry::new();
        registry.register(source.clone());
        let orch = orchestrator(store, registry);

        let result = orch.run(&SearchQuery::new("dev", "Berlin")).await;
        assert!(matches!(result, Err(PipelineError::HealthCheck(_))));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_ledger_failure_does_not_change_outcome() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FlakyStore::open(dir.path()));
        store.fail_runs(true);
        let registry =
            SourceRegistry::new().with(StaticSource::new("alpha", vec![item("https://a/1", "Dev")]));
        let orch = orchestrator(store, registry);

        let query = SearchQuery::new("dev", "Berlin").with_sources(["alpha"]);
        let summary = orch.run(&query).await.unwrap();
        assert_eq!(summary.status(), RunStatus::Success);
        assert_eq!(summary.total_new, 1);
    }
}
