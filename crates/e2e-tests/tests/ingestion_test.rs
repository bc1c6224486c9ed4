//! Ingestion E2E tests for job-harvest.
//!
//! Drives full runs through the orchestrator against a real RocksDB store:
//! StaticSource -> ContentFilter -> PersistenceMerger -> dedup -> capacity.

use std::collections::HashSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{days_ago, distinct_item, item, item_posted, source, sources, TestHarness};
use harvest_adapters::{ScrapedItem, StaticSource};
use harvest_storage::PostingStore;
use harvest_types::{RunStatus, SearchQuery};

fn query() -> SearchQuery {
    SearchQuery::new("ML Engineer", "Berlin")
}

/// Two boards list the same role under different URLs; the later one is
/// flagged as a duplicate of the earlier one.
#[tokio::test]
async fn test_berlin_cross_source_duplicate() {
    let harness = TestHarness::new();
    let alpha = source(
        "alpha",
        vec![item_posted("https://alpha.example/jobs/1", "ML Engineer", days_ago(3))],
    );
    let beta = source(
        "beta",
        vec![item_posted("https://beta.example/jobs/9", "ML Engineer", days_ago(1))],
    );
    let orch = harness.orchestrator(sources([alpha, beta]));

    let summary = orch.run(&query()).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Success);
    assert_eq!(summary.total_new, 2);
    assert_eq!(summary.duplicates_found, 1);

    let original = harness.by_url("https://alpha.example/jobs/1");
    let duplicate = harness.by_url("https://beta.example/jobs/9");
    assert!(!original.is_duplicate);
    assert!(duplicate.is_duplicate);
    assert_eq!(duplicate.duplicate_of, Some(original.id));

    let live = harness.live();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, original.id);
}

/// Re-running the same query updates in place and creates nothing new.
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = TestHarness::new();
    let alpha = source(
        "alpha",
        (0..4)
            .map(|n| distinct_item(&format!("https://alpha.example/jobs/{n}"), n))
            .collect(),
    );
    let orch = harness.orchestrator(sources([alpha]));

    let first = orch.run(&query()).await.unwrap();
    let ids_before: Vec<_> = harness.postings().iter().map(|p| p.id).collect();

    let second = orch.run(&query()).await.unwrap();
    let ids_after: Vec<_> = harness.postings().iter().map(|p| p.id).collect();

    assert_eq!(first.total_new, 4);
    assert_eq!(second.total_new, 0);
    assert_eq!(second.total_updated, 4);
    assert_eq!(ids_before, ids_after);
    assert_eq!(second.duplicates_found, 0);
}

/// A URL seen from two sources is stored once.
#[tokio::test]
async fn test_canonical_url_is_unique() {
    let harness = TestHarness::new();
    let shared = "https://jobs.example/postings/42";
    let alpha = source("alpha", vec![item(shared, "Data Engineer")]);
    let beta = source("beta", vec![item(shared, "Data Engineer")]);
    let orch = harness.orchestrator(sources([alpha, beta]));

    let summary = orch.run(&query()).await.unwrap();

    assert_eq!(summary.total_new, 1);
    assert_eq!(summary.total_updated, 1);

    let postings = harness.postings();
    let urls: HashSet<_> = postings.iter().map(|p| p.canonical_url.as_str()).collect();
    assert_eq!(postings.len(), 1);
    assert_eq!(urls.len(), 1);
}

/// One failing source does not stop the others from committing.
#[tokio::test]
async fn test_source_failure_is_isolated() {
    let harness = TestHarness::new();
    let broken = Arc::new(StaticSource::failing("alpha", "HTTP 503"));
    let beta = source(
        "beta",
        vec![
            distinct_item("https://beta.example/jobs/1", 0),
            distinct_item("https://beta.example/jobs/2", 1),
        ],
    );
    let orch = harness.orchestrator(sources([broken.clone(), beta]));

    let summary = orch.run(&query()).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Partial);
    assert_eq!(broken.calls(), 1);

    let alpha_report = summary.source("alpha").unwrap();
    assert_eq!(alpha_report.status, RunStatus::Failed);
    assert_eq!(alpha_report.new, 0);
    assert!(alpha_report.error.as_deref().unwrap().contains("503"));

    let beta_report = summary.source("beta").unwrap();
    assert_eq!(beta_report.status, RunStatus::Success);
    assert_eq!(beta_report.new, 2);
    assert_eq!(harness.postings().len(), 2);
}

/// Per-source counters add up across the summary and the ledger.
#[tokio::test]
async fn test_summary_and_ledger_counts() {
    let harness = TestHarness::new();
    let alpha = source(
        "alpha",
        vec![
            distinct_item("https://alpha.example/jobs/1", 0),
            distinct_item("https://alpha.example/jobs/2", 1),
            item("https://alpha.example/jobs/3", "Software Engineering Intern"),
            ScrapedItem::new("", "Acme GmbH", "Berlin", "No title", "https://alpha.example/jobs/4"),
        ],
    );
    let beta = source("beta", vec![distinct_item("https://beta.example/jobs/1", 2)]);
    let orch = harness.orchestrator(sources([alpha, beta]));

    let summary = orch.run(&query()).await.unwrap();

    let alpha_report = summary.source("alpha").unwrap();
    assert_eq!(alpha_report.found, 3);
    assert_eq!(alpha_report.rejected, 1);
    assert_eq!(alpha_report.malformed, 1);
    assert_eq!(alpha_report.new, 2);

    assert_eq!(summary.total_found, 4);
    assert_eq!(summary.total_new, 3);
    assert_eq!(summary.total_rejected, 1);

    let runs = harness.storage.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.run_id == summary.run_id));
    assert!(runs.iter().all(|r| r.keyword == "ML Engineer"));

    let ledger_alpha = runs.iter().find(|r| r.source == "alpha").unwrap();
    assert_eq!(ledger_alpha.found, 3);
    assert_eq!(ledger_alpha.new, 2);
    assert_eq!(ledger_alpha.rejected, 1);
    assert_eq!(ledger_alpha.malformed, 1);
    assert_eq!(ledger_alpha.status, RunStatus::Success);
}

/// A query restricted to one source leaves the others untouched.
#[tokio::test]
async fn test_query_source_selection() {
    let harness = TestHarness::new();
    let alpha = source("alpha", vec![distinct_item("https://alpha.example/jobs/1", 0)]);
    let beta = source("beta", vec![distinct_item("https://beta.example/jobs/1", 1)]);
    let orch = harness.orchestrator(sources([alpha.clone(), beta.clone()]));

    let summary = orch.run(&query().with_sources(["beta"])).await.unwrap();

    assert_eq!(summary.sources.len(), 1);
    assert_eq!(alpha.calls(), 0);
    assert_eq!(beta.calls(), 1);
    assert_eq!(harness.postings()[0].source, "beta");
}
