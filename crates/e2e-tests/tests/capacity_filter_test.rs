//! Capacity ceiling and content filter E2E tests for job-harvest.

use pretty_assertions::assert_eq;

use e2e_tests::{days_ago, distinct_item, item, source, sources, test_config, TestHarness};
use harvest_adapters::ScrapedItem;
use harvest_pipeline::OrchestratorConfig;
use harvest_storage::PostingStore;
use harvest_types::SearchQuery;

fn query() -> SearchQuery {
    SearchQuery::new("Engineer", "Berlin")
}

/// Past the ceiling, the oldest postings by publication time are
/// deactivated, never deleted.
#[tokio::test]
async fn test_capacity_deactivates_oldest() {
    let harness = TestHarness::new();
    let items: Vec<ScrapedItem> = (0..5)
        .map(|n| {
            distinct_item(&format!("https://alpha.example/jobs/{n}"), n)
                .with_posted_at(Some(days_ago(10 - n as i64)))
        })
        .collect();
    let alpha = source("alpha", items);
    let config = OrchestratorConfig {
        max_active_postings: 3,
        ..test_config()
    };
    let orch = harness.orchestrator_with(sources([alpha]), config);

    let summary = orch.run(&query()).await.unwrap();

    assert_eq!(summary.total_new, 5);
    assert_eq!(summary.deactivated, 2);
    assert_eq!(harness.postings().len(), 5);
    assert_eq!(harness.storage.count_active().unwrap(), 3);

    for n in 0..5 {
        let posting = harness.by_url(&format!("https://alpha.example/jobs/{n}"));
        assert_eq!(posting.is_active, n >= 2, "posting {n}");
    }
}

/// A deactivated posting that is scraped again stays inactive.
#[tokio::test]
async fn test_rescrape_keeps_deactivated_flag() {
    let harness = TestHarness::new();
    let items: Vec<ScrapedItem> = (0..3)
        .map(|n| {
            distinct_item(&format!("https://alpha.example/jobs/{n}"), n)
                .with_posted_at(Some(days_ago(5 - n as i64)))
        })
        .collect();
    let alpha = source("alpha", items);
    let config = OrchestratorConfig {
        max_active_postings: 2,
        ..test_config()
    };
    let orch = harness.orchestrator_with(sources([alpha]), config);

    orch.run(&query()).await.unwrap();
    let second = orch.run(&query()).await.unwrap();

    assert_eq!(second.total_updated, 3);
    assert_eq!(second.deactivated, 0);
    assert!(!harness.by_url("https://alpha.example/jobs/0").is_active);
    assert_eq!(harness.storage.count_active().unwrap(), 2);
}

/// Internships, fluent-German requirements and non full-time roles are
/// rejected before anything is written.
#[tokio::test]
async fn test_filtered_postings_are_never_persisted() {
    let harness = TestHarness::new();
    let alpha = source(
        "alpha",
        vec![
            item("https://alpha.example/jobs/intern", "Software Engineering Intern"),
            item("https://alpha.example/jobs/praktikum", "Praktikum Data Analytics"),
            ScrapedItem::new(
                "Data Engineer",
                "Acme GmbH",
                "Berlin",
                "Fluent German and English required.",
                "https://alpha.example/jobs/german",
            ),
            item("https://alpha.example/jobs/parttime", "Data Engineer")
                .with_job_type(Some("Part-time".to_string())),
            item("https://alpha.example/jobs/ok", "Data Engineer"),
            distinct_item("https://alpha.example/jobs/vollzeit", 3)
                .with_job_type(Some("Vollzeit".to_string())),
        ],
    );
    let orch = harness.orchestrator(sources([alpha]));

    let summary = orch.run(&query()).await.unwrap();

    assert_eq!(summary.total_found, 6);
    assert_eq!(summary.total_rejected, 4);
    assert_eq!(summary.total_new, 2);

    let mut urls: Vec<_> = harness
        .postings()
        .into_iter()
        .map(|p| p.canonical_url)
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://alpha.example/jobs/ok".to_string(),
            "https://alpha.example/jobs/vollzeit".to_string(),
        ]
    );
}

/// Mentioning German as a plus is not a fluency requirement.
#[tokio::test]
async fn test_german_as_a_plus_is_kept() {
    let harness = TestHarness::new();
    let alpha = source(
        "alpha",
        vec![ScrapedItem::new(
            "Data Engineer",
            "Acme GmbH",
            "Berlin",
            "English is our working language; German is a plus.",
            "https://alpha.example/jobs/1",
        )],
    );
    let orch = harness.orchestrator(sources([alpha]));

    let summary = orch.run(&query()).await.unwrap();

    assert_eq!(summary.total_rejected, 0);
    assert_eq!(summary.total_new, 1);
}
