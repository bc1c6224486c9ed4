//! Scheduled ingestion job.
//!
//! Each firing walks the keyword x location matrix one query at a time.
//! A query whose key is held by another run (for example the daemon's
//! immediate pass) is skipped for this cycle. Every run waits for the
//! shared store lock, so two passes never write at the same time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use harvest_pipeline::{Orchestrator, PipelineError};
use harvest_types::{ScheduleSettings, SearchQuery};

use crate::{
    JitterConfig, JobOutput, OverlapPolicy, QueryGuards, SchedulerError, SchedulerService,
    TimeoutConfig,
};

/// Registry name of the ingestion job.
pub const INGESTION_JOB: &str = "ingestion";

/// Configuration for the ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJobConfig {
    /// Cron expression (default: "0 0 */2 * * *" = every two hours)
    pub cron: String,

    pub timezone: String,

    /// Max jitter in seconds
    pub jitter_secs: u64,

    /// Limit for a whole matrix pass
    pub timeout_secs: u64,

    pub keywords: Vec<String>,

    pub locations: Vec<String>,

    /// Restrict scheduled runs to these sources; `None` uses the defaults
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl Default for IngestionJobConfig {
    fn default() -> Self {
        Self::from_schedule(&ScheduleSettings::default())
    }
}

impl IngestionJobConfig {
    pub fn from_schedule(schedule: &ScheduleSettings) -> Self {
        Self {
            cron: schedule.cron.clone(),
            timezone: schedule.timezone.clone(),
            jitter_secs: schedule.jitter_secs,
            timeout_secs: schedule.timeout_secs,
            keywords: schedule.keywords.clone(),
            locations: schedule.locations.clone(),
            sources: None,
        }
    }

    /// Every keyword paired with every location, keyword-major.
    pub fn queries(&self) -> Vec<SearchQuery> {
        let mut queries = Vec::with_capacity(self.keywords.len() * self.locations.len());
        for keyword in self.keywords.iter().filter(|k| !k.trim().is_empty()) {
            for location in self.locations.iter().filter(|l| !l.trim().is_empty()) {
                let mut query = SearchQuery::new(keyword.trim(), location.trim());
                query.sources = self.sources.clone();
                queries.push(query);
            }
        }
        queries
    }
}

/// Run each query in turn under its query guard and the store lock.
///
/// Fails only when the store is unreachable or when no query could run
/// and at least one failed.
pub async fn run_query_matrix(
    orchestrator: &Orchestrator,
    guards: &QueryGuards,
    queries: &[SearchQuery],
    shutdown: &CancellationToken,
) -> Result<JobOutput, String> {
    let mut completed = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    let mut total_new = 0u64;
    let mut total_updated = 0u64;
    let mut duplicates = 0usize;
    let mut deactivated = 0usize;
    let mut last_error = None;

    for query in queries {
        if shutdown.is_cancelled() {
            info!("Shutdown requested, stopping ingestion matrix");
            break;
        }

        let Some(_guard) = guards.try_acquire_query(query) else {
            warn!(keyword = %query.keyword, location = %query.location, "Query already running, skipping");
            skipped += 1;
            continue;
        };

        let _store = tokio::select! {
            lock = guards.lock_store() => lock,
            _ = shutdown.cancelled() => {
                info!("Shutdown requested while waiting for the store");
                break;
            }
        };

        match orchestrator.run(query).await {
            Ok(summary) => {
                completed += 1;
                total_new += u64::from(summary.total_new);
                total_updated += u64::from(summary.total_updated);
                duplicates += summary.duplicates_found;
                deactivated += summary.deactivated;
            }
            Err(e @ PipelineError::HealthCheck(_)) => {
                error!(error = %e, "Store unreachable, aborting ingestion matrix");
                return Err(e.to_string());
            }
            Err(e) => {
                error!(keyword = %query.keyword, location = %query.location, error = %e, "Ingestion run failed");
                failed += 1;
                last_error = Some(e.to_string());
            }
        }
    }

    info!(
        queries = queries.len(),
        completed, skipped, failed, total_new, total_updated, "Ingestion matrix finished"
    );

    if completed == 0 {
        if let Some(e) = last_error {
            return Err(format!("all {failed} runs failed, last error: {e}"));
        }
    }

    Ok(JobOutput::new()
        .with_count("queries", queries.len())
        .with_count("completed", completed)
        .with_count("skipped", skipped)
        .with_count("failed", failed)
        .with_metadata("total_new", total_new.to_string())
        .with_metadata("total_updated", total_updated.to_string())
        .with_count("duplicates_found", duplicates)
        .with_count("deactivated", deactivated))
}

/// Register the ingestion job with the scheduler.
///
/// Uses `OverlapPolicy::Skip`, so a pass that outlives the interval makes
/// the next firing a recorded skip.
///
/// # Errors
///
/// Returns `InvalidJob` for an empty matrix, and the registration errors of
/// [`SchedulerService::register_job`].
pub async fn create_ingestion_job(
    scheduler: &SchedulerService,
    orchestrator: Arc<Orchestrator>,
    guards: QueryGuards,
    config: IngestionJobConfig,
) -> Result<(), SchedulerError> {
    let queries = Arc::new(config.queries());
    if queries.is_empty() {
        return Err(SchedulerError::InvalidJob(
            "schedule needs at least one keyword and one location".to_string(),
        ));
    }

    let shutdown = scheduler.shutdown_token();
    let query_count = queries.len();

    scheduler
        .register_job(
            INGESTION_JOB,
            &config.cron,
            Some(&config.timezone),
            OverlapPolicy::Skip,
            JitterConfig::new(config.jitter_secs),
            TimeoutConfig::new(config.timeout_secs),
            move || {
                let orchestrator = orchestrator.clone();
                let guards = guards.clone();
                let queries = queries.clone();
                let shutdown = shutdown.clone();
                async move { run_query_matrix(&orchestrator, &guards, &queries, &shutdown).await }
            },
        )
        .await?;

    info!(queries = query_count, cron = %config.cron, "Registered ingestion job");
    Ok(())
}
