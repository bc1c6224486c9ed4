//! Command implementations for the harvest daemon.
//!
//! Handles:
//! - start: load config, open storage, run the ingestion schedule
//! - stop / status: PID-file based daemon control
//! - run, postings, runs, dedup, sources, admin: one-shot commands that
//!   open the store directly

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use tokio::signal;
use tracing::{info, warn};

use harvest_adapters::{SourceAdapter, SourceRegistry};
use harvest_pipeline::{Orchestrator, RunSummary};
use harvest_scheduler::{
    create_ingestion_job, run_query_matrix, IngestionJobConfig, JobResult, JobStatus, QueryGuards,
    SchedulerConfig, SchedulerService,
};
use harvest_storage::column_families::ALL_CF_NAMES;
use harvest_storage::{PostingStore, Storage, StorageStats};
use harvest_types::{IngestionRun, Posting, PostingQuery, SearchQuery, Settings};

use crate::cli::{AdminCommands, DedupCommands, PostingCommands};

/// Get the PID file path
fn pid_file_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| {
            #[cfg(unix)]
            {
                dirs.runtime_dir()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| dirs.cache_dir().to_path_buf())
            }
            #[cfg(not(unix))]
            {
                dirs.cache_dir().to_path_buf()
            }
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("job-harvest")
        .join("daemon.pid")
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;
    info!("Wrote PID file: {:?}", pid_path);
    Ok(())
}

fn remove_pid_file() {
    let pid_path = pid_file_path();
    if pid_path.exists() {
        if let Err(e) = fs::remove_file(&pid_path) {
            warn!("Failed to remove PID file: {}", e);
        } else {
            info!("Removed PID file");
        }
    }
}

fn read_pid_file() -> Option<u32> {
    fs::read_to_string(pid_file_path())
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    // Signal 0 only checks that the process exists
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open the RocksDB store, creating parent directories as needed.
pub fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let storage = Storage::open(&db_path).with_context(|| {
        format!(
            "Failed to open storage at {} (is the daemon already running?)",
            db_path.display()
        )
    })?;
    Ok(Arc::new(storage))
}

/// Wire the configured sources and pipeline stages to `storage`.
pub fn build_orchestrator(settings: &Settings, storage: Arc<Storage>) -> Result<Orchestrator> {
    let registry = SourceRegistry::from_settings(settings).context("Failed to build sources")?;
    Orchestrator::from_settings(settings, registry, storage).context("Invalid pipeline settings")
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}

/// Start the daemon.
///
/// 1. Load configuration (defaults -> file -> env -> CLI)
/// 2. Open RocksDB storage
/// 3. Register the ingestion schedule and start the scheduler
/// 4. Shut down gracefully on SIGINT/SIGTERM
pub async fn start_daemon(settings: Settings, foreground: bool, run_now: bool) -> Result<()> {
    init_logging(&settings)?;

    info!("job-harvest daemon starting...");
    info!("  Database path: {}", settings.db_path);
    info!("  Default sources: {}", settings.default_sources.join(", "));
    info!("  Schedule: {} ({})", settings.schedule.cron, settings.schedule.timezone);
    info!("  Log level: {}", settings.log_level);

    if !foreground {
        warn!("Background mode not supported, running in foreground");
        warn!("Use a process manager (systemd, launchd) for background operation");
    }

    let storage = open_storage(&settings)?;
    let orchestrator = Arc::new(build_orchestrator(&settings, storage.clone())?);
    let guards = QueryGuards::new();
    let job_config = IngestionJobConfig::from_schedule(&settings.schedule);

    let mut scheduler = SchedulerService::new(SchedulerConfig::from_schedule(&settings.schedule))
        .await
        .context("Failed to create scheduler")?;

    if settings.schedule.enabled {
        create_ingestion_job(&scheduler, orchestrator.clone(), guards.clone(), job_config.clone())
            .await
            .context("Failed to register ingestion job")?;
    } else {
        info!("Scheduled ingestion disabled");
    }

    write_pid_file()?;
    scheduler.start().await.context("Failed to start scheduler")?;

    let immediate = run_now.then(|| {
        let orchestrator = orchestrator.clone();
        let guards = guards.clone();
        let queries = job_config.queries();
        let shutdown = scheduler.shutdown_token();
        tokio::spawn(async move {
            match run_query_matrix(&orchestrator, &guards, &queries, &shutdown).await {
                Ok(output) => info!(metadata = ?output.metadata, "Immediate ingestion pass finished"),
                Err(e) => warn!(error = %e, "Immediate ingestion pass failed"),
            }
        })
    });

    let result = wait_for_shutdown().await;

    if let Err(e) = scheduler.shutdown().await {
        warn!("Scheduler shutdown error: {}", e);
    }
    for status in scheduler.registry().get_all_status() {
        info!("{}", format_job_status(&status));
    }
    if let Some(handle) = immediate {
        if let Err(e) = handle.await {
            warn!("Immediate ingestion task ended abnormally: {}", e);
        }
    }
    if let Err(e) = storage.flush() {
        warn!("Failed to flush storage: {}", e);
    }
    remove_pid_file();

    result
}

/// One line per job for the shutdown log.
fn format_job_status(status: &JobStatus) -> String {
    let last = match &status.last_result {
        None => "never ran".to_string(),
        Some(JobResult::Success) => "last run ok".to_string(),
        Some(JobResult::Failed(e)) => format!("last run failed: {e}"),
        Some(JobResult::Skipped(why)) => format!("last run skipped: {why}"),
    };
    format!(
        "Job {} ({}): {} runs, {} errors, {}",
        status.job_name, status.cron_expr, status.run_count, status.error_count, last
    )
}

/// Stop the running daemon by sending SIGTERM.
pub fn stop_daemon() -> Result<()> {
    let pid = read_pid_file().context("No PID file found - daemon may not be running")?;

    if !is_process_running(pid) {
        remove_pid_file();
        bail!("Daemon not running (stale PID file removed)");
    }

    #[cfg(unix)]
    {
        unsafe {
            if libc::kill(pid as i32, libc::SIGTERM) != 0 {
                bail!("Failed to send SIGTERM to daemon");
            }
        }
        println!("Sent SIGTERM to daemon (PID {})", pid);
    }

    #[cfg(not(unix))]
    {
        bail!("Stop command not yet implemented on this platform");
    }

    Ok(())
}

/// Show daemon status.
pub fn show_status() -> Result<()> {
    let pid_path = pid_file_path();

    match read_pid_file() {
        Some(pid) if is_process_running(pid) => {
            println!("job-harvest daemon is running (PID {})", pid);
            println!("PID file: {:?}", pid_path);
        }
        Some(pid) => {
            println!(
                "job-harvest daemon is NOT running (stale PID {} in {:?})",
                pid, pid_path
            );
        }
        None => println!("job-harvest daemon is NOT running (no PID file)"),
    }
    Ok(())
}

/// Run ingestion once for `query`.
///
/// The RocksDB lock taken by [`open_storage`] keeps this from running next
/// to the daemon or another `run`.
pub async fn run_once(settings: &Settings, query: SearchQuery) -> Result<RunSummary> {
    let storage = open_storage(settings)?;
    let orchestrator = build_orchestrator(settings, storage.clone())?;

    let summary = orchestrator
        .run(&query)
        .await
        .context("Ingestion run aborted")?;
    storage.flush().context("Failed to flush storage")?;
    Ok(summary)
}

/// `run`: print the summary as JSON.
pub async fn handle_run(settings: &Settings, query: SearchQuery) -> Result<()> {
    let summary = run_once(settings, query).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn posting_query(command: &PostingCommands) -> Option<PostingQuery> {
    let PostingCommands::List {
        source,
        job_type,
        remote_type,
        experience_level,
        since_days,
        search,
        include_inactive,
        include_duplicates,
        page,
        page_size,
    } = command
    else {
        return None;
    };

    Some(PostingQuery {
        source: source.clone(),
        job_type: job_type.clone(),
        remote_type: remote_type.clone(),
        experience_level: experience_level.clone(),
        posted_after: (*since_days).map(|days| Utc::now() - Duration::days(days)),
        search: search.clone(),
        include_inactive: *include_inactive,
        include_duplicates: *include_duplicates,
        page: *page,
        page_size: *page_size,
    })
}

/// One listing line: id, date, source, title, company and location.
pub fn format_posting_row(posting: &Posting) -> String {
    let mut flags = String::new();
    if !posting.is_active {
        flags.push_str(" [inactive]");
    }
    if let Some(original) = posting.duplicate_of {
        flags.push_str(&format!(" [duplicate of {original}]"));
    }
    format!(
        "{:>6}  {}  {:<15} {} @ {} ({}){}",
        posting.id,
        posting.posted_at.format("%Y-%m-%d"),
        posting.source,
        posting.title,
        posting.company,
        posting.location,
        flags
    )
}

pub fn handle_postings(settings: &Settings, command: PostingCommands) -> Result<()> {
    let storage = open_storage(settings)?;

    if let Some(query) = posting_query(&command) {
        let page = storage.list_postings(&query).context("Failed to list postings")?;
        for posting in &page.postings {
            println!("{}", format_posting_row(posting));
        }
        println!(
            "-- page {} ({} per page), {} matching",
            page.page, page.page_size, page.total
        );
        return Ok(());
    }

    if let PostingCommands::Show { id } = command {
        let posting = storage
            .record_view(id)
            .context("Failed to read posting")?
            .with_context(|| format!("Posting {id} not found"))?;
        println!("{}", serde_json::to_string_pretty(&posting)?);
    }
    Ok(())
}

/// One ledger line.
pub fn format_run_row(run: &IngestionRun) -> String {
    let mut row = format!(
        "{}  {:<15} {:<8} found={} new={} updated={} rejected={} malformed={} {}ms  \"{}\" / \"{}\"",
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.source,
        run.status.as_str(),
        run.found,
        run.new,
        run.updated,
        run.rejected,
        run.malformed,
        run.duration_ms,
        run.keyword,
        run.location,
    );
    if let Some(error) = &run.error {
        row.push_str(&format!("  error: {error}"));
    }
    row
}

pub fn handle_runs(settings: &Settings, limit: usize) -> Result<()> {
    let storage = open_storage(settings)?;
    let runs = storage.recent_runs(limit).context("Failed to read run history")?;
    if runs.is_empty() {
        println!("No ingestion runs recorded");
    }
    for run in &runs {
        println!("{}", format_run_row(run));
    }
    Ok(())
}

pub fn handle_dedup(settings: &Settings, command: DedupCommands) -> Result<()> {
    let storage = open_storage(settings)?;
    let orchestrator = build_orchestrator(settings, storage)?;

    match command {
        DedupCommands::Run => {
            let report = orchestrator.dedup().run().context("Deduplication failed")?;
            println!(
                "Compared {} live postings: {} new duplicates, {} repointed",
                report.eligible,
                report.duplicates_found(),
                report.repointed
            );
            for m in &report.matches {
                println!(
                    "  {} -> {} (similarity {:.1})",
                    m.duplicate_id, m.original_id, m.score
                );
            }
        }
        DedupCommands::Merge { keep, remove } => {
            let report = orchestrator
                .dedup()
                .merge(keep, remove)
                .context("Merge failed")?;
            println!(
                "Merged posting {} into {}; copied fields: {}",
                report.removed_id,
                report.kept.id,
                if report.fields_copied.is_empty() {
                    "none".to_string()
                } else {
                    report.fields_copied.join(", ")
                }
            );
        }
    }
    Ok(())
}

pub fn handle_sources(settings: &Settings) -> Result<()> {
    let registry = SourceRegistry::from_settings(settings).context("Failed to build sources")?;
    for id in registry.ids() {
        let Some(adapter) = registry.get(&id) else {
            continue;
        };
        let state = if adapter.is_available() {
            "available"
        } else {
            "unavailable"
        };
        let default = if settings.default_sources.iter().any(|s| s == &id) {
            " (default)"
        } else {
            ""
        };
        println!("{:<15} {:<12} {}{}", id, state, adapter.display_name(), default);
    }
    Ok(())
}

pub fn format_stats(stats: &StorageStats) -> String {
    let mut out = format!(
        "Postings:    {}\nActive:      {}\nDuplicates:  {}\nRun records: {}\nDisk usage:  {} bytes",
        stats.posting_count,
        stats.active_count,
        stats.duplicate_count,
        stats.run_count,
        stats.disk_usage_bytes
    );
    if !stats.active_by_source.is_empty() {
        out.push_str("\nActive by source:");
        for (source, count) in &stats.active_by_source {
            out.push_str(&format!("\n  {source:<15} {count}"));
        }
    }
    out
}

pub fn handle_admin(settings: &Settings, command: AdminCommands) -> Result<()> {
    let storage = open_storage(settings)?;

    match command {
        AdminCommands::Stats => {
            let stats = storage.get_stats().context("Failed to read statistics")?;
            println!("Database: {}", settings.expanded_db_path().display());
            println!("{}", format_stats(&stats));
        }
        AdminCommands::Compact { cf: Some(cf) } => {
            if !ALL_CF_NAMES.contains(&cf.as_str()) {
                bail!(
                    "Unknown column family '{}' (expected one of: {})",
                    cf,
                    ALL_CF_NAMES.join(", ")
                );
            }
            storage.compact_cf(&cf).context("Compaction failed")?;
            println!("Compacted column family {cf}");
        }
        AdminCommands::Compact { cf: None } => {
            storage.compact().context("Compaction failed")?;
            println!("Compacted all column families");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_types::RunStatus;
    use tempfile::TempDir;

    fn temp_settings(dir: &TempDir) -> Settings {
        Settings {
            db_path: dir.path().join("db").to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pid_file_path() {
        let path = pid_file_path();
        assert!(path.ends_with("daemon.pid"));
        assert!(path
            .parent()
            .unwrap()
            .to_string_lossy()
            .contains("job-harvest"));
    }

    #[test]
    fn test_status_no_daemon() {
        assert!(show_status().is_ok());
    }

    #[test]
    fn test_open_storage_creates_directories() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            db_path: dir.path().join("nested/deeper/db").to_string_lossy().to_string(),
            ..Default::default()
        };
        let storage = open_storage(&settings).unwrap();
        assert_eq!(storage.count_active().unwrap(), 0);
    }

    #[test]
    fn test_posting_query_from_list_args() {
        let command = PostingCommands::List {
            source: Some("arbeitnow".into()),
            job_type: None,
            remote_type: Some("remote".into()),
            experience_level: None,
            since_days: Some(7),
            search: Some("rust".into()),
            include_inactive: false,
            include_duplicates: true,
            page: 2,
            page_size: 500,
        };
        let query = posting_query(&command).unwrap();
        assert_eq!(query.source.as_deref(), Some("arbeitnow"));
        assert_eq!(query.remote_type.as_deref(), Some("remote"));
        assert!(query.include_duplicates);
        assert_eq!(query.effective_page_size(), 100);
        let after = query.posted_after.unwrap();
        assert!(after < Utc::now() - Duration::days(6));

        assert!(posting_query(&PostingCommands::Show { id: 1 }).is_none());
    }

    #[test]
    fn test_format_run_row_includes_error() {
        let now = Utc::now();
        let run = IngestionRun {
            run_id: "01J".into(),
            source: "jooble".into(),
            keyword: "Data Scientist".into(),
            location: "Berlin".into(),
            found: 0,
            new: 0,
            updated: 0,
            rejected: 0,
            malformed: 0,
            status: RunStatus::Failed,
            error: Some("no API key configured".into()),
            duration_ms: 3,
            started_at: now,
            completed_at: now,
        };
        let row = format_run_row(&run);
        assert!(row.contains("jooble"));
        assert!(row.contains("failed"));
        assert!(row.contains("error: no API key configured"));
    }

    #[test]
    fn test_format_job_status() {
        let mut status = JobStatus::new("ingestion".into(), "0 0 */2 * * *".into());
        assert!(format_job_status(&status).ends_with("0 runs, 0 errors, never ran"));

        status.run_count = 3;
        status.error_count = 1;
        status.last_result = Some(JobResult::Failed("store unreachable".into()));
        let line = format_job_status(&status);
        assert!(line.starts_with("Job ingestion (0 0 */2 * * *)"));
        assert!(line.contains("3 runs, 1 errors"));
        assert!(line.contains("last run failed: store unreachable"));
    }

    #[test]
    fn test_format_stats() {
        let mut stats = StorageStats {
            posting_count: 3,
            active_count: 2,
            duplicate_count: 1,
            ..Default::default()
        };
        stats.active_by_source.insert("arbeitnow".into(), 2);
        let text = format_stats(&stats);
        assert!(text.contains("Postings:    3"));
        assert!(text.contains("arbeitnow"));
    }

    #[test]
    fn test_handle_runs_and_admin_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let settings = temp_settings(&dir);
        assert!(handle_runs(&settings, 10).is_ok());
        assert!(handle_admin(&settings, AdminCommands::Stats).is_ok());
        assert!(handle_admin(&settings, AdminCommands::Compact { cf: None }).is_ok());
        assert!(handle_admin(
            &settings,
            AdminCommands::Compact {
                cf: Some("nope".into())
            }
        )
        .is_err());
    }

    #[test]
    fn test_show_missing_posting_fails() {
        let dir = TempDir::new().unwrap();
        let settings = temp_settings(&dir);
        let result = handle_postings(&settings, PostingCommands::Show { id: 99 });
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_sources_lists_without_network() {
        let dir = TempDir::new().unwrap();
        assert!(handle_sources(&temp_settings(&dir)).is_ok());
    }

    #[tokio::test]
    async fn test_run_once_with_only_unavailable_source() {
        let dir = TempDir::new().unwrap();
        let settings = temp_settings(&dir);
        // Jooble has no API key by default, so no request is made
        let query = SearchQuery::new("Data Scientist", "Berlin").with_sources(["jooble"]);

        let summary = run_once(&settings, query).await.unwrap();
        assert_eq!(summary.status(), RunStatus::Failed);
        assert_eq!(summary.sources.len(), 1);
        assert_eq!(summary.total_new, 0);
    }

    #[tokio::test]
    async fn test_run_once_refused_while_store_is_open() {
        let dir = TempDir::new().unwrap();
        let settings = temp_settings(&dir);
        let _daemon_store = open_storage(&settings).unwrap();

        let query = SearchQuery::new("Data Scientist", "Berlin").with_sources(["jooble"]);
        let err = run_once(&settings, query).await.unwrap_err();
        assert!(err.to_string().contains("already running"));
    }
}
