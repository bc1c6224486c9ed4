//! Scheduler service wrapper around tokio-cron-scheduler.
//!
//! Jobs registered through [`SchedulerService::register_job`] get overlap
//! protection, start jitter, a wall-clock timeout and status tracking in
//! the shared [`JobRegistry`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    JitterConfig, JobOutput, JobRegistry, JobResult, OverlapGuard, OverlapPolicy, SchedulerConfig,
    SchedulerError,
};

/// Validate a 6-field cron expression (sec min hour day-of-month month day-of-week).
///
/// ```
/// use harvest_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 0 */2 * * *").is_ok());
/// assert!(validate_cron_expression("every two hours").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    Job::new_async(expr, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| SchedulerError::InvalidCron(format!("'{expr}': {e}")))
}

/// Upper bound on one job execution. 0 disables the limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub timeout_secs: u64,
}

impl TimeoutConfig {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Await `fut`, failing it once the limit elapses.
    pub async fn run<Fut>(&self, fut: Fut) -> Result<JobOutput, String>
    where
        Fut: Future<Output = Result<JobOutput, String>>,
    {
        match self.duration() {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(format!("timed out after {}s", self.timeout_secs))),
            None => fut.await,
        }
    }
}

/// Everything one scheduled execution needs besides the job body.
struct JobRunner {
    name: String,
    registry: Arc<JobRegistry>,
    guard: OverlapGuard,
    jitter: JitterConfig,
    timeout: TimeoutConfig,
    shutdown: CancellationToken,
}

impl JobRunner {
    /// Run the body once, honouring pause, overlap, jitter, timeout and
    /// shutdown. Returns the result that was recorded, or `None` when the
    /// job was paused.
    async fn execute<F, Fut>(&self, job_fn: &F) -> Option<JobResult>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<JobOutput, String>>,
    {
        if self.registry.is_paused(&self.name) {
            debug!(job = %self.name, "Job paused, not running");
            return None;
        }

        let Some(_run) = self.guard.try_acquire() else {
            info!(job = %self.name, "Previous run still active, skipping");
            let result = JobResult::Skipped("previous run still active".to_string());
            self.registry.record_complete(&self.name, result.clone(), 0);
            return Some(result);
        };

        let jitter = self.jitter.generate_jitter();
        if !jitter.is_zero() {
            debug!(job = %self.name, jitter_ms = jitter.as_millis() as u64, "Applying jitter delay");
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(jitter) => {}
            }
        }

        self.registry.record_start(&self.name);
        info!(job = %self.name, "Job started");
        let start = Instant::now();

        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => Err("cancelled by shutdown".to_string()),
            outcome = self.timeout.run(job_fn()) => outcome,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (result, metadata) = match outcome {
            Ok(output) => {
                info!(job = %self.name, duration_ms, "Job completed");
                (JobResult::Success, output.metadata)
            }
            Err(e) => {
                warn!(job = %self.name, duration_ms, error = %e, "Job failed");
                (JobResult::Failed(e), Default::default())
            }
        };
        self.registry
            .record_complete_with_metadata(&self.name, result.clone(), duration_ms, metadata);
        Some(result)
    }
}

/// Lifecycle wrapper around `JobScheduler`.
pub struct SchedulerService {
    scheduler: JobScheduler,
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    shutdown_token: CancellationToken,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a stopped scheduler. Fails early on a bad default timezone.
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.parse_timezone()?;

        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            config,
            registry: Arc::new(JobRegistry::new()),
            shutdown_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.scheduler.start().await?;
        info!(jobs = self.registry.job_count(), "Scheduler started");

        Ok(())
    }

    /// Cancel running jobs, give them a grace period, then stop.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();

        // Jobs observe the token; wait only while one is still in flight
        let grace = Duration::from_secs(self.config.shutdown_timeout_secs);
        let deadline = Instant::now() + grace;
        while self.registry.get_all_status().iter().any(|s| s.is_running)
            && Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Error during scheduler shutdown: {}", e);
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");

        Ok(())
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn resolve_timezone(&self, timezone: Option<&str>) -> Result<Tz, SchedulerError> {
        match timezone {
            Some(tz) => Self::parse_timezone(tz),
            None => self.config.parse_timezone(),
        }
    }

    /// Register a job with overlap, jitter and timeout handling.
    ///
    /// `job_fn` is called once per firing. Its `Err` is recorded as
    /// `JobResult::Failed`; the schedule keeps running either way.
    ///
    /// # Errors
    ///
    /// Returns error if cron expression is invalid or timezone is not recognized.
    #[allow(clippy::too_many_arguments)]
    pub async fn register_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        overlap: OverlapPolicy,
        jitter: JitterConfig,
        timeout: TimeoutConfig,
        job_fn: F,
    ) -> Result<uuid::Uuid, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JobOutput, String>> + Send + 'static,
    {
        let tz = self.resolve_timezone(timezone)?;
        validate_cron_expression(cron_expr)?;

        self.registry.register(name, cron_expr);

        let runner = Arc::new(JobRunner {
            name: name.to_string(),
            registry: self.registry.clone(),
            guard: OverlapGuard::new(overlap),
            jitter,
            timeout,
            shutdown: self.shutdown_token.clone(),
        });
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async_tz(cron_expr, tz, move |uuid, mut lock| {
            let runner = runner.clone();
            let job_fn = job_fn.clone();

            Box::pin(async move {
                runner.execute(job_fn.as_ref()).await;

                if let Ok(Some(next)) = lock.next_tick_for_job(uuid).await {
                    runner.registry.set_next_run(&runner.name, next);
                }
            })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let uuid = self.scheduler.add(job).await?;
        info!(
            job = %name,
            uuid = %uuid,
            cron = %cron_expr,
            timezone = %tz.name(),
            ?overlap,
            "Job registered"
        );

        Ok(uuid)
    }

    /// Parse an IANA timezone name.
    pub fn parse_timezone(tz_str: &str) -> Result<Tz, SchedulerError> {
        tz_str
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(tz_str.to_string()))
    }
}
