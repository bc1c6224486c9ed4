//! Background scheduler for the job-harvest daemon.
//!
//! Wraps `tokio-cron-scheduler` with timezone-aware cron jobs, graceful
//! shutdown through a `CancellationToken`, per-job status in a
//! [`JobRegistry`], overlap control, start jitter and run timeouts.
//! [`QueryGuards`] keep scheduled and on-demand ingestion runs for the same
//! keyword and location from overlapping.
//!
//! # Example
//!
//! ```ignore
//! use harvest_scheduler::{create_ingestion_job, IngestionJobConfig, QueryGuards,
//!     SchedulerConfig, SchedulerService};
//!
//! let scheduler = SchedulerService::new(SchedulerConfig::from_schedule(&settings.schedule)).await?;
//! let guards = QueryGuards::new();
//! create_ingestion_job(&scheduler, orchestrator, guards.clone(),
//!     IngestionJobConfig::from_schedule(&settings.schedule)).await?;
//! scheduler.start().await?;
//! ```

mod config;
mod error;
mod jitter;
pub mod jobs;
mod overlap;
mod registry;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use jitter::{with_jitter, JitterConfig};
pub use jobs::{create_ingestion_job, run_query_matrix, IngestionJobConfig, INGESTION_JOB};
pub use overlap::{OverlapGuard, OverlapPolicy, QueryGuard, QueryGuards, RunGuard, StoreLock};
pub use registry::{JobOutput, JobRegistry, JobResult, JobStatus};
pub use scheduler::{validate_cron_expression, SchedulerService, TimeoutConfig};
