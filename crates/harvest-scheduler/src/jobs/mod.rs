//! Jobs the daemon registers with the scheduler.
//!
//! - **ingestion**: periodic ingestion across the configured keyword x
//!   location matrix

pub mod ingestion;

pub use ingestion::{create_ingestion_job, run_query_matrix, IngestionJobConfig, INGESTION_JOB};
