//! Error types for pipeline operations.

use harvest_storage::StorageError;
use thiserror::Error;

/// Errors that abort a pipeline operation.
///
/// Per-item and per-source failures never surface here; they are recorded
/// in the run summary instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The pre-run store check failed; no adapter was called.
    #[error("Store health check failed: {0}")]
    HealthCheck(#[source] StorageError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A filter rule could not be compiled.
    #[error("Filter configuration error: {0}")]
    FilterConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
