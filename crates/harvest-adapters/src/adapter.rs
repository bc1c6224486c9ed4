//! Source adapter trait definition.
//!
//! The `SourceAdapter` trait defines the interface every external job
//! source implements. Adapters fetch raw items in whatever shape the source
//! uses, collect them as `ScrapedItem`s, and normalize them into
//! `RawPosting`s before handing them to the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use harvest_types::{RawPosting, SearchQuery};

use crate::error::AdapterError;

/// Item data as extracted from a source, before normalization.
#[derive(Debug, Clone, Default)]
pub struct ScrapedItem {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub salary: Option<String>,
    pub job_type: Option<String>,
    pub contract_type: Option<String>,
    pub remote_type: Option<String>,
    pub experience_level: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
}

impl ScrapedItem {
    /// Create an item with its required fields.
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        location: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            location: location.into(),
            description: description.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_requirements(mut self, value: impl Into<String>) -> Self {
        self.requirements = Some(value.into());
        self
    }

    pub fn with_benefits(mut self, value: impl Into<String>) -> Self {
        self.benefits = Some(value.into());
        self
    }

    pub fn with_salary(mut self, value: impl Into<String>) -> Self {
        self.salary = Some(value.into());
        self
    }

    pub fn with_job_type(mut self, value: Option<String>) -> Self {
        self.job_type = value;
        self
    }

    pub fn with_contract_type(mut self, value: Option<String>) -> Self {
        self.contract_type = value;
        self
    }

    pub fn with_remote_type(mut self, value: Option<String>) -> Self {
        self.remote_type = value;
        self
    }

    pub fn with_experience_level(mut self, value: Option<String>) -> Self {
        self.experience_level = value;
        self
    }

    /// Set the publication time, if the source provided one.
    pub fn with_posted_at(mut self, posted_at: Option<DateTime<Utc>>) -> Self {
        self.posted_at = posted_at;
        self
    }

    pub fn with_deadline_at(mut self, deadline_at: Option<DateTime<Utc>>) -> Self {
        self.deadline_at = deadline_at;
        self
    }
}

/// Result of one adapter call.
#[derive(Debug, Clone, Default)]
pub struct ScrapeBatch {
    /// Normalized postings ready for filtering
    pub postings: Vec<RawPosting>,
    /// Raw items dropped because they did not decode or a required field
    /// was empty
    pub malformed: usize,
}

impl ScrapeBatch {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of valid postings found.
    pub fn found(&self) -> usize {
        self.postings.len()
    }
}

/// Normalize one scraped item.
///
/// Trims every string field, drops the item if a required field is empty,
/// turns empty optional fields into `None`, stamps `scraped_at` and the
/// source id, and falls back to `scraped_at` when no publication time is
/// known.
pub fn normalize_item(
    source_id: &str,
    item: ScrapedItem,
    now: DateTime<Utc>,
) -> Result<RawPosting, AdapterError> {
    let title = required("title", &item.title)?;
    let company = required("company", &item.company)?;
    let location = required("location", &item.location)?;
    let description = required("description", &item.description)?;
    let canonical_url = required("url", &item.url)?;

    Ok(RawPosting {
        title,
        company,
        location,
        description,
        canonical_url,
        source: source_id.to_string(),
        requirements: optional(item.requirements),
        benefits: optional(item.benefits),
        salary: optional(item.salary),
        job_type: optional(item.job_type),
        contract_type: optional(item.contract_type),
        remote_type: optional(item.remote_type),
        experience_level: optional(item.experience_level),
        deadline_at: item.deadline_at,
        posted_at: item.posted_at.unwrap_or(now),
        scraped_at: now,
    })
}

fn required(field: &str, value: &str) -> Result<String, AdapterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::malformed(format!("{field} is empty")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trait for job source adapters.
///
/// # Source Identifier
///
/// `source_id()` returns a lowercase, stable identifier. It is stored on
/// every posting and run record and is the key in the `SourceRegistry`.
///
/// # Failure Contract
///
/// `scrape` returns `Err` only when the source yields nothing at all
/// (typically `AdapterError::Unavailable` on the first request). A bad
/// item is logged, counted in `ScrapeBatch::malformed`, and skipped. A
/// failure on a later page keeps what was already collected.
///
/// Implementations must pace their own successive requests with a
/// randomized delay (see `RequestPacer`).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Canonical source identifier (lowercase, e.g., "arbeitsagentur").
    fn source_id(&self) -> &str;

    /// Human-readable source name.
    fn display_name(&self) -> &str;

    /// Fetch and normalize postings for a query.
    async fn scrape(&self, query: &SearchQuery) -> Result<ScrapeBatch, AdapterError>;

    /// Check if the adapter is configured well enough to run.
    ///
    /// Default implementation returns true.
    fn is_available(&self) -> bool {
        true
    }

    /// Convert one scraped item into a `RawPosting`.
    fn normalize(&self, item: ScrapedItem) -> Result<RawPosting, AdapterError> {
        normalize_item(self.source_id(), item, Utc::now())
    }

    /// Normalize a whole fetch, skipping and counting malformed items.
    fn normalize_all(&self, items: Vec<ScrapedItem>) -> ScrapeBatch {
        let mut batch = ScrapeBatch::empty();
        for item in items {
            let url = item.url.clone();
            match self.normalize(item) {
                Ok(posting) => batch.postings.push(posting),
                Err(e) => {
                    warn!(source = %self.source_id(), url = %url, error = %e, "Dropping item");
                    batch.malformed += 1;
                }
            }
        }
        debug!(
            source = %self.source_id(),
            found = batch.found(),
            malformed = batch.malformed,
            "Normalized scrape"
        );
        batch
    }
}
