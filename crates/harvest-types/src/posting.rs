//! Posting types.
//!
//! A `RawPosting` is what a source adapter hands to the pipeline after
//! normalization. A `Posting` is the persisted corpus record; it is created
//! on the first sighting of a canonical URL and updated in place afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate posting identifier.
///
/// Allocated from a monotonically increasing sequence, so comparing ids
/// compares insertion order.
pub type PostingId = u64;

/// A normalized posting produced by a source adapter.
///
/// Required fields are non-empty and trimmed; optional fields are `None`
/// when the source did not provide them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,

    /// Unique identifying URL at the source; the upsert key
    pub canonical_url: String,

    /// Identifier of the adapter that produced this posting
    pub source: String,

    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub remote_type: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,

    /// Application deadline, when the source publishes one
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub deadline_at: Option<DateTime<Utc>>,

    /// When the source says the posting was published
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub posted_at: DateTime<Utc>,

    /// When the adapter fetched it
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub scraped_at: DateTime<Utc>,
}

/// A job advertisement in the corpus.
///
/// Invariants maintained by the pipeline:
/// - `canonical_url` is unique across active and inactive postings
/// - `is_duplicate` implies `duplicate_of` points at a non-duplicate posted no later
/// - postings are never hard-deleted; `is_active` only moves from true to false
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: PostingId,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub remote_type: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    pub canonical_url: String,
    pub source: String,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub deadline_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub posted_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub scraped_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    pub is_active: bool,
    pub is_duplicate: bool,
    #[serde(default)]
    pub duplicate_of: Option<PostingId>,
    #[serde(default)]
    pub view_count: u64,
}

impl Posting {
    /// Create a new active, non-duplicate posting from adapter output.
    pub fn from_raw(id: PostingId, raw: RawPosting, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: raw.title,
            company: raw.company,
            location: raw.location,
            description: raw.description,
            requirements: raw.requirements,
            benefits: raw.benefits,
            salary: raw.salary,
            job_type: raw.job_type,
            contract_type: raw.contract_type,
            remote_type: raw.remote_type,
            experience_level: raw.experience_level,
            canonical_url: raw.canonical_url,
            source: raw.source,
            deadline_at: raw.deadline_at,
            posted_at: raw.posted_at,
            scraped_at: raw.scraped_at,
            created_at: now,
            updated_at: now,
            is_active: true,
            is_duplicate: false,
            duplicate_of: None,
            view_count: 0,
        }
    }

    /// Overwrite the mutable fields with a fresh scrape of the same URL.
    ///
    /// Identity, owning source, first-sighting `posted_at`, creation time,
    /// duplicate marking, activity and view count are left untouched.
    /// Dedup ordering and capacity ageing both read `posted_at`, so it must
    /// not move once stored.
    pub fn apply_rescrape(&mut self, raw: RawPosting, now: DateTime<Utc>) {
        self.title = raw.title;
        self.company = raw.company;
        self.location = raw.location;
        self.description = raw.description;
        self.requirements = raw.requirements;
        self.benefits = raw.benefits;
        self.salary = raw.salary;
        self.job_type = raw.job_type;
        self.contract_type = raw.contract_type;
        self.remote_type = raw.remote_type;
        self.experience_level = raw.experience_level;
        self.deadline_at = raw.deadline_at;
        self.scraped_at = raw.scraped_at;
        self.updated_at = now;
    }

    /// True when the posting is eligible for deduplication and downstream reads.
    pub fn is_live(&self) -> bool {
        self.is_active && !self.is_duplicate
    }

    /// Serialize posting to JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize posting from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn raw(url: &str) -> RawPosting {
        let now = Utc::now();
        RawPosting {
            title: "Data Engineer".to_string(),
            company: "Acme GmbH".to_string(),
            location: "Berlin".to_string(),
            description: "Build pipelines".to_string(),
            canonical_url: url.to_string(),
            source: "arbeitnow".to_string(),
            requirements: None,
            benefits: None,
            salary: Some("60k".to_string()),
            job_type: Some("full-time".to_string()),
            contract_type: None,
            remote_type: None,
            experience_level: None,
            deadline_at: None,
            posted_at: now - Duration::days(1),
            scraped_at: now,
        }
    }

    #[test]
    fn test_from_raw_starts_active() {
        let posting = Posting::from_raw(7, raw("https://x/1"), Utc::now());
        assert_eq!(posting.id, 7);
        assert!(posting.is_active);
        assert!(!posting.is_duplicate);
        assert!(posting.duplicate_of.is_none());
        assert_eq!(posting.view_count, 0);
        assert!(posting.is_live());
    }

    #[test]
    fn test_rescrape_preserves_identity_and_flags() {
        let created = Utc::now() - Duration::days(3);
        let mut posting = Posting::from_raw(3, raw("https://x/1"), created);
        posting.is_duplicate = true;
        posting.duplicate_of = Some(1);
        posting.view_count = 4;

        let mut fresh = raw("https://x/1");
        fresh.title = "Senior Data Engineer".to_string();
        fresh.salary = None;
        let now = Utc::now();
        posting.apply_rescrape(fresh, now);

        assert_eq!(posting.id, 3);
        assert_eq!(posting.created_at, created);
        assert_eq!(posting.title, "Senior Data Engineer");
        assert!(posting.salary.is_none());
        assert!(posting.is_duplicate);
        assert_eq!(posting.duplicate_of, Some(1));
        assert_eq!(posting.view_count, 4);
        assert_eq!(posting.updated_at, now);
    }

    #[test]
    fn test_rescrape_keeps_source_and_posted_at() {
        let mut posting = Posting::from_raw(5, raw("https://x/5"), Utc::now());
        let first_seen = posting.posted_at;

        let mut fresh = raw("https://x/5");
        fresh.source = "jooble".to_string();
        fresh.posted_at = Utc::now();
        fresh.scraped_at = fresh.posted_at;
        posting.apply_rescrape(fresh.clone(), Utc::now());

        assert_eq!(posting.source, "arbeitnow");
        assert_eq!(posting.posted_at, first_seen);
        assert_eq!(posting.scraped_at, fresh.scraped_at);
    }

    #[test]
    fn test_posting_serialization_roundtrip() {
        let posting = Posting::from_raw(42, raw("https://x/42"), Utc::now());
        let bytes = posting.to_bytes().unwrap();
        let decoded = Posting::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.canonical_url, "https://x/42");
        assert_eq!(
            decoded.posted_at.timestamp_millis(),
            posting.posted_at.timestamp_millis()
        );
    }
}
