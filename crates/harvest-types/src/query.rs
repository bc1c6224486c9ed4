//! Query types: ingestion requests and corpus listing filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::posting::Posting;

/// Default page size for posting listings
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound on page size for posting listings
pub const MAX_PAGE_SIZE: u32 = 100;

/// A request to run ingestion for a keyword and location.
///
/// `sources` of `None` means the configured default source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keyword: String,
    pub location: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            location: location.into(),
            sources: None,
        }
    }

    /// Restrict the run to the given source identifiers.
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Logical key used to serialize runs for the same query.
    ///
    /// Case and surrounding whitespace are ignored; the source list is not
    /// part of the key.
    pub fn logical_key(&self) -> String {
        format!(
            "{}|{}",
            self.keyword.trim().to_lowercase(),
            self.location.trim().to_lowercase()
        )
    }
}

/// Filters for reading the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingQuery {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub remote_type: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,

    /// Only postings published at or after this instant
    #[serde(default)]
    pub posted_after: Option<DateTime<Utc>>,

    /// Case-insensitive substring over title, company and location
    #[serde(default)]
    pub search: Option<String>,

    /// Include postings deactivated by capacity eviction
    #[serde(default)]
    pub include_inactive: bool,

    /// Include postings marked as duplicates
    #[serde(default)]
    pub include_duplicates: bool,

    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PostingQuery {
    fn default() -> Self {
        Self {
            source: None,
            job_type: None,
            remote_type: None,
            experience_level: None,
            posted_after: None,
            search: None,
            include_inactive: false,
            include_duplicates: false,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PostingQuery {
    /// Page number, at least 1.
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Number of matching rows to skip before the requested page.
    pub fn offset(&self) -> usize {
        (self.effective_page() as usize - 1) * self.effective_page_size() as usize
    }

    /// Check whether a posting passes every filter.
    pub fn matches(&self, posting: &Posting) -> bool {
        if !self.include_inactive && !posting.is_active {
            return false;
        }
        if !self.include_duplicates && posting.is_duplicate {
            return false;
        }
        if let Some(source) = &self.source {
            if !posting.source.eq_ignore_ascii_case(source) {
                return false;
            }
        }
        if !field_matches(&self.job_type, &posting.job_type)
            || !field_matches(&self.remote_type, &posting.remote_type)
            || !field_matches(&self.experience_level, &posting.experience_level)
        {
            return false;
        }
        if let Some(after) = self.posted_after {
            if posting.posted_at < after {
                return false;
            }
        }
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let hit = [&posting.title, &posting.company, &posting.location]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

fn field_matches(filter: &Option<String>, value: &Option<String>) -> bool {
    match (filter, value) {
        (None, _) => true,
        (Some(wanted), Some(actual)) => actual.eq_ignore_ascii_case(wanted),
        (Some(_), None) => false,
    }
}

/// One page of a corpus listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingPage {
    pub postings: Vec<Posting>,
    /// Total number of matching postings across all pages
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::RawPosting;
    use chrono::Duration;

    fn posting(title: &str, source: &str) -> Posting {
        let now = Utc::now();
        Posting::from_raw(
            1,
            RawPosting {
                title: title.to_string(),
                company: "Acme GmbH".to_string(),
                location: "Berlin".to_string(),
                description: "desc".to_string(),
                canonical_url: "https://example.com/1".to_string(),
                source: source.to_string(),
                requirements: None,
                benefits: None,
                salary: None,
                job_type: Some("full-time".to_string()),
                contract_type: None,
                remote_type: Some("remote".to_string()),
                experience_level: None,
                deadline_at: None,
                posted_at: now - Duration::days(2),
                scraped_at: now,
            },
            now,
        )
    }

    #[test]
    fn test_logical_key_ignores_case_and_whitespace() {
        let a = SearchQuery::new("Data Scientist", " Berlin ");
        let b = SearchQuery::new("data scientist", "berlin").with_sources(["jooble"]);
        assert_eq!(a.logical_key(), b.logical_key());
    }

    #[test]
    fn test_page_size_clamped() {
        let query = PostingQuery {
            page: 0,
            page_size: 500,
            ..Default::default()
        };
        assert_eq!(query.effective_page(), 1);
        assert_eq!(query.effective_page_size(), MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = PostingQuery {
            page: 3,
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn test_default_hides_inactive_and_duplicates() {
        let query = PostingQuery::default();
        let mut p = posting("ML Engineer", "arbeitnow");
        assert!(query.matches(&p));

        p.is_duplicate = true;
        assert!(!query.matches(&p));

        let with_dups = PostingQuery {
            include_duplicates: true,
            ..Default::default()
        };
        assert!(with_dups.matches(&p));

        p.is_active = false;
        assert!(!with_dups.matches(&p));
    }

    #[test]
    fn test_field_filters() {
        let p = posting("ML Engineer", "arbeitnow");

        let by_source = PostingQuery {
            source: Some("ARBEITNOW".to_string()),
            ..Default::default()
        };
        assert!(by_source.matches(&p));

        let by_level = PostingQuery {
            experience_level: Some("senior".to_string()),
            ..Default::default()
        };
        assert!(!by_level.matches(&p));

        let by_remote = PostingQuery {
            remote_type: Some("Remote".to_string()),
            ..Default::default()
        };
        assert!(by_remote.matches(&p));

        let too_recent = PostingQuery {
            posted_after: Some(Utc::now() - Duration::days(1)),
            ..Default::default()
        };
        assert!(!too_recent.matches(&p));
    }

    #[test]
    fn test_search_matches_title_company_location() {
        let p = posting("ML Engineer", "arbeitnow");
        for needle in ["ml eng", "ACME", "berl"] {
            let query = PostingQuery {
                search: Some(needle.to_string()),
                ..Default::default()
            };
            assert!(query.matches(&p), "{needle} should match");
        }
        let query = PostingQuery {
            search: Some("munich".to_string()),
            ..Default::default()
        };
        assert!(!query.matches(&p));
    }
}
