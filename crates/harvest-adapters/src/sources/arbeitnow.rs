//! Arbeitnow public job board.
//!
//! The endpoint has no search parameters; it pages through the whole
//! board, so keyword and location are matched locally.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use harvest_types::{ArbeitnowSettings, SearchQuery};

use crate::adapter::{ScrapeBatch, ScrapedItem, SourceAdapter};
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::http::HttpFetcher;
use crate::sources::{decode_items, strip_html};

pub const SOURCE_ID: &str = "arbeitnow";

/// Locations that mean "anywhere on the board".
const COUNTRY_WIDE: &[&str] = &["", "germany", "deutschland", "de"];

#[derive(Debug, Deserialize)]
struct BoardPage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoardJob {
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    remote: bool,
    #[serde(default)]
    url: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    job_types: Vec<String>,
    #[serde(default)]
    location: String,
    #[serde(default)]
    created_at: Option<i64>,
}

impl BoardJob {
    fn matches(&self, query: &SearchQuery) -> bool {
        let keyword = query.keyword.trim().to_lowercase();
        let keyword_hit = keyword.is_empty()
            || self.title.to_lowercase().contains(&keyword)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&keyword));

        let location = query.location.trim().to_lowercase();
        let location_hit = COUNTRY_WIDE.contains(&location.as_str())
            || self.remote
            || self.location.to_lowercase().contains(&location);

        keyword_hit && location_hit
    }

    fn job_type(&self) -> Option<String> {
        self.job_types.iter().find_map(|t| {
            let t = t.to_lowercase();
            if t.contains("full") || t.contains("vollzeit") {
                Some("full-time".to_string())
            } else if t.contains("part") || t.contains("teilzeit") {
                Some("part-time".to_string())
            } else if t.contains("intern") || t.contains("praktikum") {
                Some("internship".to_string())
            } else {
                None
            }
        })
    }

    fn contract_type(&self) -> Option<String> {
        self.job_types.iter().find_map(|t| {
            let t = t.to_lowercase();
            if t.contains("permanent") || t.contains("festanstellung") || t.contains("unbefristet") {
                Some("permanent".to_string())
            } else if t.contains("contract") || t.contains("freelance") || t.contains("befristet") {
                Some("contract".to_string())
            } else {
                None
            }
        })
    }

    fn experience_level(&self) -> Option<String> {
        self.job_types.iter().find_map(|t| match t.to_lowercase().as_str() {
            "berufserfahren" | "professional / experienced" => Some("experienced".to_string()),
            "berufseinstieg" | "entry level" => Some("entry".to_string()),
            _ => None,
        })
    }

    fn into_item(self) -> ScrapedItem {
        let job_type = self.job_type();
        let contract_type = self.contract_type();
        let experience_level = self.experience_level();
        let remote_type = self.remote.then(|| "remote".to_string());
        let posted_at = self
            .created_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        ScrapedItem::new(
            self.title,
            self.company_name,
            self.location,
            strip_html(&self.description),
            self.url,
        )
        .with_job_type(job_type)
        .with_contract_type(contract_type)
        .with_remote_type(remote_type)
        .with_experience_level(experience_level)
        .with_posted_at(posted_at)
    }
}

/// Adapter for the Arbeitnow job board API.
pub struct ArbeitnowAdapter {
    settings: ArbeitnowSettings,
    config: AdapterConfig,
    http: HttpFetcher,
}

impl ArbeitnowAdapter {
    pub fn new(settings: ArbeitnowSettings, config: AdapterConfig) -> Result<Self, AdapterError> {
        let http = HttpFetcher::new(&config)?;
        Ok(Self {
            settings,
            config,
            http,
        })
    }
}

#[async_trait]
impl SourceAdapter for ArbeitnowAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn display_name(&self) -> &str {
        "Arbeitnow"
    }

    async fn scrape(&self, query: &SearchQuery) -> Result<ScrapeBatch, AdapterError> {
        info!(keyword = %query.keyword, location = %query.location, "Scraping Arbeitnow");

        let max_results = self.config.max_results;
        let mut pacer = self.config.pacer();
        let mut items = Vec::new();
        let mut undecodable = 0;

        for page in 1..=self.settings.max_pages.max(1) {
            pacer.pace().await;
            let response: BoardPage = match self
                .http
                .get_json(&self.settings.base_url, &[("page", page.to_string())], &[])
                .await
            {
                Ok(response) => response,
                Err(e) if page == 1 => {
                    return Err(AdapterError::unavailable(SOURCE_ID, e.to_string()));
                }
                Err(e) => {
                    warn!(page, error = %e, "Page failed, keeping collected items");
                    break;
                }
            };

            let returned = response.data.len();
            let has_next = response
                .links
                .as_ref()
                .and_then(|links| links.next.as_ref())
                .is_some();

            let (jobs, failed) = decode_items::<BoardJob>(SOURCE_ID, response.data);
            undecodable += failed;
            items.extend(
                jobs.into_iter()
                    .filter(|job| job.matches(query))
                    .map(BoardJob::into_item),
            );
            debug!(page, returned, matched = items.len(), "Fetched page");

            if returned == 0 || !has_next || items.len() >= max_results {
                break;
            }
        }

        items.truncate(max_results);
        let mut batch = self.normalize_all(items);
        batch.malformed += undecodable;
        Ok(batch)
    }
}
