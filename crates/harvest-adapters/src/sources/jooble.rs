//! Jooble aggregator REST API.
//!
//! Requires an API key, which is part of the request path. The key is held
//! as a [`SecretString`] and never logged.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use harvest_types::{JoobleSettings, SearchQuery};

use crate::adapter::{ScrapeBatch, ScrapedItem, SourceAdapter};
use crate::config::AdapterConfig;
use crate::dates::parse_posted_date;
use crate::error::AdapterError;
use crate::http::HttpFetcher;
use crate::sources::{decode_items, strip_html};

pub const SOURCE_ID: &str = "jooble";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    keywords: &'a str,
    location: &'a str,
    page: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total_count: Option<u64>,
    #[serde(default)]
    jobs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JoobleJob {
    #[serde(default)]
    title: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default, rename = "type")]
    job_type: Option<String>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    updated: Option<String>,
}

impl JoobleJob {
    fn into_item(self) -> ScrapedItem {
        let now = Utc::now();
        let posted_at = self
            .updated
            .as_deref()
            .and_then(|s| parse_posted_date(s, now));
        let job_type = self.job_type.map(|t| t.trim().to_lowercase());

        let mut item = ScrapedItem::new(
            self.title,
            self.company,
            self.location,
            strip_html(&self.snippet),
            self.link,
        )
        .with_job_type(job_type)
        .with_posted_at(posted_at);
        item.salary = self.salary;
        item
    }
}

/// Adapter for the Jooble API.
pub struct JoobleAdapter {
    base_url: String,
    api_key: Option<SecretString>,
    max_pages: u32,
    config: AdapterConfig,
    http: HttpFetcher,
}

impl JoobleAdapter {
    pub fn new(settings: JoobleSettings, config: AdapterConfig) -> Result<Self, AdapterError> {
        let http = HttpFetcher::new(&config)?;
        let api_key = settings
            .api_key
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_pages: settings.max_pages.max(1),
            config,
            http,
        })
    }
}

#[async_trait]
impl SourceAdapter for JoobleAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn display_name(&self) -> &str {
        "Jooble"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn scrape(&self, query: &SearchQuery) -> Result<ScrapeBatch, AdapterError> {
        let Some(api_key) = &self.api_key else {
            return Err(AdapterError::unavailable(SOURCE_ID, "no API key configured"));
        };
        info!(keyword = %query.keyword, location = %query.location, "Scraping Jooble");

        let url = format!("{}/{}", self.base_url, api_key.expose_secret());
        let max_results = self.config.max_results;
        let mut pacer = self.config.pacer();
        let mut items = Vec::new();
        let mut seen = 0u64;
        let mut undecodable = 0;

        for page in 1..=self.max_pages {
            pacer.pace().await;
            let request = SearchRequest {
                keywords: &query.keyword,
                location: &query.location,
                page: page.to_string(),
            };
            let response: SearchResponse =
                match self.http.post_json(&url, "jooble/search", &request).await {
                    Ok(response) => response,
                    Err(e) if page == 1 => {
                        return Err(AdapterError::unavailable(SOURCE_ID, e.to_string()));
                    }
                    Err(e) => {
                        warn!(page, error = %e, "Page failed, keeping collected items");
                        break;
                    }
                };

            let returned = response.jobs.len();
            debug!(page, returned, total = ?response.total_count, "Fetched page");
            if returned == 0 {
                break;
            }
            let (jobs, failed) = decode_items::<JoobleJob>(SOURCE_ID, response.jobs);
            undecodable += failed;
            seen += returned as u64;
            items.extend(jobs.into_iter().map(JoobleJob::into_item));

            let exhausted = response.total_count.is_some_and(|total| seen >= total);
            if exhausted || items.len() >= max_results {
                break;
            }
        }

        items.truncate(max_results);
        let mut batch = self.normalize_all(items);
        batch.malformed += undecodable;
        Ok(batch)
    }
}
