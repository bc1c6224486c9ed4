//! Federal Employment Agency (Bundesagentur für Arbeit) job search.
//!
//! Pages through the public `jobsuche` REST endpoint. The list view has no
//! full description, so `beruf` and `taetigkeit` stand in for it.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use harvest_types::{ArbeitsagenturSettings, SearchQuery};

use crate::adapter::{ScrapeBatch, ScrapedItem, SourceAdapter};
use crate::config::AdapterConfig;
use crate::dates::parse_posted_date;
use crate::error::AdapterError;
use crate::http::HttpFetcher;
use crate::sources::decode_items;

pub const SOURCE_ID: &str = "arbeitsagentur";

const DETAILS_URL: &str = "https://www.arbeitsagentur.de/jobsuche/jobdetails";

/// Only regular employment offers
const OFFER_TYPE_EMPLOYMENT: &str = "1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    stellenangebote: Vec<Value>,
    #[serde(default)]
    max_ergebnisse: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Offer {
    #[serde(default)]
    refnr: String,
    #[serde(default)]
    titel: String,
    #[serde(default)]
    arbeitgeber: String,
    #[serde(default)]
    arbeitsort: Option<WorkPlace>,
    #[serde(default)]
    aktuelle_veroeffentlichungsdatum: Option<String>,
    #[serde(default)]
    beruf: Option<String>,
    #[serde(default)]
    taetigkeit: Option<String>,
    #[serde(default)]
    angebotsart: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WorkPlace {
    #[serde(default)]
    ort: Option<String>,
}

/// Numbers arrive as JSON numbers or numeric strings.
fn as_count(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn employment_type(code: Option<&Value>) -> Option<String> {
    let code = match code? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    match code.as_str() {
        "1" => Some("full-time".to_string()),
        "2" => Some("part-time".to_string()),
        "4" => Some("internship".to_string()),
        _ => None,
    }
}

impl Offer {
    fn into_item(self) -> ScrapedItem {
        let now = Utc::now();
        let description = [self.beruf.as_deref(), self.taetigkeit.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let url = if self.refnr.trim().is_empty() {
            String::new()
        } else {
            format!("{}/{}", DETAILS_URL, self.refnr.trim())
        };
        let location = self
            .arbeitsort
            .and_then(|place| place.ort)
            .unwrap_or_default();

        ScrapedItem::new(self.titel, self.arbeitgeber, location, description, url)
            .with_job_type(employment_type(self.angebotsart.as_ref()))
            .with_posted_at(
                self.aktuelle_veroeffentlichungsdatum
                    .as_deref()
                    .and_then(|s| parse_posted_date(s, now)),
            )
    }
}

/// Adapter for the Arbeitsagentur job search API.
pub struct ArbeitsagenturAdapter {
    settings: ArbeitsagenturSettings,
    config: AdapterConfig,
    http: HttpFetcher,
}

impl ArbeitsagenturAdapter {
    pub fn new(
        settings: ArbeitsagenturSettings,
        config: AdapterConfig,
    ) -> Result<Self, AdapterError> {
        let http = HttpFetcher::new(&config)?;
        Ok(Self {
            settings,
            config,
            http,
        })
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> Result<SearchResponse, AdapterError> {
        let params = [
            ("was", query.keyword.clone()),
            ("wo", query.location.clone()),
            ("umkreis", self.settings.radius_km.to_string()),
            ("page", page.to_string()),
            ("size", self.settings.page_size.to_string()),
            ("angebotsart", OFFER_TYPE_EMPLOYMENT.to_string()),
        ];
        self.http
            .get_json(
                &self.settings.base_url,
                &params,
                &[("X-API-Key", self.settings.api_key.as_str())],
            )
            .await
    }
}

#[async_trait]
impl SourceAdapter for ArbeitsagenturAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn display_name(&self) -> &str {
        "Bundesagentur für Arbeit"
    }

    async fn scrape(&self, query: &SearchQuery) -> Result<ScrapeBatch, AdapterError> {
        info!(keyword = %query.keyword, location = %query.location, "Scraping Arbeitsagentur");

        let page_size = self.settings.page_size.max(1) as usize;
        let max_results = self.config.max_results;
        let mut pacer = self.config.pacer();
        let mut items = Vec::new();
        let mut seen = 0usize;
        let mut undecodable = 0;
        let mut page = 1u32;

        while items.len() < max_results {
            pacer.pace().await;
            let response = match self.fetch_page(query, page).await {
                Ok(response) => response,
                Err(e) if page == 1 => {
                    return Err(AdapterError::unavailable(SOURCE_ID, e.to_string()));
                }
                Err(e) => {
                    warn!(page, error = %e, "Page failed, keeping collected items");
                    break;
                }
            };

            let returned = response.stellenangebote.len();
            debug!(page, returned, "Fetched page");
            if returned == 0 {
                break;
            }

            let total = response.max_ergebnisse.as_ref().and_then(as_count);
            let (offers, failed) = decode_items::<Offer>(SOURCE_ID, response.stellenangebote);
            undecodable += failed;
            seen += returned;
            items.extend(offers.into_iter().map(Offer::into_item));

            if returned < page_size || total.is_some_and(|total| seen >= total) {
                break;
            }
            page += 1;
        }

        items.truncate(max_results);
        let mut batch = self.normalize_all(items);
        batch.malformed += undecodable;
        Ok(batch)
    }
}
