//! Configuration loading for job-harvest.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/job-harvest/config.toml`.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::HarvestError;

/// Content filter rules.
///
/// Matching is case-insensitive. Internship terms are matched as whole
/// words; language phrases as substrings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Words in a title or job type that mark an internship or trainee role
    #[serde(default = "default_internship_terms")]
    pub internship_terms: Vec<String>,

    /// Names of the language whose fluency requirement excludes a posting
    #[serde(default = "default_language_terms")]
    pub language_terms: Vec<String>,

    /// Literal phrases that state a fluency requirement
    #[serde(default = "default_language_phrases")]
    pub language_phrases: Vec<String>,

    /// Accepted job types; an absent job type is always accepted
    #[serde(default = "default_allowed_job_types")]
    pub allowed_job_types: Vec<String>,
}

fn default_internship_terms() -> Vec<String> {
    to_strings(&[
        "intern",
        "interns",
        "internship",
        "praktikum",
        "praktikant",
        "praktikantin",
        "trainee",
    ])
}

fn default_language_terms() -> Vec<String> {
    to_strings(&["german", "deutsch"])
}

fn default_language_phrases() -> Vec<String> {
    to_strings(&[
        "fluent german",
        "fließend deutsch",
        "fliessend deutsch",
        "german fluency",
        "deutsch fließend",
        "deutsch fliessend",
        "native german",
        "muttersprachler deutsch",
        "verhandlungssicher deutsch",
        "verhandlungssichere deutschkenntnisse",
        "c1 deutsch",
        "c2 deutsch",
    ])
}

fn default_allowed_job_types() -> Vec<String> {
    to_strings(&["full-time", "full time", "fulltime", "vollzeit"])
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            internship_terms: default_internship_terms(),
            language_terms: default_language_terms(),
            language_phrases: default_language_phrases(),
            allowed_job_types: default_allowed_job_types(),
        }
    }
}

/// Federal Employment Agency job search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbeitsagenturSettings {
    #[serde(default = "default_arbeitsagentur_url")]
    pub base_url: String,

    /// Public client id sent as `X-API-Key`
    #[serde(default = "default_arbeitsagentur_key")]
    pub api_key: String,

    /// Search radius around the location, in kilometres
    #[serde(default = "default_radius_km")]
    pub radius_km: u32,

    #[serde(default = "default_source_page_size")]
    pub page_size: u32,
}

fn default_arbeitsagentur_url() -> String {
    "https://rest.arbeitsagentur.de/jobboerse/jobsuche-service/pc/v4/jobs".to_string()
}

fn default_arbeitsagentur_key() -> String {
    "jobboerse-jobsuche".to_string()
}

fn default_radius_km() -> u32 {
    50
}

fn default_source_page_size() -> u32 {
    50
}

impl Default for ArbeitsagenturSettings {
    fn default() -> Self {
        Self {
            base_url: default_arbeitsagentur_url(),
            api_key: default_arbeitsagentur_key(),
            radius_km: default_radius_km(),
            page_size: default_source_page_size(),
        }
    }
}

/// Arbeitnow public job board API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbeitnowSettings {
    #[serde(default = "default_arbeitnow_url")]
    pub base_url: String,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_arbeitnow_url() -> String {
    "https://www.arbeitnow.com/api/job-board-api".to_string()
}

fn default_max_pages() -> u32 {
    5
}

impl Default for ArbeitnowSettings {
    fn default() -> Self {
        Self {
            base_url: default_arbeitnow_url(),
            max_pages: default_max_pages(),
        }
    }
}

/// Jooble aggregator API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoobleSettings {
    #[serde(default = "default_jooble_url")]
    pub base_url: String,

    /// API key (loaded from env var, not stored in config file).
    /// The source reports itself unavailable without one.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_jooble_url() -> String {
    "https://jooble.org/api".to_string()
}

impl Default for JoobleSettings {
    fn default() -> Self {
        Self {
            base_url: default_jooble_url(),
            api_key: None,
            max_pages: default_max_pages(),
        }
    }
}

/// Per-source settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub arbeitsagentur: ArbeitsagenturSettings,
    #[serde(default)]
    pub arbeitnow: ArbeitnowSettings,
    #[serde(default)]
    pub jooble: JoobleSettings,
}

/// Scheduled ingestion across a keyword x location matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,

    /// 6-field cron expression (default: every two hours)
    #[serde(default = "default_schedule_cron")]
    pub cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    #[serde(default = "default_locations")]
    pub locations: Vec<String>,

    /// Max random delay before a scheduled run starts
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,

    /// Upper bound on a whole scheduled run
    #[serde(default = "default_run_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_schedule_cron() -> String {
    "0 0 */2 * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_keywords() -> Vec<String> {
    to_strings(&["Data Scientist", "Software Engineer"])
}

fn default_locations() -> Vec<String> {
    to_strings(&["Germany"])
}

fn default_jitter_secs() -> u64 {
    60
}

fn default_run_timeout_secs() -> u64 {
    3600
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            cron: default_schedule_cron(),
            timezone: default_timezone(),
            keywords: default_keywords(),
            locations: default_locations(),
            jitter_secs: default_jitter_secs(),
            timeout_secs: default_run_timeout_secs(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Ceiling on active postings; the oldest are deactivated beyond it
    #[serde(default = "default_max_active_postings")]
    pub max_active_postings: usize,

    /// Minimum similarity (0-100) for two postings to be duplicates
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Sources used when a query does not name any
    #[serde(default = "default_sources")]
    pub default_sources: Vec<String>,

    /// Lower bound of the randomized delay between source requests
    #[serde(default = "default_delay_min_ms")]
    pub request_delay_min_ms: u64,

    /// Upper bound of the randomized delay between source requests
    #[serde(default = "default_delay_max_ms")]
    pub request_delay_max_ms: u64,

    /// Cap on postings collected from one source per run
    #[serde(default = "default_max_postings_per_source")]
    pub max_postings_per_source: usize,

    /// Wall-clock limit for one source's fetch
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Attempts per HTTP request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub filter: FilterSettings,

    #[serde(default)]
    pub sources: SourceSettings,

    #[serde(default)]
    pub schedule: ScheduleSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "job-harvest")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_active_postings() -> usize {
    5000
}

fn default_similarity_threshold() -> f64 {
    85.0
}

fn default_sources() -> Vec<String> {
    to_strings(&["arbeitsagentur", "arbeitnow", "jooble"])
}

fn default_delay_min_ms() -> u64 {
    2000
}

fn default_delay_max_ms() -> u64 {
    5000
}

fn default_max_postings_per_source() -> usize {
    500
}

fn default_source_timeout_secs() -> u64 {
    600
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!(
        "Mozilla/5.0 (X11; Linux x86_64) job-harvest/",
        env!("CARGO_PKG_VERSION")
    )
    .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            max_active_postings: default_max_active_postings(),
            similarity_threshold: default_similarity_threshold(),
            default_sources: default_sources(),
            request_delay_min_ms: default_delay_min_ms(),
            request_delay_max_ms: default_delay_max_ms(),
            max_postings_per_source: default_max_postings_per_source(),
            source_timeout_secs: default_source_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
            filter: FilterSettings::default(),
            sources: SourceSettings::default(),
            schedule: ScheduleSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/job-harvest/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (HARVEST_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, HarvestError> {
        let config_dir = ProjectDirs::from("", "", "job-harvest")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            // 1. Built-in defaults; nested sections fall back to serde defaults
            .set_default("db_path", default_db_path())
            .map_err(|e| HarvestError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| HarvestError::Config(e.to_string()))?
            .set_default("max_active_postings", default_max_active_postings() as i64)
            .map_err(|e| HarvestError::Config(e.to_string()))?
            .set_default("similarity_threshold", default_similarity_threshold())
            .map_err(|e| HarvestError::Config(e.to_string()))?
            .set_default("default_sources", default_sources())
            .map_err(|e| HarvestError::Config(e.to_string()))?
            // 2. Default config file
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        // 3. CLI-specified config file
        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // 4. Environment variables
        // Format: HARVEST_DB_PATH, HARVEST_SOURCES__JOOBLE__API_KEY,
        // HARVEST_DEFAULT_SOURCES=arbeitnow,jooble
        builder = builder.add_source(
            Environment::with_prefix("HARVEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("default_sources")
                .with_list_parse_key("schedule.keywords")
                .with_list_parse_key("schedule.locations"),
        );

        let config = builder
            .build()
            .map_err(|e| HarvestError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| HarvestError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that cannot produce a coherent run.
    pub fn validate(&self) -> Result<(), HarvestError> {
        if !(0.0..=100.0).contains(&self.similarity_threshold) {
            return Err(HarvestError::Config(format!(
                "similarity_threshold must be 0-100, got {}",
                self.similarity_threshold
            )));
        }
        if self.max_active_postings == 0 {
            return Err(HarvestError::Config(
                "max_active_postings must be > 0".to_string(),
            ));
        }
        if self.request_delay_min_ms > self.request_delay_max_ms {
            return Err(HarvestError::Config(format!(
                "request_delay_min_ms ({}) exceeds request_delay_max_ms ({})",
                self.request_delay_min_ms, self.request_delay_max_ms
            )));
        }
        if self.source_timeout_secs == 0 {
            return Err(HarvestError::Config(
                "source_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(HarvestError::Config("max_retries must be > 0".to_string()));
        }
        Ok(())
    }

    /// Expand ~ in db_path to actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
