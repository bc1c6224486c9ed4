//! Settings shared by every HTTP-backed adapter.

use std::time::Duration;

use harvest_types::Settings;

use crate::pacing::RequestPacer;

/// Common adapter knobs derived from [`Settings`].
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Per-request timeout
    pub http_timeout: Duration,

    /// Attempts per request, including the first
    pub max_retries: u32,

    /// First backoff interval between retries
    pub initial_backoff: Duration,

    pub user_agent: String,

    /// Cap on postings collected per scrape
    pub max_results: usize,

    /// Bounds of the randomized delay between requests
    pub delay_min: Duration,
    pub delay_max: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl AdapterConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            http_timeout: Duration::from_secs(settings.http_timeout_secs),
            max_retries: settings.max_retries.max(1),
            initial_backoff: Duration::from_millis(500),
            user_agent: settings.user_agent.clone(),
            max_results: settings.max_postings_per_source,
            delay_min: Duration::from_millis(settings.request_delay_min_ms),
            delay_max: Duration::from_millis(settings.request_delay_max_ms),
        }
    }

    /// Config for tests and local runs: no pacing, fast retries.
    pub fn without_delays(mut self) -> Self {
        self.delay_min = Duration::ZERO;
        self.delay_max = Duration::ZERO;
        self.initial_backoff = Duration::from_millis(5);
        self
    }

    /// Set the cap on postings collected per scrape.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Fresh pacer for one scrape.
    pub fn pacer(&self) -> RequestPacer {
        RequestPacer::new(self.delay_min, self.delay_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = Settings::default();
        let config = AdapterConfig::from_settings(&settings);
        assert_eq!(config.max_results, 500);
        assert_eq!(config.delay_min, Duration::from_secs(2));
        assert_eq!(config.delay_max, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_without_delays() {
        let config = AdapterConfig::default().without_delays().with_max_results(7);
        assert!(config.delay_max.is_zero());
        assert_eq!(config.max_results, 7);
        let mut pacer = config.pacer();
        pacer.next_delay();
        assert!(pacer.next_delay().is_zero());
    }
}
