//! In-memory source for tests and dry runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use harvest_types::SearchQuery;

use crate::adapter::{ScrapeBatch, ScrapedItem, SourceAdapter};
use crate::error::AdapterError;

/// A source that serves a fixed list of items.
///
/// Can be switched to fail every call, to report itself unavailable, or to
/// stall before answering.
pub struct StaticSource {
    id: String,
    items: Vec<ScrapedItem>,
    failure: Option<String>,
    available: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(id: impl Into<String>, items: Vec<ScrapedItem>) -> Self {
        Self {
            id: id.into(),
            items,
            failure: None,
            available: true,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A source whose every scrape fails with `message`.
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut source = Self::new(id, Vec::new());
        source.failure = Some(message.into());
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Number of scrape calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn scrape(&self, _query: &SearchQuery) -> Result<ScrapeBatch, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(AdapterError::unavailable(&self.id, message.clone()));
        }
        Ok(self.normalize_all(self.items.clone()))
    }
}
