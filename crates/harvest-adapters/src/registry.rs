//! Source adapter registry.
//!
//! Built once at startup and handed to the orchestrator; there is no global
//! registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use harvest_types::Settings;

use crate::adapter::SourceAdapter;
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::sources::{ArbeitnowAdapter, ArbeitsagenturAdapter, JoobleAdapter};

/// Maps source ids to adapters.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in HTTP adapter.
    pub fn from_settings(settings: &Settings) -> Result<Self, AdapterError> {
        let config = AdapterConfig::from_settings(settings);
        let mut registry = Self::new();
        registry.register(Arc::new(ArbeitsagenturAdapter::new(
            settings.sources.arbeitsagentur.clone(),
            config.clone(),
        )?));
        registry.register(Arc::new(ArbeitnowAdapter::new(
            settings.sources.arbeitnow.clone(),
            config.clone(),
        )?));
        registry.register(Arc::new(JoobleAdapter::new(
            settings.sources.jooble.clone(),
            config,
        )?));
        info!(sources = ?registry.ids(), "Source registry built");
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one with the same id.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.insert(adapter.source_id().to_string(), adapter)
    }

    /// Builder form of [`SourceRegistry::register`].
    pub fn with(mut self, adapter: impl SourceAdapter + 'static) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(source_id).cloned()
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.adapters.contains_key(source_id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticSource;

    #[test]
    fn test_register_and_lookup() {
        let registry = SourceRegistry::new()
            .with(StaticSource::new("beta", vec![]))
            .with(StaticSource::new("alpha", vec![]));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["alpha", "beta"]);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("gamma").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = SourceRegistry::new();
        assert!(registry.register(Arc::new(StaticSource::new("a", vec![]))).is_none());
        assert!(registry.register(Arc::new(StaticSource::new("a", vec![]))).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_settings_builds_builtin_sources() {
        let registry = SourceRegistry::from_settings(&Settings::default()).unwrap();
        assert_eq!(registry.ids(), vec!["arbeitnow", "arbeitsagentur", "jooble"]);
        // No Jooble key in default settings
        let jooble = registry.get("jooble").unwrap();
        assert!(!jooble.is_available());
        assert!(registry.get("arbeitsagentur").unwrap().is_available());
    }
}
