//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor. Holds the storage backend, the index coherence
//! engine, and the server configuration. Clone-friendly via `Arc`
//! internals.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::RepoCache;
use shelf_storage::Backend;

/// Server configuration consumed by the request handlers and the engine.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Whether an upload may replace an artifact that already exists in
    /// storage. When false, existence is probed before every write and a
    /// hit is a conflict.
    pub allow_overwrite: bool,
    /// Refresh cadence. Zero selects refresh-on-read: every read path
    /// reconciles inline before serving. Non-zero selects periodic
    /// refresh: a background ticker reconciles and mutations update the
    /// index incrementally.
    pub cache_interval: Duration,
    /// Base URL prepended to relative download URLs in index entries.
    pub chart_url: Option<String>,
    /// Multipart form field carrying the chart package.
    pub chart_post_form_field_name: String,
    /// Multipart form field carrying the provenance file.
    pub prov_post_form_field_name: String,
    /// Whether the `/api` surface (chart queries and mutations) is
    /// mounted at all. Disabled yields a read-only repository.
    pub enable_api: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            allow_overwrite: false,
            cache_interval: Duration::ZERO,
            chart_url: None,
            chart_post_form_field_name: "chart".to_string(),
            prov_post_form_field_name: "prov".to_string(),
            enable_api: true,
        }
    }
}

impl RepoConfig {
    /// Whether reads must reconcile inline before serving.
    pub fn refresh_on_read(&self) -> bool {
        self.cache_interval.is_zero()
    }

    /// Whether the index is maintained by the ticker plus incremental
    /// mutation updates.
    pub fn periodic_refresh(&self) -> bool {
        !self.refresh_on_read()
    }
}

/// Shared application state accessible to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The blob store. Handlers use it directly for downloads and writes;
    /// the engine uses its own handle for listings and fetches.
    pub backend: Arc<dyn Backend>,
    /// The index coherence engine.
    pub cache: Arc<RepoCache>,
    pub config: RepoConfig,
}

impl AppState {
    /// Assemble state over a backend. The engine starts empty; callers run
    /// an initial [`RepoCache::reconcile`] before serving traffic.
    pub fn new(backend: Arc<dyn Backend>, config: RepoConfig) -> Self {
        let cache = Arc::new(RepoCache::new(backend.clone(), config.chart_url.clone()));
        Self {
            backend,
            cache,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_refresh_on_read() {
        let config = RepoConfig::default();
        assert!(config.refresh_on_read());
        assert!(!config.periodic_refresh());
        assert!(!config.allow_overwrite);
        assert!(config.enable_api);
        assert_eq!(config.chart_post_form_field_name, "chart");
        assert_eq!(config.prov_post_form_field_name, "prov");
    }

    #[test]
    fn nonzero_interval_selects_periodic_refresh() {
        let config = RepoConfig {
            cache_interval: Duration::from_secs(30),
            ..RepoConfig::default()
        };
        assert!(config.periodic_refresh());
        assert!(!config.refresh_on_read());
    }
}
