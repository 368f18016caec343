//! # shelf server entry point
//!
//! Parses command-line arguments, builds the storage backend and the
//! coherence engine, runs the initial index build, and serves the Axum
//! application — with a background refresh ticker when a cache interval
//! is configured.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shelf_api::state::{AppState, RepoConfig};
use shelf_storage::LocalBackend;

/// Shelf — a self-hosted chart repository server.
///
/// Serves the repository `index.yaml`, chart package downloads, and — when
/// the API is enabled — chart publication and deletion over HTTP.
#[derive(Parser, Debug)]
#[command(name = "shelf", version, about, long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "SHELF_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory holding chart packages (local filesystem storage).
    #[arg(long, env = "SHELF_STORAGE_LOCAL_ROOTDIR", default_value = "./charts")]
    storage_local_rootdir: PathBuf,

    /// Absolute base URL inserted into index download links. When unset,
    /// links stay relative to the repository root.
    #[arg(long, env = "SHELF_CHART_URL")]
    chart_url: Option<String>,

    /// Allow uploads to replace artifacts that already exist in storage.
    #[arg(long, env = "SHELF_ALLOW_OVERWRITE", default_value_t = false)]
    allow_overwrite: bool,

    /// Seconds between background index refreshes. Zero refreshes the
    /// index on every read instead.
    #[arg(long, env = "SHELF_CACHE_INTERVAL", default_value_t = 0)]
    cache_interval: u64,

    /// Disable the /api surface, serving a read-only repository.
    #[arg(long, env = "SHELF_DISABLE_API", default_value_t = false)]
    disable_api: bool,

    /// Multipart form field name carrying the chart package.
    #[arg(long, default_value = "chart")]
    chart_post_form_field_name: String,

    /// Multipart form field name carrying the provenance file.
    #[arg(long, default_value = "prov")]
    prov_post_form_field_name: String,

    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn repo_config(&self) -> RepoConfig {
        RepoConfig {
            allow_overwrite: self.allow_overwrite,
            cache_interval: Duration::from_secs(self.cache_interval),
            chart_url: self.chart_url.clone(),
            chart_post_form_field_name: self.chart_post_form_field_name.clone(),
            prov_post_form_field_name: self.prov_post_form_field_name.clone(),
            enable_api: !self.disable_api,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.repo_config();
    let backend = Arc::new(LocalBackend::new(&cli.storage_local_rootdir));
    let state = AppState::new(backend, config.clone());

    // Build the index before accepting traffic so the first request never
    // sees an empty repository.
    state.cache.reconcile().await.map_err(|err| {
        tracing::error!(error = %err, "initial index build failed");
        err
    })?;
    tracing::info!(
        storage = %cli.storage_local_rootdir.display(),
        charts = state.cache.current().version_count(),
        "repository index built"
    );

    if config.periodic_refresh() {
        spawn_refresh_ticker(state.cache.clone(), config.cache_interval);
    }

    let app = shelf_api::app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("shelf listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Reconcile the index on a fixed cadence. Ticks are serialized — a tick
/// in progress delays the next one rather than overlapping it.
fn spawn_refresh_ticker(cache: Arc<shelf_api::cache::RepoCache>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick of a tokio interval fires immediately; the initial
        // reconcile already ran, so consume it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cache.reconcile().await {
                Ok(true) => tracing::debug!("periodic refresh applied storage changes"),
                Ok(false) => {}
                Err(error) => tracing::warn!(%error, "periodic index refresh failed"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["shelf"]).unwrap();
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.cache_interval, 0);
        assert!(!cli.allow_overwrite);
        assert!(!cli.disable_api);
        assert_eq!(cli.chart_post_form_field_name, "chart");
        assert_eq!(cli.prov_post_form_field_name, "prov");

        let config = cli.repo_config();
        assert!(config.refresh_on_read());
        assert!(config.enable_api);
    }

    #[test]
    fn cli_parses_full_flag_set() {
        let cli = Cli::try_parse_from([
            "shelf",
            "--port",
            "9000",
            "--storage-local-rootdir",
            "/srv/charts",
            "--chart-url",
            "https://charts.example.com",
            "--allow-overwrite",
            "--cache-interval",
            "60",
            "--disable-api",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.storage_local_rootdir, PathBuf::from("/srv/charts"));
        assert_eq!(cli.chart_url.as_deref(), Some("https://charts.example.com"));
        assert!(cli.allow_overwrite);
        assert_eq!(cli.verbose, 1);

        let config = cli.repo_config();
        assert!(config.periodic_refresh());
        assert_eq!(config.cache_interval, Duration::from_secs(60));
        assert!(!config.enable_api);
    }

    #[test]
    fn cli_rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["shelf", "--no-such-flag"]).is_err());
    }
}
