use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use laracasts_dl::cache::FileCache;
use laracasts_dl::catalog::SeriesCatalog;
use laracasts_dl::client::LaracastsClient;
use laracasts_dl::config::{Config, Verbosity};
use laracasts_dl::download::CurlDownloader;
use laracasts_dl::extract::FactRegistry;
use laracasts_dl::reconcile::{Reconciler, EPISODE_COUNT_CACHE_KEY};
use laracasts_dl::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Laracasts Downloader (Rust)")
        .version("0.1.0")
        .about("Mirrors the laracasts.com catalog into a local series library")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("series-dir")
                .short('d')
                .long("series-dir")
                .value_name("DIR")
                .help("Directory the series library lives in"),
        )
        .arg(
            Arg::new("verbosity")
                .long("verbosity")
                .value_name("LEVEL")
                .value_parser(["silent", "normal", "high"])
                .help("Console verbosity"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Force the highest verbosity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("refresh-cache")
                .long("refresh-cache")
                .help("Drop the cached episode counts before the run")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration, then let command line flags override it. The
    // configured verbosity is not known yet, so config loading logs through
    // a provisional subscriber at the default level.
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = {
        let provisional = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(Verbosity::Normal.env_filter())
                }),
            )
            .finish();
        let _guard = tracing::subscriber::set_default(provisional);
        Config::load(config_path.as_deref())?
    };

    if let Some(dir) = matches.get_one::<String>("series-dir") {
        config.library.series_dir = PathBuf::from(dir);
    }
    if let Some(level) = matches.get_one::<String>("verbosity") {
        config.logging.verbosity = level.parse()?;
    }
    if matches.get_flag("debug") {
        config.logging.debug = true;
    }

    // Initialize logging, RUST_LOG wins over the configured verbosity
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.tracing_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Laracasts Downloader (Rust) starting...");
    info!("📁 Series directory: {}", config.library.series_dir.display());
    debug!("{}", config.summary());

    config.validate()?;

    let registry = Arc::new(FactRegistry::new()?);
    let transport = Arc::new(HttpTransport::new(&config.remote.cookie_file)?);
    let base_url = url::Url::parse(&config.remote.base_url)?;
    let client = LaracastsClient::new(
        transport.clone(),
        registry,
        base_url,
        config.credentials.email.clone(),
        config.credentials.password.clone(),
    );
    let catalog = SeriesCatalog::new(config.library.series_dir.clone())?;

    let mut cache =
        FileCache::load(config.cache.file_path.clone(), Some(config.cache.ttl_hours)).await;
    if matches.get_flag("refresh-cache") {
        cache.invalidate(EPISODE_COUNT_CACHE_KEY).await?;
    }

    let downloader = Box::new(CurlDownloader::new(config.download.curl_binary.clone()));
    let mut reconciler = Reconciler::new(client, catalog, cache, downloader);

    let outcome = reconciler.run().await;

    // Keep the session cookie even when the run failed part way
    if let Err(e) = transport.persist_cookies() {
        warn!("Failed to persist cookie jar: {}", e);
    }

    let summary = outcome?;
    info!(
        "📊 Series: {}, remote episodes: {}",
        summary.series_count, summary.episode_count
    );
    info!("✅ Downloaded: {}", summary.downloaded);
    if summary.failed > 0 {
        error!("❌ Failed series: {}", summary.failed);
    }

    Ok(())
}
