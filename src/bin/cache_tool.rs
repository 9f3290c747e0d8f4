use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use laracasts_dl::cache::FileCache;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cache-tool")]
#[command(about = "Catalog cache management utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = ".laracasts-cache.json")]
    cache_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Get cache statistics
    Stats,
    /// Show cached entries with their expiry
    Show,
    /// Invalidate a specific cache entry
    Invalidate {
        /// Cache key to invalidate
        cache_key: String,
    },
    /// Clear all cache entries
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let mut cache = FileCache::load(cli.cache_file, None).await;

    match cli.command {
        Commands::Stats => {
            let stats = cache.stats();
            info!("📊 Cache Statistics for {}:", cache.file_path().display());
            info!("  Total entries: {}", stats.total_entries);
            info!("  Valid entries: {}", stats.valid_entries);
            info!("  Expired entries: {}", stats.expired_entries);
        }

        Commands::Show => {
            let mut entries: Vec<_> = cache.entries().collect();
            if entries.is_empty() {
                info!("📭 No cached entries found");
                return Ok(());
            }
            entries.sort_by(|a, b| a.0.cmp(b.0));

            info!("📚 Found {} cached entries:", entries.len());
            let now = Utc::now().timestamp();
            for (key, entry) in entries {
                let status = if now < entry.expiration_date {
                    "✅ Valid"
                } else {
                    "❌ Expired"
                };
                let expires = DateTime::<Utc>::from_timestamp(entry.expiration_date, 0)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| entry.expiration_date.to_string());
                info!("  {} - expires {}, {}", key, expires, status);
                info!("    data: {}", entry.data);
            }
        }

        Commands::Invalidate { cache_key } => {
            let removed = cache.invalidate(&cache_key).await?;
            if removed {
                info!("✅ Successfully invalidated cache entry: {}", cache_key);
            } else {
                warn!("⚠️ Cache key not found: {}", cache_key);
            }
        }

        Commands::Clear => {
            let count = cache.clear().await?;
            info!("🧹 Cleared {} cache entries", count);
        }
    }

    Ok(())
}
