/// Remote/local catalog reconciliation and the download loop
use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::FileCache;
use crate::catalog::SeriesCatalog;
use crate::client::LaracastsClient;
use crate::download::Downloader;

/// Cache key for the remote series name to episode count mapping.
pub const EPISODE_COUNT_CACHE_KEY: &str = "series.episode_count";

/// Counters reported after a full reconcile run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub series_count: usize,
    pub episode_count: u32,
    pub downloaded: u32,
    pub failed: u32,
}

/// Drives one mirror pass: discover the remote catalog, diff it against
/// the local library and download what is missing.
pub struct Reconciler {
    client: LaracastsClient,
    catalog: SeriesCatalog,
    cache: FileCache,
    downloader: Box<dyn Downloader>,
}

impl Reconciler {
    pub fn new(
        client: LaracastsClient,
        catalog: SeriesCatalog,
        cache: FileCache,
        downloader: Box<dyn Downloader>,
    ) -> Self {
        Self {
            client,
            catalog,
            cache,
            downloader,
        }
    }

    pub async fn run(&mut self) -> Result<ReconcileSummary> {
        let started = Instant::now();
        info!("--- Starting ---");

        info!("Authenticating...");
        self.client.authenticate(false).await?;

        let (series_list, remote_counts) = self.remote_catalog().await?;
        let remote_total: u32 = remote_counts.values().sum();
        info!(
            "Found {} series and {} episodes",
            series_list.len(),
            remote_total
        );

        let local_counts = self.local_episode_counts(&series_list).await?;
        let local_series = local_counts.values().filter(|count| **count > 0).count();
        let local_total: u32 = local_counts.values().sum();
        info!("Found {} series and {} episodes", local_series, local_total);

        info!("--- Start to download missing series and episodes ---");
        let mut summary = ReconcileSummary {
            series_count: series_list.len(),
            episode_count: remote_total,
            ..Default::default()
        };
        for series in &series_list {
            let local = local_counts.get(series).copied().unwrap_or(0);
            let remote = remote_counts.get(series).copied().unwrap_or(0);
            if local >= remote {
                debug!("- processing {}: complete!!!", series);
                continue;
            }

            let missing = missing_episodes(local, remote);
            debug!(
                "- processing {}: missing ({})",
                series,
                missing
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            // One failed episode aborts the rest of its series. Remote
            // numbering is gap free, so later episodes would only widen the
            // hole the next run has to close.
            for episode in missing {
                info!("-- Processing {} #{}", series, episode);
                if self.process_episode(series, episode).await? {
                    summary.downloaded += 1;
                    info!("-- Finish {} #{}", series, episode);
                } else {
                    summary.failed += 1;
                    break;
                }
            }
        }

        info!("--- Finish ---");
        debug!("Took: {:.3} seconds", started.elapsed().as_secs_f64());
        Ok(summary)
    }

    /// Remote series names and episode counts, from cache when fresh.
    async fn remote_catalog(&mut self) -> Result<(Vec<String>, BTreeMap<String, u32>)> {
        if self.cache.has(EPISODE_COUNT_CACHE_KEY) {
            if let Some(counts) = self.cache.get::<BTreeMap<String, u32>>(EPISODE_COUNT_CACHE_KEY)
            {
                // Every series has at least one episode; a zero here is
                // corrupt cache data.
                if let Some((series, _)) = counts.iter().find(|(_, count)| **count == 0) {
                    bail!("Cached episode count for series '{}' is 0", series);
                }
                info!("-- Loading remote data from cache ---");
                let series_list = counts.keys().cloned().collect();
                return Ok((series_list, counts));
            }
        }

        let series_list = self.fetch_remote_series_list().await?;
        let counts = self.fetch_remote_episode_counts(&series_list).await?;
        self.cache.put(EPISODE_COUNT_CACHE_KEY, &counts, None).await?;
        Ok((series_list, counts))
    }

    async fn fetch_remote_series_list(&self) -> Result<Vec<String>> {
        info!("--- Fetching series list ---");
        let first_page = self.client.series_list_page(1).await?;
        let total_pages = first_page.highest_page()?;

        let mut series_list = Vec::new();
        let mut seen = HashSet::new();
        for page in 1..=total_pages {
            // Page 1 is already in hand, one request less.
            let batch = if page == 1 {
                first_page.series_list()?
            } else {
                self.client.series_list_page(page).await?.series_list()?
            };
            debug!("- lesson page {}: {} found!", page, batch.len());
            for name in batch {
                if seen.insert(name.clone()) {
                    series_list.push(name);
                }
            }
        }
        Ok(series_list)
    }

    async fn fetch_remote_episode_counts(
        &self,
        series_list: &[String],
    ) -> Result<BTreeMap<String, u32>> {
        info!("--- Fetching series episode count ---");
        let mut counts = BTreeMap::new();
        for series in series_list {
            let total = self.client.series_page(series).await?.total_episodes()?;
            debug!("- {} have: {}", series, total);
            counts.insert(series.clone(), total);
        }
        Ok(counts)
    }

    async fn local_episode_counts(
        &self,
        series_list: &[String],
    ) -> Result<BTreeMap<String, u32>> {
        info!("--- Starting to check which series and episodes exist locally ---");
        let mut counts = BTreeMap::new();
        for series in series_list {
            let highest = self.catalog.highest_episode(series).await?;
            debug!("- {}: {} episodes", series, highest);
            counts.insert(series.clone(), highest);
        }
        Ok(counts)
    }

    /// Fetches one episode page and downloads its video. `Ok(false)` means
    /// the episode could not be downloaded and the series should be given
    /// up for this run.
    async fn process_episode(&mut self, series: &str, episode: u32) -> Result<bool> {
        let page = self.client.episode_page(series, episode).await?;

        let title = match page.episode_title() {
            Ok(name) => {
                debug!("- Fetching name: {}", name);
                Some(name)
            }
            Err(err) if err.is_match_not_found() => {
                warn!("⚠️ No episode title for {} #{}", series, episode);
                None
            }
            Err(err) => return Err(err.into()),
        };

        let download_url = match page.download_url() {
            Ok(url) => url,
            Err(err) if err.is_match_not_found() => {
                error!(
                    "❌ Could not find series '{}' #{} download URL",
                    series, episode
                );
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        // Ensure the series directory exists
        tokio::fs::create_dir_all(self.catalog.series_dir(series)).await?;

        let file_path = self.catalog.episode_path(series, episode, title.as_deref());
        debug!("- Starting download url: {}", download_url);
        if !self.downloader.download(&download_url, &file_path).await? {
            error!("❌ Failed downloading: {}", download_url);
            return Ok(false);
        }
        Ok(true)
    }
}

/// Episode numbers to fetch for a series, oldest first. Remote episodes
/// are numbered 1..=remote without gaps, so everything above the local
/// high-water mark is missing.
fn missing_episodes(local: u32, remote: u32) -> Vec<u32> {
    (local + 1..=remote).collect()
}
