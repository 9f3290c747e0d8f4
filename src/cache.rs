/// Flat file-backed cache for remote catalog data
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default entry lifetime when `put` is given no explicit expiry.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// One cached value with its absolute expiry instant (unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub expiration_date: i64,
    pub data: serde_json::Value,
}

/// Cache statistics for the cache utility binary.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Key-value cache backed by a single JSON file.
///
/// The whole mapping is read once at load and the file is rewritten
/// wholesale on every mutation. Single-instance use is assumed.
pub struct FileCache {
    file_path: PathBuf,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl FileCache {
    /// Opens the cache file. A missing or unparseable file starts the cache
    /// empty rather than failing the run.
    pub async fn load(file_path: PathBuf, ttl_hours: Option<i64>) -> Self {
        let ttl = Duration::hours(ttl_hours.unwrap_or(DEFAULT_TTL_HOURS));
        let entries = match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&content) {
                Ok(entries) => {
                    debug!(
                        "📚 Loaded {} cache entries from {}",
                        entries.len(),
                        file_path.display()
                    );
                    entries
                }
                Err(e) => {
                    warn!("Failed to parse cache file {}: {}", file_path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            file_path,
            ttl,
            entries,
        }
    }

    /// True when the key exists and its expiry instant is still ahead.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map_or(false, |entry| Utc::now().timestamp() < entry.expiration_date)
    }

    /// Returns the cached value for a key. Expiry is not checked here;
    /// callers gate reads on [`has`](Self::has).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        serde_json::from_value(entry.data.clone()).ok()
    }

    /// Stores a value under a key, expiring at `until` or after the default
    /// lifetime, and rewrites the backing file.
    pub async fn put<T: Serialize>(
        &mut self,
        key: &str,
        data: &T,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let expiration_date = until.unwrap_or_else(|| Utc::now() + self.ttl).timestamp();
        let entry = CacheEntry {
            expiration_date,
            data: serde_json::to_value(data)?,
        };
        self.entries.insert(key.to_string(), entry);
        self.store().await
    }

    /// Drops one entry, reporting whether it existed.
    pub async fn invalidate(&mut self, key: &str) -> Result<bool> {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.store().await?;
            info!("🗑️ Invalidated cache entry: {}", key);
        } else {
            debug!("No cache entry to invalidate for key: {}", key);
        }
        Ok(existed)
    }

    /// Drops every entry and rewrites the file. Returns how many were
    /// removed.
    pub async fn clear(&mut self) -> Result<usize> {
        let cleared = self.entries.len();
        self.entries.clear();
        self.store().await?;
        if cleared > 0 {
            info!("🧹 Cleared {} cache entries", cleared);
        }
        Ok(cleared)
    }

    pub fn stats(&self) -> CacheStats {
        let now = Utc::now().timestamp();
        let mut stats = CacheStats {
            total_entries: self.entries.len(),
            ..Default::default()
        };
        for entry in self.entries.values() {
            if now < entry.expiration_date {
                stats.valid_entries += 1;
            } else {
                stats.expired_entries += 1;
            }
        }
        stats
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    async fn store(&self) -> Result<()> {
        let json_content = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(&self.file_path, json_content).await?;
        debug!(
            "💾 Saved {} cache entries to {}",
            self.entries.len(),
            self.file_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn counts(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_put_then_has_and_get_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = FileCache::load(temp_dir.path().join(".cache.json"), None).await;

        let data = counts(&[("testing", 12), ("other", 3)]);
        cache.put("series.episode_count", &data, None).await.unwrap();

        assert!(cache.has("series.episode_count"));
        let loaded: BTreeMap<String, u32> = cache.get("series.episode_count").unwrap();
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn test_missing_key_has_false_and_get_none() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::load(temp_dir.path().join(".cache.json"), None).await;

        assert!(!cache.has("series.episode_count"));
        assert!(cache.get::<BTreeMap<String, u32>>("series.episode_count").is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_fails_has_but_still_reads() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = FileCache::load(temp_dir.path().join(".cache.json"), None).await;

        let yesterday = Utc::now() - Duration::days(1);
        cache
            .put("series.episode_count", &counts(&[("testing", 5)]), Some(yesterday))
            .await
            .unwrap();

        assert!(!cache.has("series.episode_count"));
        // get ignores expiry; callers gate on has.
        assert!(cache.get::<BTreeMap<String, u32>>("series.episode_count").is_some());
    }

    #[tokio::test]
    async fn test_default_expiry_is_one_day_out() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = FileCache::load(temp_dir.path().join(".cache.json"), None).await;
        cache.put("key", &1u32, None).await.unwrap();

        let expected = (Utc::now() + Duration::hours(DEFAULT_TTL_HOURS)).timestamp();
        let (_, entry) = cache.entries().next().unwrap();
        assert!((entry.expiration_date - expected).abs() < 5);
    }

    #[tokio::test]
    async fn test_cache_survives_reload_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".cache.json");

        let mut cache = FileCache::load(file_path.clone(), None).await;
        cache
            .put("series.episode_count", &counts(&[("testing", 12)]), None)
            .await
            .unwrap();
        drop(cache);

        let reloaded = FileCache::load(file_path, None).await;
        assert!(reloaded.has("series.episode_count"));
        let data: BTreeMap<String, u32> = reloaded.get("series.episode_count").unwrap();
        assert_eq!(data.get("testing"), Some(&12));
    }

    #[tokio::test]
    async fn test_put_rewrites_the_whole_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".cache.json");

        let mut cache = FileCache::load(file_path.clone(), None).await;
        cache.put("first", &1u32, None).await.unwrap();
        cache.put("second", &2u32, None).await.unwrap();

        let content = std::fs::read_to_string(&file_path).unwrap();
        let on_disk: HashMap<String, CacheEntry> = serde_json::from_str(&content).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk.contains_key("first"));
        assert!(on_disk.contains_key("second"));
    }

    #[tokio::test]
    async fn test_corrupt_cache_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".cache.json");
        std::fs::write(&file_path, "not json at all").unwrap();

        let cache = FileCache::load(file_path, None).await;
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry_and_reports() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".cache.json");

        let mut cache = FileCache::load(file_path.clone(), None).await;
        cache.put("key", &1u32, None).await.unwrap();

        assert!(cache.invalidate("key").await.unwrap());
        assert!(!cache.has("key"));
        assert!(!cache.invalidate("key").await.unwrap());

        let reloaded = FileCache::load(file_path, None).await;
        assert!(!reloaded.has("key"));
    }

    #[tokio::test]
    async fn test_stats_split_valid_and_expired() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = FileCache::load(temp_dir.path().join(".cache.json"), None).await;

        cache.put("fresh", &1u32, None).await.unwrap();
        cache
            .put("stale", &2u32, Some(Utc::now() - Duration::hours(1)))
            .await
            .unwrap();

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);
    }
}
