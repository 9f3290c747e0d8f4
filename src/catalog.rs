/// Local series inventory: which episodes already exist on disk
use crate::error::{LaracastsError, Result};
use anyhow::anyhow;
use regex::Regex;
use std::path::PathBuf;
use tokio::fs;

/// Inspects and names episode files under one library root.
///
/// Episode files follow the `NN[ - title].mp4` convention: the leading
/// number identifies the episode, the title is decoration. Directory layout
/// is `<root>/<series>/<episode file>`.
pub struct SeriesCatalog {
    root_dir: PathBuf,
    episode_pattern: Regex,
}

impl SeriesCatalog {
    pub fn new(root_dir: PathBuf) -> anyhow::Result<Self> {
        let episode_pattern = Regex::new(r"^(?P<number>\d+).*\.mp4$")
            .map_err(|e| anyhow!("invalid episode file pattern: {}", e))?;
        Ok(Self {
            root_dir,
            episode_pattern,
        })
    }

    /// Highest episode number present for a series. Returns 0 when the
    /// series directory is missing or holds no episode files. The comparison
    /// is numeric, so `9.mp4` never outranks `10.mp4`.
    pub async fn highest_episode(&self, series: &str) -> Result<u32> {
        let dir = self.series_dir(series);
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut highest = 0u32;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str() {
                if self.is_episode(name) {
                    highest = highest.max(self.episode_number(name)?);
                }
            }
        }
        Ok(highest)
    }

    /// True when the series has a directory under the root.
    pub fn series_dir_exists(&self, series: &str) -> bool {
        self.series_dir(series).is_dir()
    }

    /// Directory that holds one series' episodes.
    pub fn series_dir(&self, series: &str) -> PathBuf {
        self.root_dir.join(series)
    }

    /// Destination path for an episode: number zero-padded to at least two
    /// digits, then ` - <title>` when a title is available, then `.mp4`.
    pub fn episode_path(&self, series: &str, number: u32, title: Option<&str>) -> PathBuf {
        let file_name = match title {
            Some(title) if !title.is_empty() => format!("{:02} - {}.mp4", number, title),
            _ => format!("{:02}.mp4", number),
        };
        self.series_dir(series).join(file_name)
    }

    fn is_episode(&self, file_name: &str) -> bool {
        self.episode_pattern.is_match(file_name)
    }

    /// Parses the leading number of a file that already passed the episode
    /// predicate. Guarded anyway: a long enough digit run still overflows.
    fn episode_number(&self, file_name: &str) -> Result<u32> {
        self.episode_pattern
            .captures(file_name)
            .and_then(|caps| caps.name("number"))
            .and_then(|digits| digits.as_str().parse().ok())
            .ok_or_else(|| LaracastsError::match_not_found("episodeNumber", file_name))
    }
}
