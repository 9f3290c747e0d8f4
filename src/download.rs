/// Episode download via an external curl process
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::transport::BROWSER_USER_AGENT;

/// Default location of the curl binary.
pub const DEFAULT_CURL_BIN: &str = "/usr/bin/curl";

/// Fetches one media file to a local destination.
///
/// Returns `Ok(true)` only when the destination file exists afterwards;
/// a clean exit without a file on disk counts as a failed download.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, from: &str, to: &Path) -> Result<bool>;
}

/// Downloader that shells out to curl, following redirects and presenting
/// a browser user agent so the media host accepts the request.
pub struct CurlDownloader {
    curl_bin: PathBuf,
}

impl CurlDownloader {
    pub fn new(curl_bin: PathBuf) -> Self {
        Self { curl_bin }
    }

    pub fn curl_bin(&self) -> &Path {
        &self.curl_bin
    }
}

impl Default for CurlDownloader {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_CURL_BIN))
    }
}

#[async_trait]
impl Downloader for CurlDownloader {
    async fn download(&self, from: &str, to: &Path) -> Result<bool> {
        debug!(
            "{} -L -o \"{}\" -A '{}' '{}'",
            self.curl_bin.display(),
            to.display(),
            BROWSER_USER_AGENT,
            from
        );

        tokio::process::Command::new(&self.curl_bin)
            .arg("-L")
            .arg("-o")
            .arg(to)
            .arg("-A")
            .arg(BROWSER_USER_AGENT)
            .arg(from)
            .status()
            .await?;

        Ok(to.exists())
    }
}
