//! Async HTTP transport wrapping reqwest.
//!
//! Not a browser, just GET and form POST with a cookie jar that lives on
//! disk between runs. No request timeouts are configured: a stalled
//! transfer stalls the whole run.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Browser user-agent sent on every request and handed to the external
/// download command.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/33.0.1750.117 Safari/537.36";

/// Response to a transport request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Per-request switches. Only redirect-following is tunable.
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions {
    pub follow_redirects: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            follow_redirects: true,
        }
    }
}

/// Narrow seam between the catalog logic and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, options: RequestOptions) -> Result<HttpResponse>;
    async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<HttpResponse>;

    /// Writes any session state to disk. Transports without one keep this
    /// a no-op.
    fn persist(&self) -> Result<()> {
        Ok(())
    }
}

/// Transport over reqwest: a redirect-following client and a
/// redirect-disabled client sharing one file-persistent cookie jar.
pub struct HttpTransport {
    client: reqwest::Client,
    no_redirect_client: reqwest::Client,
    cookie_store: Arc<CookieStoreMutex>,
    cookie_file: PathBuf,
}

impl HttpTransport {
    pub fn new(cookie_file: &Path) -> Result<Self> {
        let cookie_store = Arc::new(CookieStoreMutex::new(load_cookie_store(cookie_file)));

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_provider(Arc::clone(&cookie_store))
            .build()
            .context("failed to build HTTP client")?;

        let no_redirect_client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .cookie_provider(Arc::clone(&cookie_store))
            .build()
            .context("failed to build redirect-disabled HTTP client")?;

        Ok(Self {
            client,
            no_redirect_client,
            cookie_store,
            cookie_file: cookie_file.to_path_buf(),
        })
    }

    /// Writes the cookie jar back to its file, session cookies included,
    /// so the next run can skip the login sequence.
    pub fn persist_cookies(&self) -> Result<()> {
        let store = self
            .cookie_store
            .lock()
            .map_err(|_| anyhow!("cookie store lock poisoned"))?;
        let mut buffer = Vec::new();
        store
            .save_incl_expired_and_nonpersistent_json(&mut buffer)
            .map_err(|e| anyhow!("failed to serialize cookie store: {}", e))?;
        std::fs::write(&self.cookie_file, buffer).with_context(|| {
            format!("failed to write cookie file {}", self.cookie_file.display())
        })?;
        debug!("💾 Saved cookie jar to {}", self.cookie_file.display());
        Ok(())
    }

    fn client_for(&self, options: RequestOptions) -> &reqwest::Client {
        if options.follow_redirects {
            &self.client
        } else {
            &self.no_redirect_client
        }
    }
}

fn load_cookie_store(path: &Path) -> CookieStore {
    match File::open(path) {
        Ok(file) => CookieStore::load_json(BufReader::new(file)).unwrap_or_else(|e| {
            warn!("⚠️ Ignoring unreadable cookie file {}: {}", path.display(), e);
            CookieStore::default()
        }),
        Err(_) => CookieStore::default(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, options: RequestOptions) -> Result<HttpResponse> {
        debug!("🌐 GET {}", url);
        let response = self
            .client_for(options)
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }

    async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<HttpResponse> {
        debug!("🌐 POST {}", url);
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }

    fn persist(&self) -> Result<()> {
        self.persist_cookies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_transport_creation_without_cookie_file() {
        let temp_dir = TempDir::new().unwrap();
        let transport = HttpTransport::new(&temp_dir.path().join("cookie.jar"));
        assert!(transport.is_ok());
    }

    #[test]
    fn test_persist_cookies_creates_the_jar_file() {
        let temp_dir = TempDir::new().unwrap();
        let cookie_file = temp_dir.path().join("cookie.jar");
        let transport = HttpTransport::new(&cookie_file).unwrap();

        transport.persist_cookies().unwrap();
        assert!(cookie_file.exists());

        // A fresh transport must accept the file it just wrote.
        assert!(HttpTransport::new(&cookie_file).is_ok());
    }

    #[test]
    fn test_persist_cookies_reports_an_unwritable_jar_path() {
        let temp_dir = TempDir::new().unwrap();
        let cookie_file = temp_dir.path().join("missing-dir").join("cookie.jar");
        let transport = HttpTransport::new(&cookie_file).unwrap();

        assert!(transport.persist_cookies().is_err());
    }

    #[test]
    fn test_request_options_follow_redirects_by_default() {
        assert!(RequestOptions::default().follow_redirects);
    }
}
