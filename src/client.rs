/// Authenticated access to laracasts.com pages
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::error::LaracastsError;
use crate::extract::{FactRegistry, PageExtractor};
use crate::transport::{RequestOptions, Transport};

/// Site root every page path is resolved against.
pub const BASE_URL: &str = "https://laracasts.com/";

/// Members-only page used to test whether the session cookie still works.
const PROBE_PATH: &str = "settings/account";
const LOGIN_PAGE_PATH: &str = "login";
const LOGIN_SUBMIT_PATH: &str = "sessions";

/// Whether the current session is known to grant member access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unknown,
    Authenticated,
    NotAuthenticated,
}

/// Client for the course site. Builds page URLs, runs the sign-in flow
/// and hands fetched pages back wrapped in a [`PageExtractor`].
pub struct LaracastsClient {
    transport: Arc<dyn Transport>,
    registry: Arc<FactRegistry>,
    base_url: Url,
    email: String,
    password: String,
    auth_state: AuthState,
}

impl LaracastsClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<FactRegistry>,
        base_url: Url,
        email: String,
        password: String,
    ) -> Self {
        Self {
            transport,
            registry,
            base_url,
            email,
            password,
            auth_state: AuthState::Unknown,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    /// Ensures the session grants member access, signing in if the saved
    /// cookie no longer works. `refresh` drops the memoized state and
    /// probes the site again.
    pub async fn authenticate(&mut self, refresh: bool) -> Result<()> {
        if refresh {
            self.auth_state = AuthState::Unknown;
        }
        match self.auth_state {
            AuthState::Authenticated => return Ok(()),
            AuthState::NotAuthenticated => {
                return Err(LaracastsError::AuthenticationFailed.into())
            }
            AuthState::Unknown => {}
        }

        if self.probe().await? {
            debug!("🔐 Session cookie accepted, skipping login");
            self.auth_state = AuthState::Authenticated;
            return Ok(());
        }
        self.login().await
    }

    /// Lesson listing page, 1-based.
    pub async fn series_list_page(&self, page: u32) -> Result<PageExtractor> {
        self.page(&format!("lessons?page={}", page)).await
    }

    /// Overview page of one series.
    pub async fn series_page(&self, series: &str) -> Result<PageExtractor> {
        self.page(&format!("series/{}", series)).await
    }

    /// Page of a single episode within a series.
    pub async fn episode_page(&self, series: &str, episode: u32) -> Result<PageExtractor> {
        self.page(&format!("series/{}/episodes/{}", series, episode))
            .await
    }

    async fn page(&self, path: &str) -> Result<PageExtractor> {
        let url = self.base_url.join(path)?;
        let response = self
            .transport
            .get(url.as_str(), RequestOptions::default())
            .await?;
        Ok(PageExtractor::new(self.registry.clone(), response.body))
    }

    /// Hits the account settings page without following redirects. Anything
    /// below 300 means the cookie jar still holds a working session.
    async fn probe(&self) -> Result<bool> {
        let url = self.base_url.join(PROBE_PATH)?;
        let response = self
            .transport
            .get(
                url.as_str(),
                RequestOptions {
                    follow_redirects: false,
                },
            )
            .await?;
        Ok(response.status < 300)
    }

    async fn login(&mut self) -> Result<()> {
        let login_page = self.page(LOGIN_PAGE_PATH).await?;
        let token = login_page.login_token()?;
        debug!("🔐 Signing in as {}", self.email);

        let fields = vec![
            ("email".to_string(), self.email.clone()),
            ("password".to_string(), self.password.clone()),
            ("_token".to_string(), token),
        ];
        let url = self.base_url.join(LOGIN_SUBMIT_PATH)?;
        let response = self.transport.post_form(url.as_str(), &fields).await?;

        // A landing page that still matches the member-menu marker means
        // the credentials were rejected.
        let landing = PageExtractor::new(self.registry.clone(), response.body);
        if landing.is_authenticated() {
            self.auth_state = AuthState::NotAuthenticated;
            return Err(LaracastsError::AuthenticationFailed.into());
        }

        self.auth_state = AuthState::Authenticated;

        // Save the session cookie for the next run
        if let Err(e) = self.transport.persist() {
            warn!("Failed to persist cookie jar: {}", e);
        }
        Ok(())
    }
}
