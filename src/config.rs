use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_TTL_HOURS;
use crate::client::BASE_URL;
use crate::download::DEFAULT_CURL_BIN;

/// Configuration for the Laracasts downloader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account credentials
    pub credentials: CredentialsConfig,

    /// Local library settings
    pub library: LibraryConfig,

    /// Remote site settings
    pub remote: RemoteConfig,

    /// Catalog cache settings
    pub cache: CacheConfig,

    /// Console output settings
    pub logging: LoggingConfig,

    /// Download command settings
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Account email address
    pub email: String,

    /// Account password
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory holding one subdirectory per series
    pub series_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Site root, must end with a slash
    pub base_url: String,

    /// File the session cookie jar is persisted to
    pub cookie_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// File the catalog cache is stored in
    pub file_path: PathBuf,

    /// Entry lifetime in hours
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console verbosity
    pub verbosity: Verbosity,

    /// Force the highest verbosity regardless of the setting above
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Path to the curl binary used for media downloads
    pub curl_binary: PathBuf,
}

/// How much of the run narration reaches the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Silent,
    Normal,
    High,
}

impl Verbosity {
    /// Tracing filter directive for this verbosity. Errors always pass.
    pub fn env_filter(self) -> &'static str {
        match self {
            Verbosity::Silent => "laracasts_dl=error",
            Verbosity::Normal => "laracasts_dl=info",
            Verbosity::High => "laracasts_dl=debug",
        }
    }
}

impl std::str::FromStr for Verbosity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "silent" => Ok(Verbosity::Silent),
            "normal" => Ok(Verbosity::Normal),
            "high" => Ok(Verbosity::High),
            other => Err(anyhow!(
                "Unknown verbosity '{}', expected silent, normal or high",
                other
            )),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load_from_file(path);
        }

        // Try to load from various locations
        let config_paths = [
            "laracasts-dl.toml",
            "config/laracasts-dl.toml",
            "~/.config/laracasts-dl/config.toml",
            "/etc/laracasts-dl/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to defaults plus environment variables
        Self::from_env()
    }

    /// Load configuration from a specific file, failing loudly when it is
    /// missing or malformed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(email) = std::env::var("LARACASTS_EMAIL") {
            config.credentials.email = email;
        }

        if let Ok(password) = std::env::var("LARACASTS_PASSWORD") {
            config.credentials.password = password;
        }

        if let Ok(series_dir) = std::env::var("LARACASTS_SERIES_DIR") {
            config.library.series_dir = PathBuf::from(series_dir);
        }

        if let Ok(verbosity) = std::env::var("LARACASTS_VERBOSITY") {
            if let Ok(parsed) = verbosity.parse() {
                config.logging.verbosity = parsed;
            }
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.credentials.email.is_empty() || self.credentials.password.is_empty() {
            // A saved session can still pass the probe without credentials.
            if self.remote.cookie_file.exists() {
                tracing::warn!(
                    "⚠️ Credentials are empty, relying on the saved session in {}",
                    self.remote.cookie_file.display()
                );
            } else {
                return Err(anyhow!(
                    "credentials.email and credentials.password must be set"
                ));
            }
        }

        if self.library.series_dir.as_os_str().is_empty() {
            return Err(anyhow!("library.series_dir must be set"));
        }

        url::Url::parse(&self.remote.base_url)
            .with_context(|| format!("remote.base_url '{}' is not a valid URL", self.remote.base_url))?;

        if self.cache.ttl_hours <= 0 {
            return Err(anyhow!("cache.ttl_hours must be greater than 0"));
        }

        // Validate series directory
        if !self.library.series_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.library.series_dir) {
                return Err(anyhow!("Cannot create series directory: {}", e));
            }
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Tracing filter honoring the debug override.
    pub fn tracing_filter(&self) -> &'static str {
        if self.logging.debug {
            Verbosity::High.env_filter()
        } else {
            self.logging.verbosity.env_filter()
        }
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Laracasts Downloader Configuration:\n\
            - Account: {}\n\
            - Series Directory: {}\n\
            - Base URL: {}\n\
            - Cookie File: {}\n\
            - Cache File: {} (ttl {}h)\n\
            - Verbosity: {:?}\n\
            - Curl Binary: {}",
            self.credentials.email,
            self.library.series_dir.display(),
            self.remote.base_url,
            self.remote.cookie_file.display(),
            self.cache.file_path.display(),
            self.cache.ttl_hours,
            self.logging.verbosity,
            self.download.curl_binary.display()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            library: LibraryConfig::default(),
            remote: RemoteConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            series_dir: PathBuf::from("./series"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            cookie_file: PathBuf::from("cookie.jar"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from(".laracasts-cache.json"),
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            debug: false,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            curl_binary: PathBuf::from(DEFAULT_CURL_BIN),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_credentials(mut self, email: &str, password: &str) -> Self {
        self.config.credentials.email = email.to_string();
        self.config.credentials.password = password.to_string();
        self
    }

    pub fn with_series_dir(mut self, dir: PathBuf) -> Self {
        self.config.library.series_dir = dir;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.remote.base_url = base_url.to_string();
        self
    }

    pub fn with_cookie_file(mut self, path: PathBuf) -> Self {
        self.config.remote.cookie_file = path;
        self
    }

    pub fn with_cache_file(mut self, path: PathBuf) -> Self {
        self.config.cache.file_path = path;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.config.logging.verbosity = verbosity;
        self
    }

    pub fn with_curl_binary(mut self, path: PathBuf) -> Self {
        self.config.download.curl_binary = path;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote.base_url, "https://laracasts.com/");
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.logging.verbosity, Verbosity::Normal);
        assert_eq!(config.library.series_dir, PathBuf::from("./series"));
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_credentials("user@example.com", "secret")
            .with_series_dir(PathBuf::from("/tmp/series"))
            .with_base_url("https://staging.laracasts.com/")
            .with_verbosity(Verbosity::High)
            .build();

        assert_eq!(config.credentials.email, "user@example.com");
        assert_eq!(config.library.series_dir, PathBuf::from("/tmp/series"));
        assert_eq!(config.remote.base_url, "https://staging.laracasts.com/");
        assert_eq!(config.logging.verbosity, Verbosity::High);
    }

    #[test]
    fn test_config_validation() {
        let temp_dir = TempDir::new().unwrap();

        let config = ConfigBuilder::new()
            .with_credentials("user@example.com", "secret")
            .with_series_dir(temp_dir.path().join("series"))
            .build();
        assert!(config.validate().is_ok());
        assert!(temp_dir.path().join("series").is_dir());
    }

    #[test]
    fn test_empty_credentials_need_a_cookie_jar() {
        let temp_dir = TempDir::new().unwrap();
        let cookie_file = temp_dir.path().join("cookie.jar");

        let config = ConfigBuilder::new()
            .with_series_dir(temp_dir.path().join("series"))
            .with_cookie_file(cookie_file.clone())
            .build();
        assert!(config.validate().is_err());

        // With a saved session on disk the empty credentials only warn.
        std::fs::write(&cookie_file, "[]").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [credentials]
            email = "user@example.com"
            password = "secret"

            [logging]
            verbosity = "silent"
            "#,
        )
        .unwrap();

        assert_eq!(config.credentials.email, "user@example.com");
        assert_eq!(config.logging.verbosity, Verbosity::Silent);
        assert_eq!(config.remote.base_url, "https://laracasts.com/");
        assert_eq!(config.cache.ttl_hours, 24);
    }

    #[test]
    fn test_verbosity_parsing_and_filters() {
        assert_eq!("silent".parse::<Verbosity>().unwrap(), Verbosity::Silent);
        assert_eq!("high".parse::<Verbosity>().unwrap(), Verbosity::High);
        assert!("loud".parse::<Verbosity>().is_err());

        assert_eq!(Verbosity::Silent.env_filter(), "laracasts_dl=error");
        assert_eq!(Verbosity::Normal.env_filter(), "laracasts_dl=info");
        assert_eq!(Verbosity::High.env_filter(), "laracasts_dl=debug");
    }

    #[test]
    fn test_debug_flag_forces_high_verbosity() {
        let mut config = Config::default();
        config.logging.verbosity = Verbosity::Silent;
        config.logging.debug = true;
        assert_eq!(config.tracing_filter(), "laracasts_dl=debug");
    }

    #[derive(Clone)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_reports_the_config_source_through_tracing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("laracasts-dl.toml");
        std::fs::write(&path, "[logging]\nverbosity = \"high\"\n").unwrap();

        let captured = Arc::new(Mutex::new(Vec::new()));
        let writer = CaptureWriter(captured.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("laracasts_dl=info")
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            Config::load_from_file(&path).unwrap();
        });

        let output = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Loaded configuration from"));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("laracasts-dl.toml");

        let config = ConfigBuilder::new()
            .with_credentials("user@example.com", "secret")
            .with_cache_file(PathBuf::from("/tmp/cache.json"))
            .build();
        config.save(&path).unwrap();

        let reloaded = Config::load_from_file(&path).unwrap();
        assert_eq!(reloaded.credentials.email, "user@example.com");
        assert_eq!(reloaded.cache.file_path, PathBuf::from("/tmp/cache.json"));
    }
}
