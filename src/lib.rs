/// Laracasts Downloader - Rust Implementation
///
/// Mirrors the laracasts.com course catalog into a local library,
/// downloading the episodes that are missing from disk.

pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod reconcile;
pub mod transport;

// Re-export main types for easy access
pub use crate::cache::{CacheStats, FileCache};
pub use crate::catalog::SeriesCatalog;
pub use crate::client::{AuthState, LaracastsClient, BASE_URL};
pub use crate::config::{Config, ConfigBuilder, Verbosity};
pub use crate::download::{CurlDownloader, Downloader};
pub use crate::error::{LaracastsError, Result};
pub use crate::extract::{Extraction, Fact, FactRegistry, PageExtractor};
pub use crate::reconcile::{ReconcileSummary, Reconciler, EPISODE_COUNT_CACHE_KEY};
pub use crate::transport::{HttpTransport, Transport, BROWSER_USER_AGENT};
