//! Reading package archive bytes from files and URLs.
//!
//! The resolver never talks to the network or the filesystem directly; it
//! goes through a [`PackageFetcher`]. [`DefaultFetcher`] is the production
//! implementation: local files are read with `std::fs`, remote archives are
//! downloaded with a blocking `reqwest` client bounded by a request timeout.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, info};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised while reading archive bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Local file could not be read.
    #[error("failed to read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request failed or returned a non-success status.
    #[error("download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// HTTP request exceeded the configured timeout.
    #[error("download of {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Source of package archive bytes.
pub trait PackageFetcher: Send + Sync {
    /// Download the archive at `url`.
    fn fetch_remote(&self, url: &str) -> FetchResult<Vec<u8>>;

    /// Read the archive at a local path.
    fn read_local(&self, path: &Path) -> FetchResult<Vec<u8>> {
        fs::read(path).map_err(|source| FetchError::File {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Filesystem and HTTP fetcher.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    client: Client,
    timeout: Duration,
}

impl DefaultFetcher {
    /// Create a fetcher with the default request timeout.
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_request_error(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::DownloadFailed {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

impl PackageFetcher for DefaultFetcher {
    fn fetch_remote(&self, url: &str) -> FetchResult<Vec<u8>> {
        info!(url = %url, "Downloading package");

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.map_request_error(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::DownloadFailed {
                url: url.to_string(),
                reason: format!("server returned status {}", response.status()),
            });
        }

        let mut bytes = Vec::new();
        response
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        debug!(url = %url, bytes = bytes.len(), "Download complete");
        Ok(bytes)
    }
}
