//! Core traits for the local package cache.
//!
//! The `PackageCache` trait is the interface the resolver uses to look up and
//! store package archives keyed by `id#version`. Implementations are passed
//! in as handles, so tests can use an in-memory cache or a temporary
//! directory without touching the user's real cache.
//!
//! # Design Principles
//!
//! - **Raw bytes**: entries hold the original `.tgz` bytes; parsing is the
//!   caller's concern
//! - **Append-mostly**: an entry is never rewritten once its bytes exist
//! - **Idempotent adds**: adding an existing id+version is a no-op
//! - **Shared**: all implementations are `Send + Sync` and tolerate
//!   concurrent readers and writers

use std::fmt;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::package::cache_key;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error on a cache path.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry metadata could not be read or written.
    #[error("invalid cache metadata at {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    /// The entry directory exists but was not written by this cache, e.g.
    /// an extracted package from another tool's cache.
    #[error("{path} exists but is not a profilegen cache entry; use a dedicated cache directory")]
    Foreign { path: PathBuf },

    /// Id or version contain characters that cannot form a cache key.
    #[error("invalid cache key '{0}'")]
    InvalidKey(String),
}

/// Descriptive metadata stored next to each cached archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Where the bytes were fetched from (URL or path), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Lowercase hex SHA-256 of the archive bytes.
    pub sha256: String,
    pub size_bytes: u64,
    /// RFC 3339 timestamp of when the entry was added.
    pub added_at: String,
}

impl CacheEntryMetadata {
    /// Describe `bytes` as a new entry added now.
    pub fn describe(
        id: &str,
        version: &str,
        bytes: &[u8],
        description: Option<&str>,
        source: Option<&str>,
    ) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            description: description.map(str::to_string),
            source: source.map(str::to_string),
            sha256: format!("{:x}", Sha256::digest(bytes)),
            size_bytes: bytes.len() as u64,
            added_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn key(&self) -> String {
        cache_key(&self.id, &self.version)
    }
}

impl fmt::Display for CacheEntryMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.key(), self.size_bytes)
    }
}

/// Outcome of [`PackageCache::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was written.
    Added,
    /// An entry with the same id+version already existed; nothing changed.
    AlreadyPresent,
}

/// A package to be stored in the cache.
#[derive(Debug, Clone, Copy)]
pub struct NewEntry<'a> {
    pub id: &'a str,
    pub version: &'a str,
    pub bytes: &'a [u8],
    pub description: Option<&'a str>,
    pub source: Option<&'a str>,
}

/// Local store of package archives keyed by id and version.
pub trait PackageCache: Send + Sync {
    /// Store a package archive.
    ///
    /// Adding an id+version that is already cached leaves the existing entry
    /// untouched and returns [`AddOutcome::AlreadyPresent`].
    fn add(&self, entry: NewEntry<'_>) -> CacheResult<AddOutcome>;

    /// Raw archive bytes of an exact id+version.
    fn load(&self, id: &str, version: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Metadata of an exact id+version.
    fn metadata(&self, id: &str, version: &str) -> CacheResult<Option<CacheEntryMetadata>>;

    /// Metadata of every cached entry.
    fn entries(&self) -> CacheResult<Vec<CacheEntryMetadata>>;

    /// Every cached version of a package id.
    fn versions(&self, id: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| entry.id == id)
            .map(|entry| entry.version)
            .collect())
    }

    /// The entry whose bytes were fetched from `source`, if any.
    ///
    /// When several versions were fetched from the same location the most
    /// recent addition wins.
    fn find_by_source(&self, source: &str) -> CacheResult<Option<CacheEntryMetadata>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| entry.source.as_deref() == Some(source))
            .max_by(|a, b| a.added_at.cmp(&b.added_at)))
    }

    /// Whether an exact id+version is cached.
    fn contains(&self, id: &str, version: &str) -> CacheResult<bool> {
        Ok(self.metadata(id, version)?.is_some())
    }
}

/// Pick the highest version from a list.
///
/// Semantic versions compare by precedence; anything that does not parse
/// as semver sorts below all semantic versions and lexically among itself.
pub fn latest_version<I, S>(versions: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    versions
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .max_by(|a, b| match (Version::parse(a), Version::parse(b)) {
            (Ok(va), Ok(vb)) => va.cmp(&vb),
            (Ok(_), Err(_)) => std::cmp::Ordering::Greater,
            (Err(_), Ok(_)) => std::cmp::Ordering::Less,
            (Err(_), Err(_)) => a.cmp(b),
        })
}

/// Reject ids and versions that would escape the cache directory.
pub(crate) fn validate_key_part(part: &str) -> CacheResult<()> {
    let invalid = part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\', '#'])
        || part.chars().any(char::is_control);

    if invalid {
        return Err(CacheError::InvalidKey(part.to_string()));
    }
    Ok(())
}
