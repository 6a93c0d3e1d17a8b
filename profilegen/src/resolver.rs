//! Package resolution.
//!
//! Turns a [`PackageReference`] into a materialized [`Package`]:
//!
//! | Reference | Behavior                                                   |
//! |-----------|------------------------------------------------------------|
//! | `Cached`  | cache lookup only; highest version when none is given      |
//! | `Remote`  | cache hit by recorded source URL, otherwise download       |
//! | `Local`   | read the file                                              |
//! | `Asset`   | read the file relative to the asset root                   |
//!
//! Fetched archives are parsed, added to the cache (a no-op when the same
//! id+version is already present) and then returned as loaded from the
//! cache. Nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{latest_version, AddOutcome, CacheError, NewEntry, PackageCache};
use crate::fetch::{FetchError, PackageFetcher};
use crate::package::{Package, PackageError, PackageReference};

/// Errors raised while resolving a package.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A cache reference has no matching entry.
    #[error("package '{reference}' not found in the local cache")]
    NotFound { reference: String },

    /// A `classpath:` reference was given but no asset root is configured.
    #[error("no asset directory configured for '{reference}'")]
    NoAssetRoot { reference: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The archive bytes do not form a valid package.
    #[error("invalid package from '{reference}': {source}")]
    Package {
        reference: String,
        #[source]
        source: PackageError,
    },
}

impl ResolveError {
    /// Whether the error stems from I/O rather than malformed content.
    pub fn is_io(&self) -> bool {
        match self {
            Self::Fetch(_) | Self::Cache(_) => true,
            Self::Package { source, .. } => source.is_io(),
            Self::NotFound { .. } | Self::NoAssetRoot { .. } => false,
        }
    }
}

/// Resolves package references against a cache and a fetcher.
pub struct PackageResolver {
    cache: Arc<dyn PackageCache>,
    fetcher: Arc<dyn PackageFetcher>,
    asset_root: Option<PathBuf>,
}

impl PackageResolver {
    pub fn new(cache: Arc<dyn PackageCache>, fetcher: Arc<dyn PackageFetcher>) -> Self {
        Self {
            cache,
            fetcher,
            asset_root: None,
        }
    }

    /// Directory against which `classpath:` references are resolved.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn cache(&self) -> &Arc<dyn PackageCache> {
        &self.cache
    }

    /// Resolve a reference into a package.
    pub fn resolve(&self, reference: &PackageReference) -> Result<Package, ResolveError> {
        debug!(reference = %reference, "Resolving package");

        match reference {
            PackageReference::Cached { id, version } => {
                self.load_cached(id, version.as_deref(), reference)
            }
            PackageReference::Remote(url) => {
                if let Some(package) = self.load_by_source(url, reference)? {
                    return Ok(package);
                }
                let bytes = self.fetcher.fetch_remote(url)?;
                self.install(bytes, url, reference)
            }
            PackageReference::Local(path) => {
                let bytes = self.fetcher.read_local(path)?;
                self.install(bytes, &path.display().to_string(), reference)
            }
            PackageReference::Asset(relative) => {
                let path = self.asset_path(relative, reference)?;
                let bytes = self.fetcher.read_local(&path)?;
                self.install(bytes, &reference.to_string(), reference)
            }
        }
    }

    fn asset_path(
        &self,
        relative: &Path,
        reference: &PackageReference,
    ) -> Result<PathBuf, ResolveError> {
        self.asset_root
            .as_ref()
            .map(|root| root.join(relative))
            .ok_or_else(|| ResolveError::NoAssetRoot {
                reference: reference.to_string(),
            })
    }

    fn load_cached(
        &self,
        id: &str,
        version: Option<&str>,
        reference: &PackageReference,
    ) -> Result<Package, ResolveError> {
        let not_found = || ResolveError::NotFound {
            reference: reference.to_string(),
        };

        let version = match version {
            Some(version) => version.to_string(),
            None => latest_version(self.cache.versions(id)?).ok_or_else(not_found)?,
        };

        let bytes = self.cache.load(id, &version)?.ok_or_else(not_found)?;
        parse(&bytes, reference)
    }

    fn load_by_source(
        &self,
        url: &str,
        reference: &PackageReference,
    ) -> Result<Option<Package>, ResolveError> {
        let Some(entry) = self.cache.find_by_source(url)? else {
            return Ok(None);
        };
        let Some(bytes) = self.cache.load(&entry.id, &entry.version)? else {
            return Ok(None);
        };

        info!(url = %url, package = %entry.key(), "Using cached package");
        parse(&bytes, reference).map(Some)
    }

    fn install(
        &self,
        bytes: Vec<u8>,
        source: &str,
        reference: &PackageReference,
    ) -> Result<Package, ResolveError> {
        let package = parse(&bytes, reference)?;

        let outcome = self.cache.add(NewEntry {
            id: package.id(),
            version: package.version(),
            bytes: &bytes,
            description: package.description(),
            source: Some(source),
        })?;
        match outcome {
            AddOutcome::Added => {
                info!(package = %package, source = %source, "Package added to cache")
            }
            AddOutcome::AlreadyPresent => debug!(package = %package, "Package already cached"),
        }

        self.load_cached(package.id(), Some(package.version()), reference)
    }
}

fn parse(bytes: &[u8], reference: &PackageReference) -> Result<Package, ResolveError> {
    Package::from_bytes(bytes).map_err(|source| ResolveError::Package {
        reference: reference.to_string(),
        source,
    })
}
