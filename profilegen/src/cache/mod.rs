//! Local package cache.
//!
//! Resolved packages are stored under their `id#version` key so later runs
//! can reuse them without reading the original source again. The cache is
//! passed to the resolver as a handle rather than living in a global.
//!
//! # Available Implementations
//!
//! - [`DiskPackageCache`]: directory-backed cache shared between runs and
//!   processes
//! - [`MemoryPackageCache`]: process-local cache using `dashmap`
//!
//! ```ignore
//! use std::sync::Arc;
//! use profilegen::cache::{DiskPackageCache, PackageCache};
//!
//! let cache: Arc<dyn PackageCache> = Arc::new(DiskPackageCache::open("/tmp/packages")?);
//! ```

mod disk;
mod memory;
mod traits;

pub use disk::{DiskPackageCache, ARCHIVE_FILENAME, METADATA_FILENAME};
pub use memory::MemoryPackageCache;
pub use traits::{
    latest_version, AddOutcome, CacheEntryMetadata, CacheError, CacheResult, NewEntry,
    PackageCache,
};
