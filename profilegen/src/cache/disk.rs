//! On-disk package cache.
//!
//! Layout:
//!
//! ```text
//! <root>/
//! ├── hl7.fhir.dk.core#3.2.0/
//! │   ├── package.tgz
//! │   └── metadata.json
//! └── .tmp-<key>-<pid>-<n>/      in-flight writes, renamed into place
//! ```
//!
//! An entry exists once its directory carries `metadata.json`. Entries are
//! assembled in a private temporary directory and renamed into place, so
//! concurrent readers never see a partially written entry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use super::traits::{
    validate_key_part, AddOutcome, CacheEntryMetadata, CacheError, CacheResult, NewEntry,
    PackageCache,
};
use crate::package::cache_key;

/// File name of the archive inside an entry directory.
pub const ARCHIVE_FILENAME: &str = "package.tgz";

/// File name of the entry metadata.
pub const METADATA_FILENAME: &str = "metadata.json";

const TEMP_PREFIX: &str = ".tmp-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Package cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskPackageCache {
    root: PathBuf,
}

impl DiskPackageCache {
    /// Open (and create if needed) a cache at `root`.
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_error(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of an id+version entry.
    pub fn entry_dir(&self, id: &str, version: &str) -> PathBuf {
        self.root.join(cache_key(id, version))
    }

    fn temp_dir(&self, key: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!("{TEMP_PREFIX}{key}-{}-{n}", std::process::id()))
    }

    fn read_metadata(path: &Path) -> CacheResult<Option<CacheEntryMetadata>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path)(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Metadata {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn write_entry(dir: &Path, entry: &NewEntry<'_>) -> CacheResult<()> {
        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let archive = dir.join(ARCHIVE_FILENAME);
        fs::write(&archive, entry.bytes).map_err(io_error(&archive))?;

        let metadata = CacheEntryMetadata::describe(
            entry.id,
            entry.version,
            entry.bytes,
            entry.description,
            entry.source,
        );
        let json = serde_json::to_vec_pretty(&metadata).map_err(|e| CacheError::Metadata {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        let meta_path = dir.join(METADATA_FILENAME);
        fs::write(&meta_path, json).map_err(io_error(&meta_path))
    }
}

impl PackageCache for DiskPackageCache {
    fn add(&self, entry: NewEntry<'_>) -> CacheResult<AddOutcome> {
        validate_key_part(entry.id)?;
        validate_key_part(entry.version)?;

        let key = cache_key(entry.id, entry.version);
        let target = self.entry_dir(entry.id, entry.version);
        if target.join(METADATA_FILENAME).is_file() {
            debug!(key = %key, "Package already cached");
            return Ok(AddOutcome::AlreadyPresent);
        }
        if target.exists() {
            return Err(CacheError::Foreign { path: target });
        }

        let temp = self.temp_dir(&key);
        if let Err(e) = Self::write_entry(&temp, &entry) {
            let _ = fs::remove_dir_all(&temp);
            return Err(e);
        }

        match fs::rename(&temp, &target) {
            Ok(()) => {
                debug!(key = %key, bytes = entry.bytes.len(), "Package cached");
                Ok(AddOutcome::Added)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&temp);
                if target.join(METADATA_FILENAME).is_file() {
                    // Another writer finished the same entry first.
                    debug!(key = %key, "Lost cache write race, keeping existing entry");
                    Ok(AddOutcome::AlreadyPresent)
                } else if target.is_dir() {
                    Err(CacheError::Foreign { path: target })
                } else {
                    Err(io_error(&target)(e))
                }
            }
        }
    }

    fn load(&self, id: &str, version: &str) -> CacheResult<Option<Vec<u8>>> {
        validate_key_part(id)?;
        validate_key_part(version)?;

        let dir = self.entry_dir(id, version);
        if !dir.join(METADATA_FILENAME).is_file() {
            return Ok(None);
        }
        let archive = dir.join(ARCHIVE_FILENAME);
        fs::read(&archive).map(Some).map_err(io_error(&archive))
    }

    fn metadata(&self, id: &str, version: &str) -> CacheResult<Option<CacheEntryMetadata>> {
        validate_key_part(id)?;
        validate_key_part(version)?;
        Self::read_metadata(&self.entry_dir(id, version).join(METADATA_FILENAME))
    }

    fn entries(&self) -> CacheResult<Vec<CacheEntryMetadata>> {
        let read_dir = fs::read_dir(&self.root).map_err(io_error(&self.root))?;

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(io_error(&self.root))?;
            let name = dir_entry.file_name();
            if name.to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }

            let meta_path = dir_entry.path().join(METADATA_FILENAME);
            match Self::read_metadata(&meta_path) {
                Ok(Some(meta)) => entries.push(meta),
                Ok(None) => {}
                Err(e) => warn!(path = %meta_path.display(), error = %e, "Skipping cache entry"),
            }
        }

        entries.sort_by_key(|meta| meta.key());
        Ok(entries)
    }
}
