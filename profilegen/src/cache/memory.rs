//! In-memory package cache.
//!
//! Backed by a `DashMap` so it can be shared between threads without an
//! outer lock. Used by tests and by runs that must not touch the user's
//! disk cache.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::traits::{
    validate_key_part, AddOutcome, CacheEntryMetadata, CacheResult, NewEntry, PackageCache,
};
use crate::package::cache_key;

#[derive(Debug)]
struct StoredEntry {
    metadata: CacheEntryMetadata,
    bytes: Arc<Vec<u8>>,
}

/// Package cache held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryPackageCache {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryPackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PackageCache for MemoryPackageCache {
    fn add(&self, entry: NewEntry<'_>) -> CacheResult<AddOutcome> {
        validate_key_part(entry.id)?;
        validate_key_part(entry.version)?;

        match self.entries.entry(cache_key(entry.id, entry.version)) {
            Entry::Occupied(_) => Ok(AddOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(StoredEntry {
                    metadata: CacheEntryMetadata::describe(
                        entry.id,
                        entry.version,
                        entry.bytes,
                        entry.description,
                        entry.source,
                    ),
                    bytes: Arc::new(entry.bytes.to_vec()),
                });
                Ok(AddOutcome::Added)
            }
        }
    }

    fn load(&self, id: &str, version: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .get(&cache_key(id, version))
            .map(|stored| stored.bytes.as_ref().clone()))
    }

    fn metadata(&self, id: &str, version: &str) -> CacheResult<Option<CacheEntryMetadata>> {
        Ok(self
            .entries
            .get(&cache_key(id, version))
            .map(|stored| stored.metadata.clone()))
    }

    fn entries(&self) -> CacheResult<Vec<CacheEntryMetadata>> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|stored| stored.metadata.clone())
            .collect();
        entries.sort_by_key(|meta| meta.key());
        Ok(entries)
    }
}
