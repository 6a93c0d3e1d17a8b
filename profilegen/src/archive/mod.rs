//! Reading members out of gzip-compressed tar archives.
//!
//! Conformance packages are distributed as `package.tgz` files and the base
//! definition sets bundled per dialect use the same container format. This
//! module hides the gzip + tar layering behind [`PackageArchive`], which
//! yields `(name, bytes)` pairs lazily.
//!
//! # Example
//!
//! ```ignore
//! use std::fs::File;
//! use profilegen::archive::PackageArchive;
//!
//! let mut archive = PackageArchive::new(File::open("package.tgz")?);
//! for member in archive.members(".json")? {
//!     let member = member?;
//!     println!("{} ({} bytes)", member.name, member.bytes.len());
//! }
//! ```

use std::io::{self, Read};

use flate2::read::GzDecoder;
use tar::{Archive, Entries, EntryType};
use thiserror::Error;

/// Suffix of structured JSON documents inside an archive.
pub const JSON_SUFFIX: &str = ".json";

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while reading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The stream is unreadable, truncated or not a gzip/tar container.
    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),

    /// `members()` was called a second time on the same archive.
    #[error("archive members have already been consumed")]
    AlreadyConsumed,
}

/// One regular file extracted from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Member path as recorded in the archive (e.g. `package/package.json`).
    pub name: String,
    /// Raw member contents.
    pub bytes: Vec<u8>,
}

/// A gzip-compressed tar archive read from any byte stream.
pub struct PackageArchive<R: Read> {
    inner: Archive<GzDecoder<R>>,
    consumed: bool,
}

impl<R: Read> PackageArchive<R> {
    /// Wrap a reader positioned at the start of a `.tgz` stream.
    pub fn new(reader: R) -> Self {
        Self {
            inner: Archive::new(GzDecoder::new(reader)),
            consumed: false,
        }
    }

    /// Iterate over regular-file members whose name ends with `suffix`.
    ///
    /// The sequence is finite and can only be produced once per archive.
    pub fn members<'a>(&'a mut self, suffix: &'a str) -> ArchiveResult<ArchiveMembers<'a, R>> {
        if self.consumed {
            return Err(ArchiveError::AlreadyConsumed);
        }
        self.consumed = true;

        Ok(ArchiveMembers {
            entries: self.inner.entries()?,
            suffix,
            failed: false,
        })
    }

    /// Read every regular-file member into memory.
    pub fn read_all_members(&mut self) -> ArchiveResult<Vec<ArchiveMember>> {
        self.members("")?.collect()
    }
}

/// Lazy iterator returned by [`PackageArchive::members`].
///
/// After the first error the iterator is fused: there is no recovery from a
/// corrupt stream.
pub struct ArchiveMembers<'a, R: Read> {
    entries: Entries<'a, GzDecoder<R>>,
    suffix: &'a str,
    failed: bool,
}

impl<R: Read> ArchiveMembers<'_, R> {
    fn read_next(&mut self) -> Option<ArchiveResult<ArchiveMember>> {
        loop {
            let mut entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            if entry.header().entry_type() != EntryType::Regular {
                continue;
            }

            let name = match entry.path() {
                Ok(path) => path.to_string_lossy().replace('\\', "/"),
                Err(e) => return Some(Err(e.into())),
            };

            if !name.ends_with(self.suffix) {
                continue;
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            if let Err(e) = entry.read_to_end(&mut bytes) {
                return Some(Err(e.into()));
            }

            return Some(Ok(ArchiveMember { name, bytes }));
        }
    }
}

impl<R: Read> Iterator for ArchiveMembers<'_, R> {
    type Item = ArchiveResult<ArchiveMember>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let item = self.read_next();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Build an in-memory `.tgz` from `(path, contents)` pairs.
    pub fn tgz(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .expect("append tar member");
        }

        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip")
    }
}
