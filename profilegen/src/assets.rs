//! Bundled base definitions per dialect.
//!
//! Every supported dialect ships one archive with the core definitions of its
//! release (resource types, data types, base profiles). The context builder
//! opens it through the [`DefinitionAssets`] trait so tests can supply
//! in-memory archives.
//!
//! [`AssetDirectory`] serves the archives from a directory laid out as:
//!
//! ```text
//! <root>/
//! ├── r4/definitions.json.tgz
//! └── r5/definitions.json.tgz
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dialect::Dialect;

/// File name of the base definition archive inside a dialect directory.
pub const DEFINITIONS_ARCHIVE: &str = "definitions.json.tgz";

/// Errors raised while opening base definitions.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("base definitions for {dialect} not found at {path}")]
    Missing { dialect: Dialect, path: PathBuf },

    #[error("failed to open base definitions at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Provider of the base definition archive for each dialect.
pub trait DefinitionAssets: Send + Sync {
    /// Open the gzip-compressed tar archive of base definitions.
    fn open_definitions(&self, dialect: Dialect) -> Result<Box<dyn Read + Send>, AssetError>;
}

/// Base definitions read from a directory on disk.
#[derive(Debug, Clone)]
pub struct AssetDirectory {
    root: PathBuf,
}

impl AssetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the definition archive for `dialect`.
    pub fn definitions_path(&self, dialect: Dialect) -> PathBuf {
        self.root.join(dialect.tag()).join(DEFINITIONS_ARCHIVE)
    }
}

impl DefinitionAssets for AssetDirectory {
    fn open_definitions(&self, dialect: Dialect) -> Result<Box<dyn Read + Send>, AssetError> {
        let path = self.definitions_path(dialect);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::Missing { dialect, path })
            }
            Err(source) => Err(AssetError::Io { path, source }),
        }
    }
}
