//! Error types for package parsing.

use thiserror::Error;

use crate::archive::ArchiveError;

/// Result type for package operations.
pub type PackageResult<T> = Result<T, PackageError>;

/// Errors that can occur while reading a package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The archive stream could not be read.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The archive has no `package/package.json`.
    #[error("package archive has no package/package.json manifest")]
    MissingManifest,

    /// The manifest is not valid JSON or lacks required fields.
    #[error("invalid package manifest: {0}")]
    InvalidManifest(String),

    /// A member was requested that the folder does not contain.
    #[error("file '{file}' not found in folder '{folder}'")]
    FileNotFound { folder: String, file: String },
}

impl PackageError {
    /// Whether the error stems from unreadable bytes rather than content.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Archive(ArchiveError::Io(_)))
    }
}
