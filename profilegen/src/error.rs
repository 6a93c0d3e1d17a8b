//! Top-level error type of a pipeline run.
//!
//! Every stage has its own error enum; [`PipelineError`] wraps them for the
//! caller and classifies each into one of the [`ErrorKind`]s so entry points
//! can react (exit codes, messages) without matching on stage internals.

use std::fmt;

use thiserror::Error;

use crate::context::ContextError;
use crate::discovery::DiscoveryError;
use crate::dispatch::DispatchError;
use crate::package::ReferenceError;
use crate::resolver::ResolveError;

/// Coarse classification of fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid input detected before any I/O (bad reference, unsupported
    /// dialect).
    Configuration,
    /// Filesystem, network or archive stream failure.
    Io,
    /// Malformed package or definition content.
    Parse,
    /// A referenced package is not available.
    NotFound,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Io => "io",
            Self::Parse => "parse",
            Self::NotFound => "not found",
        };
        f.write_str(name)
    }
}

/// Fatal error that aborted a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid package reference: {0}")]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("profile discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Reference(_) => ErrorKind::Configuration,
            Self::Resolve(ResolveError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Resolve(ResolveError::NoAssetRoot { .. }) => ErrorKind::Configuration,
            Self::Resolve(e) if e.is_io() => ErrorKind::Io,
            Self::Resolve(_) => ErrorKind::Parse,
            Self::Context(e) if e.is_configuration() => ErrorKind::Configuration,
            Self::Context(ContextError::Assets(_)) => ErrorKind::Io,
            Self::Context(ContextError::Archive(_)) => ErrorKind::Io,
            Self::Context(_) => ErrorKind::Configuration,
            Self::Discovery(DiscoveryError::Member { .. }) => ErrorKind::Io,
            Self::Discovery(_) => ErrorKind::Parse,
            Self::Dispatch(_) => ErrorKind::Io,
        }
    }
}
