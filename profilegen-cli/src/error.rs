//! CLI error type.

use std::process::ExitCode;

use profilegen::cache::CacheError;
use profilegen::config::ConfigError;
use profilegen::fetch::FetchError;
use profilegen::logging::LoggingError;
use profilegen::{ErrorKind, PipelineError};
use thiserror::Error;

/// Errors surfaced to the user by a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{kind} error: {source}")]
    Pipeline {
        kind: ErrorKind,
        #[source]
        source: PipelineError,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Network client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("{failed} of {attempted} profiles failed")]
    JobsFailed { failed: usize, attempted: usize },
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// Job failures under `--strict` exit with 2, everything else with 1.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::JobsFailed { .. } => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(source: PipelineError) -> Self {
        Self::Pipeline {
            kind: source.kind(),
            source,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profilegen::package::ReferenceError;

    #[test]
    fn test_pipeline_error_carries_kind() {
        let err = CliError::from(PipelineError::from(ReferenceError::Empty));
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_strict_failures_exit_with_two() {
        let err = CliError::JobsFailed {
            failed: 1,
            attempted: 3,
        };
        assert_eq!(err.exit_code(), ExitCode::from(2));
        assert_eq!(err.to_string(), "1 of 3 profiles failed");
    }
}
