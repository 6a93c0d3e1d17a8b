//! Tracing subscriber setup.
//!
//! Console output always goes to stderr so command output on stdout stays
//! clean. When a log directory is configured, a daily-rotated file receives
//! the same events through a non-blocking writer; the returned
//! [`LoggingGuard`] must be kept alive until the process exits so buffered
//! lines are flushed.
//!
//! Level precedence: an explicit level (the `--log-level` flag), then
//! `RUST_LOG`, then the configured level, then `info`. Invalid candidates
//! are skipped.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// File name prefix of rotated log files.
pub const LOG_FILE_PREFIX: &str = "profilegen.log";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Keeps the file writer alive; dropping it flushes pending log lines.
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Build the level filter from an explicit level, `RUST_LOG` and the
/// configured level, in that order.
pub fn env_filter(explicit: Option<&str>, configured: &str) -> EnvFilter {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    select_filter(explicit, from_env.as_deref(), configured)
}

fn select_filter(explicit: Option<&str>, from_env: Option<&str>, configured: &str) -> EnvFilter {
    [explicit, from_env, Some(configured)]
        .into_iter()
        .flatten()
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber.
pub fn init_logging(
    explicit: Option<&str>,
    configured: &str,
    directory: Option<&Path>,
) -> Result<LoggingGuard, LoggingError> {
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(timer.clone());

    let (file, guard) = match directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(explicit, configured))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}
