//! Logging setup for tilepipe hosts.
//!
//! Installs a global `tracing` subscriber with two outputs:
//! - a log file under the chosen directory, truncated at startup
//! - stdout, for following the service from a terminal
//!
//! The level filter comes from `RUST_LOG`, falling back to the given default.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Keeps the background file writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Initializes logging to `log_dir/log_file` and stdout.
///
/// # Arguments
///
/// * `log_dir` - Directory for the log file, created if missing
/// * `log_file` - Log file name; an existing file is truncated
///
/// # Errors
///
/// Fails if the file cannot be prepared or a subscriber is already set.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    log_file: &str,
) -> Result<LoggingGuard, LoggingError> {
    let (file_writer, guard) = file_writer(log_dir.as_ref(), log_file)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(guard)
}

/// Builds the level filter from `RUST_LOG`, or `default` when unset.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn file_writer(
    log_dir: &Path,
    log_file: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, LoggingGuard), LoggingError> {
    let path = log_dir.join(log_file);
    let io_error = |source| LoggingError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(log_dir).map_err(io_error)?;
    fs::write(&path, "").map_err(io_error)?;

    let appender = tracing_appender::rolling::never(log_dir, log_file);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);
    Ok((
        writer,
        LoggingGuard {
            _file_guard: file_guard,
            path,
        },
    ))
}

/// Default log directory, relative to the working directory.
pub fn default_log_dir() -> &'static str {
    "logs"
}

pub fn default_log_file() -> &'static str {
    "tilepipe.log"
}
