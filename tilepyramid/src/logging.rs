//! Logging setup for applications embedding tilepyramid.
//!
//! The library itself only emits `tracing` events. [`init_logging`]
//! installs a subscriber that:
//! - prints to stdout in the multi-line pretty format
//! - also writes to a log file when a directory is configured (the file is
//!   cleared at start)
//! - filters by `RUST_LOG`, falling back to the configured level

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::defaults::DEFAULT_LOG_LEVEL;
use crate::config::LoggingConfig;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, io::Error> {
    let (file_layer, file_guard) = match config.directory() {
        Some(dir) => {
            prepare_log_file(dir, config.file())?;
            let file_appender = tracing_appender::rolling::never(dir, config.file());
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .pretty();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_span_events(FmtSpan::CLOSE)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter(config.level()))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Creates `dir` if needed and empties `dir/file`.
fn prepare_log_file(dir: &Path, file: &str) -> Result<PathBuf, io::Error> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file);
    fs::write(&path, "")?;
    Ok(path)
}

/// `RUST_LOG` when set, else `level`, else the default level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}
