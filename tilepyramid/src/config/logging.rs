//! Logging configuration.

use std::path::{Path, PathBuf};

use super::defaults::{DEFAULT_LOG_FILE, DEFAULT_LOG_LEVEL};

/// Where and how much to log.
///
/// With no directory set, logs only go to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    directory: Option<PathBuf>,
    file: String,
    level: String,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write logs to a file in `directory`.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the log file name. Default: tilepyramid.log.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Set the filter used when `RUST_LOG` is unset. Default: info.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn level(&self) -> &str {
        &self.level
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file: DEFAULT_LOG_FILE.to_string(),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
