//! Settings loaded from the configuration file.

use super::{BuildConfig, LoggingConfig, RenderConfig};

/// Contents of `~/.tilepyramid/config.ini`.
///
/// Each section maps onto the configuration object handed to the
/// component it configures.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// `[render]` section
    pub render: RenderConfig,
    /// `[build]` section
    pub build: BuildConfig,
    /// `[logging]` section
    pub logging: LoggingConfig,
}
