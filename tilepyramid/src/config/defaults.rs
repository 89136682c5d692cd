//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::settings::ConfigFile;
use super::{BuildConfig, LoggingConfig, RenderConfig};
use crate::aggregate::Aggregator;
use crate::builder::DownsampleMode;
use crate::codec::ImageFormat;

// =============================================================================
// Render defaults
// =============================================================================

/// Output CRS when a request names none.
pub const DEFAULT_TARGET_CRS: &str = crate::codec::DEFAULT_CRS;

/// Mask pixels above this value blank the output.
pub const DEFAULT_MASK_MAX: f64 = 1.0;

pub const DEFAULT_IMAGE_FORMAT: ImageFormat = ImageFormat::Png;

// =============================================================================
// Build defaults
// =============================================================================

pub const DEFAULT_AGGREGATOR: Aggregator = Aggregator::Mean;

pub const DEFAULT_DOWNSAMPLE: DownsampleMode = DownsampleMode::Quad;

// =============================================================================
// Logging defaults
// =============================================================================

/// Filter directive used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_LOG_FILE: &str = "tilepyramid.log";

/// Directory name under the user's home holding the config file.
pub const CONFIG_DIR_NAME: &str = ".tilepyramid";

pub const CONFIG_FILE_NAME: &str = "config.ini";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            build: BuildConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
