//! Configuration types for tilepyramid components.
//!
//! Each component takes an explicit configuration object rather than
//! reading global state:
//!
//! - [`RenderConfig`] for [`crate::render::TileRenderer`]
//! - [`BuildConfig`] for [`crate::builder::PyramidBuilder`]
//! - [`LoggingConfig`] for [`crate::logging::init_logging`]
//!
//! [`ConfigFile`] loads all three from `~/.tilepyramid/config.ini`.
//!
//! # Example
//!
//! ```
//! use tilepyramid::aggregate::Aggregator;
//! use tilepyramid::config::{BuildConfig, RenderConfig};
//!
//! let render = RenderConfig::new().with_mask_max(0.5);
//! let build = BuildConfig::new().with_aggregator(Aggregator::Min);
//! ```

mod build;
pub mod defaults;
mod file;
mod logging;
mod parser;
mod render;
mod settings;
mod writer;

pub use build::BuildConfig;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use logging::LoggingConfig;
pub use render::RenderConfig;
pub use settings::ConfigFile;
