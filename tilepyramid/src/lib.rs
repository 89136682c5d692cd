//! tilepyramid - geodetic raster tile pyramids
//!
//! Multi-resolution raster datasets stored as square tiles on a
//! longitude/latitude grid, with the pieces needed to build and serve them:
//!
//! - [`coord`]: tile addressing, resolution and pixel geometry
//! - [`metadata`]: the per-pyramid JSON descriptor
//! - [`aggregate`]: 2×2 downsampling policies
//! - [`raster`]: in-memory pixel storage
//! - [`builder`]: building lower zoom levels from the base level
//! - [`render`]: answering bounds and tile requests
//! - [`source`] and [`codec`]: the storage and pixel-format seams
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tilepyramid::codec::ImageCodec;
//! use tilepyramid::config::RenderConfig;
//! use tilepyramid::coord::{GeoBounds, TileCoord};
//! use tilepyramid::metadata::PyramidMetadata;
//! use tilepyramid::raster::{Raster, TileType};
//! use tilepyramid::render::{RenderRequest, TileRenderer};
//! use tilepyramid::source::{MemoryCatalog, MemoryTileStore};
//!
//! let store = Arc::new(MemoryTileStore::new());
//! store
//!     .insert(TileCoord::new(0, 0, 0), Raster::filled(4, 4, TileType::Float, &[1.5]))
//!     .unwrap();
//!
//! let mut metadata = PyramidMetadata { tile_size: 4, ..Default::default() };
//! metadata.set_name(0, "0");
//!
//! let catalog = Arc::new(MemoryCatalog::new());
//! catalog.register("demo", metadata, store);
//!
//! let renderer = TileRenderer::new(catalog, Arc::new(ImageCodec::new()), RenderConfig::default());
//! let request = RenderRequest::by_size("demo", GeoBounds::new(-180.0, -90.0, 0.0, 90.0), 4, 4);
//! let rendered = renderer.render(&request).unwrap();
//! assert_eq!(rendered.raster.get(0, 0, 0), 1.5);
//! ```

pub mod aggregate;
pub mod builder;
pub mod codec;
pub mod config;
pub mod coord;
pub mod logging;
pub mod metadata;
pub mod raster;
pub mod render;
pub mod source;

/// Version of the tilepyramid library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
