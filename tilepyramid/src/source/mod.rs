//! Tile storage and dataset lookup.
//!
//! The renderer and builder never touch storage directly. They read tiles
//! through [`TileSource`], write them through [`TileSink`], and find
//! datasets through a [`PyramidCatalog`]. In-memory implementations of all
//! three live here; other backends implement the same traits.

mod catalog;
mod memory;

pub use catalog::{AccessPolicy, CatalogError, MemoryCatalog, Pyramid, PyramidCatalog};
pub use memory::MemoryTileStore;

use thiserror::Error;

use crate::coord::{CoordError, GeoBounds, TileId};
use crate::raster::RasterBlock;

/// Errors from reading or writing tiles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("Tile {id} not found at zoom {zoom}")]
    NotFound { id: TileId, zoom: u8 },

    #[error("Tile storage I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// Read access to the tiles of one pyramid.
///
/// Retry and backoff, if any, are the implementation's business; callers
/// treat every error as final.
///
/// # Example
///
/// ```
/// use tilepyramid::coord::GeoBounds;
/// use tilepyramid::source::{SourceError, TileSource};
///
/// fn first_tile(source: &dyn TileSource, bounds: &GeoBounds, zoom: u8) -> Result<(), SourceError> {
///     if let Some(id) = source.list_overlapping(bounds, zoom)?.first() {
///         let block = source.fetch(*id, zoom)?;
///         println!("{}x{}", block.raster().width(), block.raster().height());
///     }
///     Ok(())
/// }
/// ```
pub trait TileSource: Send + Sync {
    /// Fetches one tile.
    ///
    /// Returns [`SourceError::NotFound`] if the pyramid has no tile there.
    fn fetch(&self, id: TileId, zoom: u8) -> Result<RasterBlock, SourceError>;

    /// Ids of the stored tiles at `zoom` whose extent overlaps `bounds`.
    fn list_overlapping(&self, bounds: &GeoBounds, zoom: u8) -> Result<Vec<TileId>, SourceError>;
}

/// Write access to the tiles of one pyramid.
pub trait TileSink: Send + Sync {
    /// Stores `block`, replacing any tile with the same id.
    fn store(&self, zoom: u8, block: RasterBlock) -> Result<(), SourceError>;
}
