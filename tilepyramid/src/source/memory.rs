//! In-memory tile store.

use std::sync::Arc;

use dashmap::DashMap;

use super::{SourceError, TileSink, TileSource};
use crate::coord::{self, GeoBounds, TileCoord, TileId};
use crate::raster::{Raster, RasterBlock};

/// Tiles held in a concurrent map keyed by tile id.
///
/// Fetching hands out a shared reference to the stored pixels; nothing is
/// copied until a caller asks for an owned raster.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    tiles: DashMap<TileId, Arc<Raster>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raster at a tile position.
    pub fn insert(&self, tile: TileCoord, raster: Raster) -> Result<TileId, SourceError> {
        let id = coord::tile_id(tile.col, tile.row, tile.zoom)?;
        self.tiles.insert(id, Arc::new(raster));
        Ok(id)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.tiles.contains_key(&id)
    }

    pub fn remove(&self, id: TileId) -> Option<Raster> {
        self.tiles.remove(&id).map(|(_, r)| Arc::unwrap_or_clone(r))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Ids of every stored tile at `zoom`, sorted.
    pub fn ids_at(&self, zoom: u8) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self
            .tiles
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| coord::tile_from_id(*id).is_ok_and(|t| t.zoom == zoom))
            .collect();
        ids.sort();
        ids
    }
}

impl TileSource for MemoryTileStore {
    fn fetch(&self, id: TileId, zoom: u8) -> Result<RasterBlock, SourceError> {
        self.tiles
            .get(&id)
            .map(|entry| RasterBlock::shared(id, Arc::clone(entry.value())))
            .ok_or(SourceError::NotFound { id, zoom })
    }

    fn list_overlapping(&self, bounds: &GeoBounds, zoom: u8) -> Result<Vec<TileId>, SourceError> {
        let range = coord::bounds_to_tiles(bounds, zoom);
        let cells = (range.width() * range.height()) as usize;

        let mut ids = if cells <= self.tiles.len() {
            range
                .cells()
                .map(|(col, row)| coord::tile_id(col as u32, row as u32, zoom))
                .filter(|id| id.as_ref().map_or(true, |id| self.tiles.contains_key(id)))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            self.ids_at(zoom)
                .into_iter()
                .filter(|id| {
                    coord::tile_from_id(*id)
                        .is_ok_and(|t| range.contains(t.col as i64, t.row as i64))
                })
                .collect()
        };
        ids.sort();
        Ok(ids)
    }
}

impl TileSink for MemoryTileStore {
    fn store(&self, _zoom: u8, block: RasterBlock) -> Result<(), SourceError> {
        let id = block.id();
        self.tiles.insert(id, Arc::new(block.into_owned()));
        Ok(())
    }
}
