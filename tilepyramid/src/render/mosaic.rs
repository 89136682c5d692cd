//! Mosaic assembly and cropping.

use rayon::prelude::*;
use tracing::debug;

use super::RenderError;
use crate::coord::{self, GeoBounds, Pixel};
use crate::raster::Raster;
use crate::source::{Pyramid, SourceError};

/// Offset applied before snapping a fractional crop edge to a whole pixel.
const CROP_EPSILON: f64 = 1e-6;

/// The tiles covering a request, merged into one raster.
#[derive(Debug)]
pub(super) struct Mosaic {
    pub raster: Raster,
    /// World pixel column of the mosaic's left edge
    pub origin_x: i64,
    /// World pixel row of the mosaic's top edge
    pub origin_y: i64,
}

/// Fetches every stored tile overlapping `bounds` at `zoom` and places each
/// at the offset given by its own column and row.
///
/// Tiles listed but missing on fetch are left as nodata. Any other read
/// failure ends the request.
pub(super) fn assemble(pyramid: &Pyramid, bounds: &GeoBounds, zoom: u8) -> Result<Mosaic, RenderError> {
    let metadata = pyramid.metadata();
    let tile_size = metadata.tile_size as i64;
    let nodata = metadata.nodata_values();
    let range = coord::bounds_to_tiles(bounds, zoom);

    let ids = pyramid
        .source()
        .list_overlapping(bounds, zoom)
        .map_err(|source| RenderError::Listing {
            name: pyramid.name().to_string(),
            zoom,
            source,
        })?;

    let tiles = ids
        .into_par_iter()
        .map(|id| -> Result<_, RenderError> {
            let tile = coord::tile_from_id(id)?;
            match pyramid.source().fetch(id, zoom) {
                Ok(block) => Ok(Some((tile, block))),
                Err(SourceError::NotFound { .. }) => {
                    debug!(pyramid = %pyramid.name(), %tile, "Listed tile missing, using nodata");
                    Ok(None)
                }
                Err(source) => Err(RenderError::Tile {
                    name: pyramid.name().to_string(),
                    zoom,
                    col: tile.col,
                    row: tile.row,
                    source,
                }),
            }
        })
        .collect::<Result<Vec<_>, RenderError>>()?;

    let width = (range.width() * tile_size) as usize;
    let height = (range.height() * tile_size) as usize;
    let mut raster = Raster::filled(width, height, metadata.tile_type, &nodata);

    let mut placed = 0;
    for (tile, block) in tiles.into_iter().flatten() {
        let (col, row) = (tile.col as i64, tile.row as i64);
        if !range.contains(col, row) {
            continue;
        }
        let dx = (col - range.min_x) * tile_size;
        let dy = (range.max_y - row) * tile_size;
        raster.blit(block.raster(), dx, dy);
        placed += 1;
    }
    debug!(
        pyramid = %pyramid.name(),
        zoom,
        placed,
        width,
        height,
        "Assembled mosaic"
    );

    Ok(Mosaic {
        raster,
        origin_x: range.min_x * tile_size,
        origin_y: (coord::num_tiles_y(zoom) as i64 - 1 - range.max_y) * tile_size,
    })
}

/// A whole-pixel window in world pixel coordinates at one zoom.
///
/// `x1` and `y1` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PixelWindow {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl PixelWindow {
    /// Smallest window covering `bounds`, and whether its edges fall
    /// exactly on the bounds' edges.
    pub fn covering(bounds: &GeoBounds, zoom: u8, tile_size: u32) -> (PixelWindow, bool) {
        let ul = coord::lat_lon_to_pixels_ul(bounds.n, bounds.w, zoom, tile_size);
        let lr = coord::lat_lon_to_pixels_ul(bounds.s, bounds.e, zoom, tile_size);

        let x0 = (ul.x + CROP_EPSILON).floor() as i64;
        let y0 = (ul.y + CROP_EPSILON).floor() as i64;
        let x1 = ((lr.x - CROP_EPSILON).ceil() as i64).max(x0 + 1);
        let y1 = ((lr.y - CROP_EPSILON).ceil() as i64).max(y0 + 1);

        let on_edge = |edge: i64, exact: f64| (edge as f64 - exact).abs() < CROP_EPSILON;
        let aligned = on_edge(x0, ul.x) && on_edge(y0, ul.y) && on_edge(x1, lr.x) && on_edge(y1, lr.y);
        (PixelWindow { x0, y0, x1, y1 }, aligned)
    }

    #[inline]
    pub fn width(&self) -> usize {
        (self.x1 - self.x0) as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        (self.y1 - self.y0) as usize
    }

    /// Grows the window by `margin` pixels on every side.
    pub fn padded(self, margin: i64) -> PixelWindow {
        PixelWindow {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }

    /// Geographic extent of the window. May reach past the world edges.
    pub fn extent(&self, zoom: u8, tile_size: u32) -> GeoBounds {
        let corner = |x: i64, y: i64| {
            coord::pixels_ul_to_lat_lon(
                Pixel {
                    x: x as f64,
                    y: y as f64,
                },
                zoom,
                tile_size,
            )
        };
        let (n, w) = corner(self.x0, self.y0);
        let (s, e) = corner(self.x1, self.y1);
        GeoBounds::new(w, s, e, n)
    }
}

/// Cuts `window` out of the mosaic. Cells the mosaic does not cover are
/// nodata.
pub(super) fn crop(mosaic: &Mosaic, window: &PixelWindow, nodata: &[f64]) -> Raster {
    mosaic.raster.window(
        window.x0 - mosaic.origin_x,
        window.y0 - mosaic.origin_y,
        window.width(),
        window.height(),
        nodata,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::coord::TileCoord;
    use crate::metadata::PyramidMetadata;
    use crate::raster::TileType;
    use crate::source::MemoryTileStore;

    const ND: f64 = -1.0;

    fn pyramid(store: MemoryTileStore) -> Pyramid {
        let mut metadata = PyramidMetadata {
            tile_size: 2,
            default_values: vec![ND],
            ..Default::default()
        };
        metadata.set_max_zoom_level(1);
        Pyramid::new("grid", Arc::new(metadata), Arc::new(store))
    }

    #[test]
    fn test_tiles_land_north_up() {
        let store = MemoryTileStore::new();
        store
            .insert(TileCoord::new(0, 1, 1), Raster::filled(2, 2, TileType::Double, &[1.0]))
            .unwrap();
        store
            .insert(TileCoord::new(1, 0, 1), Raster::filled(2, 2, TileType::Double, &[2.0]))
            .unwrap();
        let pyramid = pyramid(store);

        // tiles (0..=1, 0..=1) at zoom 1 span 90 degrees each
        let bounds = GeoBounds::new(-180.0, -90.0, 0.0, 90.0);
        let mosaic = assemble(&pyramid, &bounds, 1).unwrap();

        assert_eq!((mosaic.raster.width(), mosaic.raster.height()), (4, 4));
        assert_eq!((mosaic.origin_x, mosaic.origin_y), (0, 0));
        assert_eq!(mosaic.raster.get(0, 0, 0), 1.0);
        assert_eq!(mosaic.raster.get(3, 3, 0), 2.0);
        assert_eq!(mosaic.raster.get(3, 0, 0), ND);
        assert_eq!(mosaic.raster.get(0, 3, 0), ND);
    }

    #[test]
    fn test_crop_to_fractional_bounds() {
        let store = MemoryTileStore::new();
        let data = (0..4).map(f64::from).collect();
        store
            .insert(
                TileCoord::new(2, 1, 1),
                Raster::from_data(2, 2, 1, TileType::Double, data).unwrap(),
            )
            .unwrap();
        let pyramid = pyramid(store);

        // one 45 degree pixel at the tile's lower right corner
        let bounds = GeoBounds::new(45.0, 0.0, 90.0, 45.0);
        let (window, aligned) = PixelWindow::covering(&bounds, 1, 2);
        assert!(aligned);
        assert_eq!((window.width(), window.height()), (1, 1));
        assert_eq!(window.extent(1, 2), bounds);

        let mosaic = assemble(&pyramid, &window.extent(1, 2), 1).unwrap();
        assert_eq!(crop(&mosaic, &window, &[ND]).data(), &[3.0]);

        // a sliver inside that pixel still covers the whole pixel
        let sliver = GeoBounds::new(50.0, 10.0, 60.0, 20.0);
        let (covering, aligned) = PixelWindow::covering(&sliver, 1, 2);
        assert!(!aligned);
        assert_eq!(covering, window);
    }

    #[test]
    fn test_padded_window_reaches_neighbouring_tiles() {
        let store = MemoryTileStore::new();
        store
            .insert(TileCoord::new(2, 1, 1), Raster::filled(2, 2, TileType::Double, &[1.0]))
            .unwrap();
        store
            .insert(TileCoord::new(3, 1, 1), Raster::filled(2, 2, TileType::Double, &[2.0]))
            .unwrap();
        let pyramid = pyramid(store);

        let (window, _) = PixelWindow::covering(&GeoBounds::new(0.0, 0.0, 90.0, 90.0), 1, 2);
        let padded = window.padded(1);
        assert_eq!((padded.width(), padded.height()), (4, 4));
        assert_eq!(padded.extent(1, 2), GeoBounds::new(-45.0, -45.0, 135.0, 135.0));

        let mosaic = assemble(&pyramid, &padded.extent(1, 2), 1).unwrap();
        let raster = crop(&mosaic, &padded, &[ND]);

        // the east margin column comes from the next tile
        assert_eq!(raster.get(3, 1, 0), 2.0);
        assert_eq!(raster.get(1, 1, 0), 1.0);
        // past the north pole there is nothing
        assert_eq!(raster.get(1, 0, 0), ND);
        assert_eq!(raster.get(0, 1, 0), ND);
    }
}
