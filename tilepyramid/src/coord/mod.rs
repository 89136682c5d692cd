//! Coordinate conversion module
//!
//! Geometry of the geodetic tile pyramid: tile ids, tile bounds, pixel
//! positions and the resolution/zoom relationship. Longitude spans
//! -180..180 and latitude -90..90 with a linear mapping, so zoom 0 is two
//! square tiles wide and one tall.
//!
//! Everything here is a pure function of its arguments.

mod types;

pub use types::{
    CoordError, GeoBounds, GridRect, Pixel, TileCoord, TileId, MAX_LAT, MAX_LON, MAX_ZOOM,
    MIN_LAT, MIN_LON, MIN_ZOOM,
};

/// Tolerance applied when snapping fractional tile positions to integers.
const EDGE_EPSILON: f64 = 1e-9;

/// Number of tile columns at `zoom`.
#[inline]
pub fn num_tiles_x(zoom: u8) -> u64 {
    1u64 << (zoom as u32 + 1)
}

/// Number of tile rows at `zoom`.
#[inline]
pub fn num_tiles_y(zoom: u8) -> u64 {
    1u64 << zoom as u32
}

/// Id of the first tile at `zoom`; equals the tile count of all shallower levels.
#[inline]
fn level_offset(zoom: u8) -> u64 {
    // sum over k < zoom of 2 * 4^k
    2 * ((1u64 << (2 * zoom as u32)) - 1) / 3
}

/// Width (and height) of one tile at `zoom`, in degrees.
#[inline]
pub fn tile_degrees(zoom: u8) -> f64 {
    180.0 / num_tiles_y(zoom) as f64
}

/// Encodes a tile position as a globally unique id.
///
/// # Errors
///
/// Returns an error if the zoom exceeds [`MAX_ZOOM`] or the tile lies
/// outside the grid at that zoom.
pub fn tile_id(col: u32, row: u32, zoom: u8) -> Result<TileId, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    if col as u64 >= num_tiles_x(zoom) || row as u64 >= num_tiles_y(zoom) {
        return Err(CoordError::TileOutOfRange { col, row, zoom });
    }
    Ok(TileId(
        level_offset(zoom) + row as u64 * num_tiles_x(zoom) + col as u64,
    ))
}

/// Decodes a tile id back into its position; the exact inverse of [`tile_id`].
pub fn tile_from_id(id: TileId) -> Result<TileCoord, CoordError> {
    let raw = id.get();
    if raw >= level_offset(MAX_ZOOM + 1) {
        return Err(CoordError::InvalidTileId(raw));
    }

    let zoom = (MIN_ZOOM..=MAX_ZOOM)
        .find(|&z| raw < level_offset(z + 1))
        .ok_or(CoordError::InvalidTileId(raw))?;

    let local = raw - level_offset(zoom);
    let width = num_tiles_x(zoom);
    Ok(TileCoord {
        col: (local % width) as u32,
        row: (local / width) as u32,
        zoom,
    })
}

/// Degrees per pixel at `zoom` for tiles `tile_size` pixels square.
#[inline]
pub fn resolution(zoom: u8, tile_size: u32) -> f64 {
    180.0 / (tile_size as f64 * num_tiles_y(zoom) as f64)
}

/// The shallowest zoom whose resolution is at least as fine as `pixel_size`.
///
/// Never negative; sizes finer than [`MAX_ZOOM`] can represent return
/// [`MAX_ZOOM`]. Callers clamp further to a dataset's own maximum.
pub fn zoom_for_pixel_size(pixel_size: f64, tile_size: u32) -> u8 {
    let exact = (180.0 / (pixel_size * tile_size as f64)).log2();
    if exact.is_nan() {
        return MIN_ZOOM;
    }
    (exact - EDGE_EPSILON)
        .ceil()
        .clamp(MIN_ZOOM as f64, MAX_ZOOM as f64) as u8
}

/// Geographic extent of a single tile.
pub fn tile_bounds(col: u32, row: u32, zoom: u8, tile_size: u32) -> GeoBounds {
    let span = resolution(zoom, tile_size) * tile_size as f64;
    let w = MIN_LON + col as f64 * span;
    let s = MIN_LAT + row as f64 * span;
    GeoBounds {
        w,
        s,
        e: w + span,
        n: s + span,
    }
}

/// Geographic extent covered by an inclusive range of tiles.
pub fn tiles_to_bounds(tiles: &GridRect, zoom: u8, tile_size: u32) -> GeoBounds {
    let lower_left = tile_bounds(tiles.min_x as u32, tiles.min_y as u32, zoom, tile_size);
    let upper_right = tile_bounds(tiles.max_x as u32, tiles.max_y as u32, zoom, tile_size);
    lower_left.union(&upper_right)
}

/// Pixel position of a point, measured from the world's upper-left corner.
#[inline]
pub fn lat_lon_to_pixels_ul(lat: f64, lon: f64, zoom: u8, tile_size: u32) -> Pixel {
    let res = resolution(zoom, tile_size);
    Pixel {
        x: (lon - MIN_LON) / res,
        y: (MAX_LAT - lat) / res,
    }
}

/// Inverse of [`lat_lon_to_pixels_ul`]; returns `(lat, lon)`.
#[inline]
pub fn pixels_ul_to_lat_lon(pixel: Pixel, zoom: u8, tile_size: u32) -> (f64, f64) {
    let res = resolution(zoom, tile_size);
    (MAX_LAT - pixel.y * res, MIN_LON + pixel.x * res)
}

/// Tile containing a point.
///
/// Points on the east or north edge of the world belong to the last tile.
pub fn lat_lon_to_tile(lat: f64, lon: f64, zoom: u8) -> TileCoord {
    let deg = tile_degrees(zoom);
    let col = snap_index(((lon - MIN_LON) / deg).floor(), num_tiles_x(zoom));
    let row = snap_index(((lat - MIN_LAT) / deg).floor(), num_tiles_y(zoom));
    TileCoord {
        col: col as u32,
        row: row as u32,
        zoom,
    }
}

/// Inclusive range of tiles overlapping `bounds` at `zoom`.
///
/// Bounds that end exactly on a tile edge do not pull in the next tile.
/// The range is clamped to the world grid.
pub fn bounds_to_tiles(bounds: &GeoBounds, zoom: u8) -> GridRect {
    let deg = tile_degrees(zoom);
    let max_x = num_tiles_x(zoom);
    let max_y = num_tiles_y(zoom);

    let min_col = snap_index(((bounds.w - MIN_LON) / deg + EDGE_EPSILON).floor(), max_x);
    let min_row = snap_index(((bounds.s - MIN_LAT) / deg + EDGE_EPSILON).floor(), max_y);
    let max_col = snap_index(((bounds.e - MIN_LON) / deg - EDGE_EPSILON).ceil() - 1.0, max_x);
    let max_row = snap_index(((bounds.n - MIN_LAT) / deg - EDGE_EPSILON).ceil() - 1.0, max_y);

    GridRect {
        min_x: min_col,
        min_y: min_row,
        max_x: max_col.max(min_col),
        max_y: max_row.max(min_row),
    }
}

#[inline]
fn snap_index(value: f64, count: u64) -> i64 {
    value.clamp(0.0, (count - 1) as f64) as i64
}
