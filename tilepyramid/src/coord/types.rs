//! Coordinate type definitions

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geodetic latitude range
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Geodetic longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom range; tile ids for every level up to `MAX_ZOOM` fit in a `u64`.
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 30;

/// Globally unique tile identifier.
///
/// Levels are laid out one after another: level `z` starts where level
/// `z - 1` ends and holds `2^(z+1) × 2^z` tiles in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u64);

impl TileId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TileId {
    fn from(value: u64) -> Self {
        TileId(value)
    }
}

/// Tile coordinates in the geodetic (EPSG:4326) quad tiling.
///
/// Zoom 0 covers the world with two tiles side by side. Rows count up
/// from the south pole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// X coordinate (east-west), 0 at the antimeridian
    pub col: u32,
    /// Y coordinate (south-north), 0 at the south pole
    pub row: u32,
    /// Zoom level (0-30)
    pub zoom: u8,
}

impl TileCoord {
    #[inline]
    pub fn new(col: u32, row: u32, zoom: u8) -> Self {
        Self { col, row, zoom }
    }

    /// The tile one level up that covers this one.
    ///
    /// Returns `None` at zoom 0.
    #[inline]
    pub fn parent(&self) -> Option<TileCoord> {
        if self.zoom == 0 {
            return None;
        }
        Some(TileCoord {
            col: self.col / 2,
            row: self.row / 2,
            zoom: self.zoom - 1,
        })
    }

    /// The four tiles one level down, ordered upper-left, upper-right,
    /// lower-left, lower-right.
    #[inline]
    pub fn children(&self) -> [TileCoord; 4] {
        let zoom = self.zoom + 1;
        let col = self.col * 2;
        let row = self.row * 2;
        [
            TileCoord::new(col, row + 1, zoom),
            TileCoord::new(col + 1, row + 1, zoom),
            TileCoord::new(col, row, zoom),
            TileCoord::new(col + 1, row, zoom),
        ]
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Geographic bounding box in degrees.
///
/// Reads the legacy `{minX, minY, maxX, maxY}` spelling as well as the
/// canonical `{w, s, e, n}`; always writes the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    #[serde(alias = "maxY")]
    pub n: f64,
    #[serde(alias = "maxX")]
    pub e: f64,
    #[serde(alias = "minX")]
    pub w: f64,
    #[serde(alias = "minY")]
    pub s: f64,
}

impl GeoBounds {
    /// The whole geodetic world.
    pub const WORLD: GeoBounds = GeoBounds {
        w: MIN_LON,
        s: MIN_LAT,
        e: MAX_LON,
        n: MAX_LAT,
    };

    /// Creates bounds, swapping edges so that `w <= e` and `s <= n`.
    pub fn new(w: f64, s: f64, e: f64, n: f64) -> Self {
        Self {
            w: w.min(e),
            s: s.min(n),
            e: w.max(e),
            n: s.max(n),
        }
    }

    /// Parses `"w,s,e,n"`.
    pub fn parse(text: &str) -> Result<Self, CoordError> {
        let parts: Vec<f64> = text
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CoordError::InvalidBounds(text.to_string()))?;
        match parts.as_slice() {
            [w, s, e, n] => Ok(Self::new(*w, *s, *e, *n)),
            _ => Err(CoordError::InvalidBounds(text.to_string())),
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.e - self.w
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.n - self.s
    }

    /// True when the two boxes share interior area.
    ///
    /// Boxes that only touch along an edge do not intersect.
    #[inline]
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.w < other.e && other.w < self.e && self.s < other.n && other.s < self.n
    }

    pub fn intersection(&self, other: &GeoBounds) -> Option<GeoBounds> {
        if !self.intersects(other) {
            return None;
        }
        Some(GeoBounds {
            w: self.w.max(other.w),
            s: self.s.max(other.s),
            e: self.e.min(other.e),
            n: self.n.min(other.n),
        })
    }

    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        GeoBounds {
            w: self.w.min(other.w),
            s: self.s.min(other.s),
            e: self.e.max(other.e),
            n: self.n.max(other.n),
        }
    }

    /// Grows the box in place to cover `other`.
    pub fn expand(&mut self, other: &GeoBounds) {
        *self = self.union(other);
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        GeoBounds::WORLD
    }
}

impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.w, self.s, self.e, self.n)
    }
}

/// Fractional pixel position measured from the world's upper-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

/// Inclusive integer rectangle, used for both tile ranges and pixel extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    #[serde(rename = "minX")]
    pub min_x: i64,
    #[serde(rename = "minY")]
    pub min_y: i64,
    #[serde(rename = "maxX")]
    pub max_x: i64,
    #[serde(rename = "maxY")]
    pub max_y: i64,
}

impl GridRect {
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    #[inline]
    pub fn height(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Iterates every `(x, y)` cell, rows from `max_y` down to `min_y`.
    ///
    /// For a tile range this yields tiles north to south, west to east.
    pub fn cells(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (self.min_y..=self.max_y)
            .rev()
            .flat_map(move |y| (self.min_x..=self.max_x).map(move |x| (x, y)))
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid zoom level: {0} (must be between {min} and {max})", min = MIN_ZOOM, max = MAX_ZOOM)]
    InvalidZoom(u8),

    #[error("Tile {col},{row} is outside the grid at zoom {zoom}")]
    TileOutOfRange { col: u32, row: u32, zoom: u8 },

    #[error("Tile id {0} is beyond zoom {max}", max = MAX_ZOOM)]
    InvalidTileId(u64),

    #[error("Invalid tile size: {0} (must be a power of two)")]
    InvalidTileSize(u32),

    #[error("Invalid bounds: '{0}' (expected w,s,e,n)")]
    InvalidBounds(String),
}
