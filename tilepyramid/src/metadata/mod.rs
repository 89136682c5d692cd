//! Pyramid metadata.
//!
//! [`PyramidMetadata`] describes one dataset: its extent, tile size, band
//! layout, nodata values, pixel type and what is known about each zoom
//! level. It is persisted as JSON next to the tiles and loaded read-only by
//! every rendering session.
//!
//! # Format
//!
//! ```json
//! {
//!   "bounds": {"n": 90.0, "e": 180.0, "w": -180.0, "s": -90.0},
//!   "bands": 1,
//!   "defaultValues": ["NaN"],
//!   "tilesize": 512,
//!   "tileType": 5,
//!   "classification": "Continuous",
//!   "maxZoomLevel": 3,
//!   "tags": {},
//!   "imageMetadata": [{"stats": null, "pixelBounds": null, "tileBounds": null, "name": "0"}, ...]
//! }
//! ```
//!
//! Loading rejects unknown top-level fields but accepts the legacy
//! `{maxY, maxX, minX, minY}` bounds spelling and a per-level `image` in
//! place of `name`. Saving writes canonical names only.

mod document;
mod float_text;
mod types;

pub use types::{
    Classification, ImageLevelMetadata, Stats, StatsAccumulator, ZoomLevels,
};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::aggregate::Aggregator;
use crate::coord::{self, GeoBounds, GridRect};
use crate::raster::TileType;
use document::MetadataDocument;

/// Tile edge length in pixels when the document does not say.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Errors from loading or saving metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to parse pyramid metadata: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid pyramid metadata: {0}")]
    Invalid(String),

    #[error("Failed to access metadata file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Descriptor of one tile pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidMetadata {
    /// Dataset name, when recorded
    pub pyramid: Option<String>,
    /// Geographic extent of the data
    pub bounds: GeoBounds,
    /// Tile edge length in pixels; a power of two
    pub tile_size: u32,
    /// Number of bands per pixel
    pub bands: usize,
    /// Per-band nodata value, possibly NaN
    pub default_values: Vec<f64>,
    /// Pixel storage type
    pub tile_type: TileType,
    pub classification: Classification,
    /// Role required to read the pyramid; `None` or empty means public
    pub protection_level: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// Per-zoom entries, indexable by zoom
    pub levels: ZoomLevels,
    /// Dataset-wide per-band stats
    pub stats: Option<Vec<Stats>>,
    /// Aggregator the lower levels were built with
    pub resampling_method: Option<Aggregator>,
}

impl Default for PyramidMetadata {
    fn default() -> Self {
        Self {
            pyramid: None,
            bounds: GeoBounds::WORLD,
            tile_size: DEFAULT_TILE_SIZE,
            bands: 1,
            default_values: vec![f64::NAN],
            tile_type: TileType::default(),
            classification: Classification::default(),
            protection_level: None,
            tags: BTreeMap::new(),
            levels: ZoomLevels::default(),
            stats: None,
            resampling_method: None,
        }
    }
}

impl PyramidMetadata {
    /// Parses a metadata document.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Parse`] for malformed JSON or unknown
    /// top-level fields, and [`MetadataError::Invalid`] for documents that
    /// parse but are inconsistent.
    pub fn load(bytes: &[u8]) -> Result<Self, MetadataError> {
        let doc: MetadataDocument = serde_json::from_slice(bytes)?;
        PyramidMetadata::try_from(doc)
    }

    /// Serializes to the canonical document form.
    pub fn save(&self) -> Result<Vec<u8>, MetadataError> {
        Ok(serde_json::to_vec_pretty(&MetadataDocument::from(self))?)
    }

    /// Loads metadata from a file.
    pub fn load_from(path: &Path) -> Result<Self, MetadataError> {
        let bytes = fs::read(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(&bytes)
    }

    /// Writes metadata to a file, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), MetadataError> {
        let io_err = |source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.save()?).map_err(io_err)
    }

    #[inline]
    pub fn max_zoom_level(&self) -> u8 {
        self.levels.max_zoom()
    }

    /// Resizes the per-level entries to `zoom + 1`, keeping existing
    /// entries.
    pub fn set_max_zoom_level(&mut self, zoom: u8) {
        self.levels.resize(zoom);
    }

    pub fn level(&self, zoom: u8) -> Option<&ImageLevelMetadata> {
        self.levels.get(zoom)
    }

    /// Mutable level entry, growing the level list if `zoom` is past the end.
    pub fn level_mut(&mut self, zoom: u8) -> &mut ImageLevelMetadata {
        if zoom > self.levels.max_zoom() {
            self.levels.resize(zoom);
        }
        &mut self.levels[zoom]
    }

    /// Name of the tile set at `zoom`, if that level exists.
    pub fn name(&self, zoom: u8) -> Option<&str> {
        self.levels
            .get(zoom)
            .and_then(|l| l.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn set_name(&mut self, zoom: u8, name: impl Into<String>) {
        self.level_mut(zoom).name = Some(name.into());
    }

    /// True when more than one zoom level has been built.
    pub fn has_pyramids(&self) -> bool {
        self.levels.iter().filter(|(_, l)| l.is_populated()).count() > 1
    }

    /// Nodata value of `band` exactly as stored.
    pub fn default_value(&self, band: usize) -> Option<f64> {
        self.default_values.get(band).copied()
    }

    /// Nodata value of `band` truncated to an integer and limited to the
    /// tile type's range. NaN reads as 0.
    pub fn default_value_int(&self, band: usize) -> Option<i32> {
        self.default_value(band).map(|v| {
            let truncated = v.trunc();
            if self.tile_type.is_integer() {
                self.tile_type.coerce(truncated) as i32
            } else {
                truncated as i32
            }
        })
    }

    /// Per-band nodata values as they appear in this pyramid's tiles.
    pub fn nodata_values(&self) -> Vec<f64> {
        (0..self.bands)
            .map(|b| {
                let v = self.default_value(b).unwrap_or(f64::NAN);
                self.tile_type.coerce(v)
            })
            .collect()
    }

    pub fn is_categorical(&self) -> bool {
        self.classification == Classification::Categorical
    }

    /// Band 0 `(min, max)` at `zoom`, falling back to dataset-wide stats.
    pub fn extrema(&self, zoom: u8) -> Option<(f64, f64)> {
        self.levels
            .get(zoom)
            .and_then(|l| l.stats.as_ref())
            .or(self.stats.as_ref())
            .and_then(|stats| stats.first())
            .map(|s| (s.min, s.max))
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Tile range and pixel extent the dataset bounds cover at `zoom`.
    pub fn grid_bounds(&self, zoom: u8) -> (GridRect, GridRect) {
        let tiles = coord::bounds_to_tiles(&self.bounds, zoom);
        let ul = coord::lat_lon_to_pixels_ul(self.bounds.n, self.bounds.w, zoom, self.tile_size);
        let lr = coord::lat_lon_to_pixels_ul(self.bounds.s, self.bounds.e, zoom, self.tile_size);
        let width = ((lr.x - ul.x).ceil() as i64).max(1);
        let height = ((lr.y - ul.y).ceil() as i64).max(1);
        (tiles, GridRect::new(0, 0, width - 1, height - 1))
    }
}
