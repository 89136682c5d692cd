//! Request rendering.
//!
//! [`TileRenderer`] answers two kinds of request against a named pyramid:
//!
//! - **bounds**: a geographic box rendered at a pixel size or zoom. The
//!   tiles overlapping the box are mosaicked, cropped to the box and
//!   resampled to the requested size.
//! - **tile**: one tile of the pyramid's own grid, optionally masked by a
//!   second pyramid.
//!
//! A request outside the data is not an error; it renders a raster of the
//! requested size holding only nodata, flagged transparent.

mod mask;
mod mosaic;
mod renderer;

pub use mask::apply_mask;
pub use renderer::TileRenderer;

use thiserror::Error;

use crate::codec::CodecError;
use crate::coord::{CoordError, GeoBounds};
use crate::raster::Raster;
use crate::source::{AccessPolicy, CatalogError, SourceError};

/// Errors from rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Pyramid '{0}' not found")]
    DataNotFound(String),

    #[error("Access to pyramid '{name}' requires '{required}'")]
    AccessDenied { name: String, required: String },

    #[error("Tile {col},{row} not found in pyramid '{name}' at zoom {zoom}")]
    TileNotFound {
        name: String,
        zoom: u8,
        col: u32,
        row: u32,
    },

    #[error("Failed to read tile {col},{row} of pyramid '{name}' at zoom {zoom}: {source}")]
    Tile {
        name: String,
        zoom: u8,
        col: u32,
        row: u32,
        #[source]
        source: SourceError,
    },

    #[error("Failed to list tiles of pyramid '{name}' at zoom {zoom}: {source}")]
    Listing {
        name: String,
        zoom: u8,
        #[source]
        source: SourceError,
    },

    #[error("Invalid render request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Coord(#[from] CoordError),
}

impl From<CatalogError> for RenderError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(name) => RenderError::DataNotFound(name),
            CatalogError::AccessDenied { name, required } => {
                RenderError::AccessDenied { name, required }
            }
        }
    }
}

/// Output sizing for a bounds request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputSize {
    /// Exact output dimensions; the zoom is chosen to match.
    Pixels { width: usize, height: usize },
    /// Render at this zoom's native resolution.
    Zoom(u8),
}

/// Zoom of a tile request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TileZoom {
    Level(u8),
    /// Degrees per pixel; resolved to the matching zoom.
    Scale(f64),
}

/// A second pyramid whose pixels decide which output pixels survive.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskRequest {
    pub name: String,
    /// Threshold; `None` uses the renderer's configured default.
    pub max: Option<f64>,
}

impl MaskRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max: None,
        }
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

/// A bounds request.
///
/// # Example
///
/// ```
/// use tilepyramid::coord::GeoBounds;
/// use tilepyramid::render::{MaskRequest, RenderRequest};
///
/// let request = RenderRequest::by_size("elevation", GeoBounds::new(-10.0, 40.0, 5.0, 55.0), 256, 256)
///     .with_mask(MaskRequest::new("land").with_max(0.5));
/// assert_eq!(request.name, "elevation");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub name: String,
    pub bounds: GeoBounds,
    pub output: OutputSize,
    pub access: AccessPolicy,
    /// Output CRS; `None` uses the renderer's configured default.
    pub target_crs: Option<String>,
    pub mask: Option<MaskRequest>,
}

impl RenderRequest {
    pub fn by_size(name: impl Into<String>, bounds: GeoBounds, width: usize, height: usize) -> Self {
        Self::new(name, bounds, OutputSize::Pixels { width, height })
    }

    pub fn by_zoom(name: impl Into<String>, bounds: GeoBounds, zoom: u8) -> Self {
        Self::new(name, bounds, OutputSize::Zoom(zoom))
    }

    fn new(name: impl Into<String>, bounds: GeoBounds, output: OutputSize) -> Self {
        Self {
            name: name.into(),
            bounds,
            output,
            access: AccessPolicy::public(),
            target_crs: None,
            mask: None,
        }
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn with_target_crs(mut self, crs: impl Into<String>) -> Self {
        self.target_crs = Some(crs.into());
        self
    }

    pub fn with_mask(mut self, mask: MaskRequest) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// A rendered raster and how to present it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRaster {
    pub raster: Raster,
    /// True when nothing was read because the request fell outside the
    /// data; every pixel is nodata.
    pub is_transparent: bool,
    /// Zoom the pixels were read at
    pub zoom: u8,
    /// Per-band nodata of `raster`
    pub nodata: Vec<f64>,
}
