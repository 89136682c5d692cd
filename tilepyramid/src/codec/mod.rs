//! Resampling and encoding of rendered rasters.
//!
//! [`RasterCodec`] is the seam between rendering and pixel-format or
//! projection work. [`ImageCodec`] implements it for geographic
//! coordinates using the `image` crate for encoding.

mod image_codec;

pub use image_codec::ImageCodec;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::aggregate::AggregateError;
use crate::coord::GeoBounds;
use crate::raster::{Raster, RasterError};

/// Coordinate reference system assumed when none is given.
pub const DEFAULT_CRS: &str = "EPSG:4326";

/// Errors from resampling or encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid output size {width}x{height}")]
    InvalidSize { width: usize, height: usize },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Interpolation used when resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResampleMode {
    /// Copy the closest source pixel; required for categorical data.
    Nearest,
    /// Blend the four surrounding source pixels.
    #[default]
    Bilinear,
}

/// Output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Tiff,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Tiff => "image/tiff",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Tiff => "tif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.trim_start_matches("image/") {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "tif" | "tiff" | "geotiff" => Ok(ImageFormat::Tiff),
            _ => Err(CodecError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Everything a codec needs to resample one raster.
#[derive(Debug, Clone, Copy)]
pub struct ResampleRequest<'a> {
    pub raster: &'a Raster,
    /// Extent covered by `raster`
    pub src_bounds: GeoBounds,
    pub src_crs: &'a str,
    /// Extent the output should cover
    pub dst_bounds: GeoBounds,
    pub dst_crs: &'a str,
    pub width: usize,
    pub height: usize,
    pub mode: ResampleMode,
    /// Per-band nodata of `raster`
    pub nodata: &'a [f64],
}

/// Projection and pixel-format collaborator used by the renderer.
pub trait RasterCodec: Send + Sync {
    /// Resamples (and reprojects, if the CRS differ) to the requested size.
    fn resample(&self, request: &ResampleRequest<'_>) -> Result<Raster, CodecError>;

    /// Encodes a raster; pixels equal to `nodata` become transparent where
    /// the format allows.
    fn encode(&self, raster: &Raster, format: ImageFormat, nodata: &[f64]) -> Result<Vec<u8>, CodecError>;
}

/// True for the codes that name plain longitude/latitude on WGS84.
pub fn is_geographic_crs(code: &str) -> bool {
    matches!(
        code.trim().to_ascii_uppercase().as_str(),
        "EPSG:4326" | "4326" | "WGS84" | "CRS:84" | "OGC:CRS84"
    )
}
