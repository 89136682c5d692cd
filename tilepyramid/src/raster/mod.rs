//! In-memory raster storage.
//!
//! A [`Raster`] is a pixel-interleaved grid of `f64` values tagged with the
//! [`TileType`] they represent. Every write is coerced to that type, so an
//! integer raster never holds a fractional or out-of-range value.
//!
//! [`RasterBlock`] pairs a tile-sized raster with its [`TileId`] and shares
//! the pixels behind an `Arc`. Blocks handed out by a tile source may alias
//! storage; take an owned copy with [`RasterBlock::into_owned`] before
//! writing.

mod sample;

pub use sample::{is_nodata, Sample, TileType};

use std::sync::Arc;

use thiserror::Error;

use crate::coord::TileId;

/// Errors from constructing rasters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    #[error("Raster data has {actual} values, expected {expected} ({width}x{height}x{bands})")]
    DataLength {
        expected: usize,
        actual: usize,
        width: usize,
        height: usize,
        bands: usize,
    },

    #[error("Raster must have at least one band")]
    NoBands,
}

/// A width × height × bands grid of pixel values.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: usize,
    tile_type: TileType,
    data: Vec<f64>,
}

impl Raster {
    /// Creates a raster with every band of every pixel set to `fill[band]`.
    pub fn filled(width: usize, height: usize, tile_type: TileType, fill: &[f64]) -> Self {
        let bands = fill.len().max(1);
        let pixel: Vec<f64> = if fill.is_empty() {
            vec![0.0]
        } else {
            fill.iter().map(|v| tile_type.coerce(*v)).collect()
        };
        let mut data = Vec::with_capacity(width * height * bands);
        for _ in 0..width * height {
            data.extend_from_slice(&pixel);
        }
        Self {
            width,
            height,
            bands,
            tile_type,
            data,
        }
    }

    /// Wraps pixel-interleaved `data`, coercing each value to `tile_type`.
    pub fn from_data(
        width: usize,
        height: usize,
        bands: usize,
        tile_type: TileType,
        mut data: Vec<f64>,
    ) -> Result<Self, RasterError> {
        if bands == 0 {
            return Err(RasterError::NoBands);
        }
        let expected = width * height * bands;
        if data.len() != expected {
            return Err(RasterError::DataLength {
                expected,
                actual: data.len(),
                width,
                height,
                bands,
            });
        }
        if tile_type != TileType::Double {
            data.iter_mut().for_each(|v| *v = tile_type.coerce(*v));
        }
        Ok(Self {
            width,
            height,
            bands,
            tile_type,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn bands(&self) -> usize {
        self.bands
    }

    #[inline]
    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    /// Raw pixel-interleaved values.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.bands
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, band: usize) -> f64 {
        self.data[self.offset(x, y) + band]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, band: usize, value: f64) {
        let idx = self.offset(x, y) + band;
        self.data[idx] = self.tile_type.coerce(value);
    }

    /// All bands of one pixel.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[f64] {
        let start = self.offset(x, y);
        &self.data[start..start + self.bands]
    }

    /// Overwrites every band of one pixel.
    pub fn set_pixel(&mut self, x: usize, y: usize, values: &[f64]) {
        for (band, value) in values.iter().take(self.bands).enumerate() {
            self.set(x, y, band, *value);
        }
    }

    /// True when every band of every pixel equals that band's nodata value.
    pub fn is_all_nodata(&self, nodata: &[f64]) -> bool {
        self.data
            .chunks_exact(self.bands)
            .all(|pixel| pixel_is_nodata(pixel, nodata))
    }

    /// Copies a `width × height` window whose upper-left corner is at
    /// `(x0, y0)` in this raster.
    ///
    /// The window may extend past the edges; cells outside are set to
    /// `nodata`.
    pub fn window(&self, x0: i64, y0: i64, width: usize, height: usize, nodata: &[f64]) -> Raster {
        let mut out = Raster::filled(width, height, self.tile_type, &band_fill(nodata, self.bands));
        out.blit(self, -x0, -y0);
        out
    }

    /// Copies `src` into this raster with its upper-left corner at
    /// `(dx, dy)`, clipping whatever falls outside.
    ///
    /// Both rasters must have the same band count.
    pub fn blit(&mut self, src: &Raster, dx: i64, dy: i64) {
        let bands = self.bands.min(src.bands);

        let x_start = dx.max(0);
        let y_start = dy.max(0);
        let x_end = (dx + src.width as i64).min(self.width as i64);
        let y_end = (dy + src.height as i64).min(self.height as i64);
        if x_start >= x_end || y_start >= y_end {
            return;
        }

        let run = (x_end - x_start) as usize;
        for y in y_start..y_end {
            let sy = (y - dy) as usize;
            let sx = (x_start - dx) as usize;
            if bands == self.bands && bands == src.bands && self.tile_type == src.tile_type {
                let dst_off = self.offset(x_start as usize, y as usize);
                let src_off = src.offset(sx, sy);
                self.data[dst_off..dst_off + run * bands]
                    .copy_from_slice(&src.data[src_off..src_off + run * bands]);
            } else {
                for i in 0..run {
                    for band in 0..bands {
                        let value = src.get(sx + i, sy, band);
                        self.set(x_start as usize + i, y as usize, band, value);
                    }
                }
            }
        }
    }
}

/// True when every band of `pixel` is nodata for that band.
#[inline]
pub fn pixel_is_nodata(pixel: &[f64], nodata: &[f64]) -> bool {
    pixel
        .iter()
        .zip(nodata.iter())
        .all(|(v, nd)| is_nodata(*v, *nd))
}

/// Pads or truncates per-band nodata to exactly `bands` entries; missing
/// bands get NaN.
pub(crate) fn band_fill(nodata: &[f64], bands: usize) -> Vec<f64> {
    (0..bands)
        .map(|b| nodata.get(b).copied().unwrap_or(f64::NAN))
        .collect()
}

/// One tile's worth of pixels, addressed by tile id.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBlock {
    id: TileId,
    raster: Arc<Raster>,
}

impl RasterBlock {
    pub fn new(id: TileId, raster: Raster) -> Self {
        Self {
            id,
            raster: Arc::new(raster),
        }
    }

    /// Wraps pixels already shared with someone else.
    pub fn shared(id: TileId, raster: Arc<Raster>) -> Self {
        Self { id, raster }
    }

    #[inline]
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Read-only view of the pixels.
    #[inline]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Takes the pixels, copying them if anyone else still holds them.
    pub fn into_owned(self) -> Raster {
        Arc::unwrap_or_clone(self.raster)
    }
}
