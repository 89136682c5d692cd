//! Geographic resampling and `image`-crate encoding.

use std::io::Cursor;

use image::{DynamicImage, Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use super::{is_geographic_crs, CodecError, ImageFormat, RasterCodec, ResampleMode, ResampleRequest};
use crate::aggregate::Aggregator;
use crate::raster::{band_fill, pixel_is_nodata, Raster, TileType};

/// Snaps source positions this close to a pixel centre onto it.
const CENTRE_EPSILON: f64 = 1e-9;

/// [`RasterCodec`] for longitude/latitude rasters.
///
/// Resampling maps each output pixel centre into the source grid and
/// interpolates with [`Aggregator::Nearest`] or [`Aggregator::Mean`]'s
/// weighted form. Source pixels outside the raster count as nodata.
/// Any CRS other than WGS84 geographic is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl RasterCodec for ImageCodec {
    fn resample(&self, request: &ResampleRequest<'_>) -> Result<Raster, CodecError> {
        let (width, height) = (request.width, request.height);
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidSize { width, height });
        }
        for crs in [request.src_crs, request.dst_crs] {
            if !is_geographic_crs(crs) {
                return Err(CodecError::UnsupportedCrs(crs.to_string()));
            }
        }

        let src = request.raster;
        let tile_type = src.tile_type();
        let bands = src.bands();
        let nodata: Vec<f64> = band_fill(request.nodata, bands)
            .into_iter()
            .map(|v| tile_type.coerce(v))
            .collect();
        let aggregator = match request.mode {
            ResampleMode::Nearest => Aggregator::Nearest,
            ResampleMode::Bilinear => Aggregator::Mean,
        };

        let sb = request.src_bounds;
        let db = request.dst_bounds;
        let src_res_x = sb.width() / src.width() as f64;
        let src_res_y = sb.height() / src.height() as f64;
        let dst_res_x = db.width() / width as f64;
        let dst_res_y = db.height() / height as f64;

        debug!(
            src_width = src.width(),
            src_height = src.height(),
            width,
            height,
            mode = ?request.mode,
            "Resampling raster"
        );

        let rows: Vec<Vec<f64>> = (0..height)
            .into_par_iter()
            .map(|y| -> Result<Vec<f64>, CodecError> {
                let lat = db.n - (y as f64 + 0.5) * dst_res_y;
                let mut row = Vec::with_capacity(width * bands);
                for x in 0..width {
                    let lon = db.w + (x as f64 + 0.5) * dst_res_x;
                    if lon < sb.w || lon > sb.e || lat < sb.s || lat > sb.n {
                        row.extend_from_slice(&nodata);
                        continue;
                    }
                    let sx = snap((lon - sb.w) / src_res_x - 0.5);
                    let sy = snap((sb.n - lat) / src_res_y - 0.5);
                    let (x0, y0) = (sx.floor(), sy.floor());
                    let (wx, wy) = (sx - x0, sy - y0);
                    let (x0, y0) = (x0 as i64, y0 as i64);

                    for (band, nd) in nodata.iter().enumerate() {
                        let cell = |dx: i64, dy: i64| sample(src, x0 + dx, y0 + dy, band, *nd);
                        let neighborhood = [[cell(0, 0), cell(1, 0)], [cell(0, 1), cell(1, 1)]];
                        row.push(aggregator.aggregate_weighted_as(
                            tile_type,
                            &neighborhood,
                            wx,
                            wy,
                            *nd,
                        )?);
                    }
                }
                Ok(row)
            })
            .collect::<Result<_, CodecError>>()?;

        Ok(Raster::from_data(width, height, bands, tile_type, rows.concat())?)
    }

    fn encode(&self, raster: &Raster, format: ImageFormat, nodata: &[f64]) -> Result<Vec<u8>, CodecError> {
        let rgba = to_rgba(raster, nodata);
        let mut buffer = Cursor::new(Vec::new());
        match format {
            ImageFormat::Png => rgba.write_to(&mut buffer, image::ImageFormat::Png)?,
            ImageFormat::Tiff => rgba.write_to(&mut buffer, image::ImageFormat::Tiff)?,
            ImageFormat::Jpeg => DynamicImage::ImageRgba8(rgba)
                .to_rgb8()
                .write_to(&mut buffer, image::ImageFormat::Jpeg)?,
        }
        Ok(buffer.into_inner())
    }
}

#[inline]
fn snap(position: f64) -> f64 {
    let nearest = position.round();
    if (position - nearest).abs() < CENTRE_EPSILON {
        nearest
    } else {
        position
    }
}

#[inline]
fn sample(src: &Raster, x: i64, y: i64, band: usize, nodata: f64) -> f64 {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        nodata
    } else {
        src.get(x as usize, y as usize, band)
    }
}

/// Per-band value range mapped onto 0..=255.
fn band_ranges(raster: &Raster, nodata: &[f64]) -> Vec<(f64, f64)> {
    let bands = raster.bands();
    if raster.tile_type() == TileType::Byte {
        return vec![(0.0, 255.0); bands];
    }
    let nodata = band_fill(nodata, bands);
    let mut ranges = vec![(f64::INFINITY, f64::NEG_INFINITY); bands];
    for pixel in raster.data().chunks_exact(bands) {
        for (band, v) in pixel.iter().enumerate() {
            if v.is_finite() && !crate::raster::is_nodata(*v, nodata[band]) {
                let (lo, hi) = &mut ranges[band];
                *lo = lo.min(*v);
                *hi = hi.max(*v);
            }
        }
    }
    ranges
}

#[inline]
fn to_byte(value: f64, (lo, hi): (f64, f64)) -> u8 {
    if !value.is_finite() || lo > hi {
        return 0;
    }
    if hi == lo {
        return 255;
    }
    ((value - lo) / (hi - lo) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Converts to 8-bit RGBA.
///
/// One or two bands render as grey from band 0, three as RGB. With fewer
/// than four bands, pixels whose every band is nodata get alpha 0. A
/// fourth band is used as alpha directly.
fn to_rgba(raster: &Raster, nodata: &[f64]) -> RgbaImage {
    let ranges = band_ranges(raster, nodata);
    let nodata = band_fill(nodata, raster.bands());

    RgbaImage::from_fn(raster.width() as u32, raster.height() as u32, |x, y| {
        let pixel = raster.pixel(x as usize, y as usize);
        let channel = |band: usize| to_byte(pixel[band], ranges[band]);
        match pixel.len() {
            0 => Rgba([0, 0, 0, 0]),
            1 | 2 => {
                let alpha = if pixel_is_nodata(pixel, &nodata) { 0 } else { 255 };
                let grey = channel(0);
                Rgba([grey, grey, grey, alpha])
            }
            3 => {
                let alpha = if pixel_is_nodata(pixel, &nodata) { 0 } else { 255 };
                Rgba([channel(0), channel(1), channel(2), alpha])
            }
            _ => {
                let alpha = pixel[3].round().clamp(0.0, 255.0) as u8;
                Rgba([channel(0), channel(1), channel(2), alpha])
            }
        }
    })
}
