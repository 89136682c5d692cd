//! The request renderer.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::mask::apply_mask;
use super::mosaic::{self, PixelWindow};
use super::{MaskRequest, OutputSize, RenderError, RenderRequest, RenderedRaster, TileZoom};
use crate::codec::{is_geographic_crs, ImageFormat, RasterCodec, ResampleMode, ResampleRequest, DEFAULT_CRS};
use crate::config::RenderConfig;
use crate::coord::{self, GeoBounds};
use crate::metadata::PyramidMetadata;
use crate::raster::Raster;
use crate::source::{AccessPolicy, Pyramid, PyramidCatalog, SourceError};

/// Source pixels read beyond each edge of a window that gets resampled.
const RESAMPLE_MARGIN: i64 = 1;

/// Renders bounds and tile requests against the pyramids of a catalog.
///
/// Holds no per-request state; one renderer can serve any number of
/// concurrent requests. Each request works from the metadata snapshot the
/// catalog hands out when the pyramid is opened.
pub struct TileRenderer {
    catalog: Arc<dyn PyramidCatalog>,
    codec: Arc<dyn RasterCodec>,
    config: RenderConfig,
}

impl TileRenderer {
    pub fn new(
        catalog: Arc<dyn PyramidCatalog>,
        codec: Arc<dyn RasterCodec>,
        config: RenderConfig,
    ) -> Self {
        Self {
            catalog,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Renders a bounds request.
    ///
    /// # Errors
    ///
    /// [`RenderError::DataNotFound`] when the pyramid or mask pyramid does
    /// not exist, [`RenderError::AccessDenied`] when the request's access
    /// policy does not cover it, and read or codec failures. Bounds outside
    /// the data are not an error.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderedRaster, RenderError> {
        let pyramid = self.catalog.open(&request.name, &request.access)?;
        let target_crs = request
            .target_crs
            .as_deref()
            .unwrap_or(self.config.target_crs());

        let mut rendered = self.render_pyramid(&pyramid, &request.bounds, request.output, target_crs)?;

        if let Some(mask) = &request.mask {
            let mask_pyramid = self.catalog.open(&mask.name, &request.access)?;
            if !rendered.is_transparent {
                let size = OutputSize::Pixels {
                    width: rendered.raster.width(),
                    height: rendered.raster.height(),
                };
                let mask_raster = self.render_pyramid(&mask_pyramid, &request.bounds, size, target_crs)?;
                apply_mask(
                    &mut rendered.raster,
                    &rendered.nodata,
                    &mask_raster.raster,
                    &mask_raster.nodata,
                    mask.max.unwrap_or(self.config.mask_max()),
                );
            }
        }
        Ok(rendered)
    }

    /// Renders `bounds` of pyramid `name` at exactly `width × height`.
    pub fn render_by_bounds(
        &self,
        name: &str,
        bounds: &GeoBounds,
        width: usize,
        height: usize,
        access: &AccessPolicy,
        target_crs: Option<&str>,
    ) -> Result<RenderedRaster, RenderError> {
        let mut request =
            RenderRequest::by_size(name, *bounds, width, height).with_access(access.clone());
        request.target_crs = target_crs.map(str::to_string);
        self.render(&request)
    }

    /// Renders one tile of the pyramid's grid.
    ///
    /// Stored levels are read directly. A zoom the pyramid does not store
    /// is rendered from the nearest stored level through the bounds path.
    ///
    /// With a mask, a missing tile in either pyramid gives an empty
    /// transparent tile.
    ///
    /// # Errors
    ///
    /// [`RenderError::TileNotFound`] when there is no mask and the stored
    /// level has no tile at `col`, `row`.
    pub fn render_by_tile(
        &self,
        name: &str,
        col: u32,
        row: u32,
        zoom: TileZoom,
        access: &AccessPolicy,
        mask: Option<&MaskRequest>,
    ) -> Result<RenderedRaster, RenderError> {
        let pyramid = self.catalog.open(name, access)?;
        let metadata = pyramid.metadata();
        let tile_size = metadata.tile_size;
        let zoom = match zoom {
            TileZoom::Level(zoom) => zoom,
            TileZoom::Scale(scale) => coord::zoom_for_pixel_size(scale, tile_size),
        };
        coord::tile_id(col, row, zoom)?;

        let Some(mut rendered) = self.tile_raster(&pyramid, col, row, zoom, tile_size)? else {
            if mask.is_some() {
                debug!(pyramid = %name, zoom, col, row, "Tile missing under mask, rendering empty tile");
                return Ok(empty(metadata, tile_size as usize, tile_size as usize, zoom));
            }
            return Err(RenderError::TileNotFound {
                name: name.to_string(),
                zoom,
                col,
                row,
            });
        };

        if let Some(mask) = mask {
            let mask_pyramid = self.catalog.open(&mask.name, access)?;
            match self.tile_raster(&mask_pyramid, col, row, zoom, tile_size)? {
                Some(mask_tile) => apply_mask(
                    &mut rendered.raster,
                    &rendered.nodata,
                    &mask_tile.raster,
                    &mask_tile.nodata,
                    mask.max.unwrap_or(self.config.mask_max()),
                ),
                None => {
                    debug!(
                        pyramid = %name,
                        mask = %mask.name,
                        zoom,
                        col,
                        row,
                        "Mask tile missing, rendering empty tile"
                    );
                    return Ok(empty(metadata, tile_size as usize, tile_size as usize, zoom));
                }
            }
        }
        Ok(rendered)
    }

    /// Renders one tile and encodes it.
    ///
    /// A missing tile encodes as an empty tile of the pyramid's tile size
    /// rather than failing. `format` defaults to the configured one.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_tile(
        &self,
        name: &str,
        col: u32,
        row: u32,
        zoom: TileZoom,
        access: &AccessPolicy,
        mask: Option<&MaskRequest>,
        format: Option<ImageFormat>,
    ) -> Result<Vec<u8>, RenderError> {
        let format = format.unwrap_or(self.config.format());
        let rendered = match self.render_by_tile(name, col, row, zoom, access, mask) {
            Ok(rendered) => rendered,
            Err(RenderError::TileNotFound { zoom, .. }) => {
                debug!(pyramid = %name, zoom, col, row, "Encoding empty tile");
                let pyramid = self.catalog.open(name, access)?;
                let size = pyramid.metadata().tile_size as usize;
                empty(pyramid.metadata(), size, size, zoom)
            }
            Err(e) => return Err(e),
        };
        self.encode(&rendered, format)
    }

    /// Encodes a rendered raster with the renderer's codec.
    pub fn encode(&self, rendered: &RenderedRaster, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
        Ok(self.codec.encode(&rendered.raster, format, &rendered.nodata)?)
    }

    /// The bounds path for one opened pyramid, without masking.
    fn render_pyramid(
        &self,
        pyramid: &Pyramid,
        bounds: &GeoBounds,
        output: OutputSize,
        target_crs: &str,
    ) -> Result<RenderedRaster, RenderError> {
        let metadata = pyramid.metadata();
        let tile_size = metadata.tile_size;
        let max_zoom = metadata.max_zoom_level();

        let (width, height, zoom) = match output {
            OutputSize::Pixels { width, height } => {
                if width == 0 || height == 0 {
                    return Err(RenderError::InvalidRequest(format!(
                        "output size {width}x{height} is empty"
                    )));
                }
                let zoom_x = coord::zoom_for_pixel_size(bounds.width() / width as f64, tile_size);
                let zoom_y = coord::zoom_for_pixel_size(bounds.height() / height as f64, tile_size);
                (width, height, zoom_x.max(zoom_y).min(max_zoom))
            }
            OutputSize::Zoom(zoom) => {
                let zoom = zoom.min(max_zoom);
                let res = coord::resolution(zoom, tile_size);
                let width = ((bounds.width() / res).round() as usize).max(1);
                let height = ((bounds.height() / res).round() as usize).max(1);
                (width, height, zoom)
            }
        };

        if !bounds.intersects(&metadata.bounds) {
            debug!(pyramid = %pyramid.name(), %bounds, "Request outside pyramid bounds");
            return Ok(empty(metadata, width, height, zoom));
        }

        let mut read_zoom = zoom;
        if metadata.name(zoom).is_none() {
            if !metadata.has_pyramids() {
                warn!(pyramid = %pyramid.name(), zoom, "Requested zoom level does not exist");
                return Ok(empty(metadata, width, height, zoom));
            }
            warn!(
                pyramid = %pyramid.name(),
                zoom,
                max_zoom,
                "Zoom level missing, reading max zoom instead"
            );
            read_zoom = max_zoom;
        }

        let nodata = metadata.nodata_values();
        let (native, aligned) = PixelWindow::covering(bounds, read_zoom, tile_size);
        let direct = aligned
            && native.width() == width
            && native.height() == height
            && is_geographic_crs(target_crs);
        // interpolation near the edges needs the pixels just outside them
        let window = if direct {
            native
        } else {
            native.padded(RESAMPLE_MARGIN)
        };
        let extent = window.extent(read_zoom, tile_size);

        let mosaic = mosaic::assemble(pyramid, &extent, read_zoom)?;
        let cropped = mosaic::crop(&mosaic, &window, &nodata);

        let raster = if direct {
            cropped
        } else {
            let mode = if metadata.is_categorical() {
                ResampleMode::Nearest
            } else {
                ResampleMode::Bilinear
            };
            debug!(
                pyramid = %pyramid.name(),
                from_width = cropped.width(),
                from_height = cropped.height(),
                width,
                height,
                ?mode,
                "Resampling"
            );
            self.codec.resample(&ResampleRequest {
                raster: &cropped,
                src_bounds: extent,
                src_crs: DEFAULT_CRS,
                dst_bounds: *bounds,
                dst_crs: target_crs,
                width,
                height,
                mode,
                nodata: &nodata,
            })?
        };

        info!(
            pyramid = %pyramid.name(),
            zoom = read_zoom,
            width,
            height,
            "Rendered"
        );
        Ok(RenderedRaster {
            raster,
            is_transparent: false,
            zoom: read_zoom,
            nodata,
        })
    }

    /// One tile at `size × size`, read directly when the pyramid stores
    /// that level at that size and rendered from bounds otherwise.
    ///
    /// `None` when a stored level has no tile there.
    fn tile_raster(
        &self,
        pyramid: &Pyramid,
        col: u32,
        row: u32,
        zoom: u8,
        size: u32,
    ) -> Result<Option<RenderedRaster>, RenderError> {
        let metadata = pyramid.metadata();
        if metadata.tile_size != size || metadata.name(zoom).is_none() {
            let bounds = coord::tile_bounds(col, row, zoom, size);
            let output = OutputSize::Pixels {
                width: size as usize,
                height: size as usize,
            };
            return self.render_pyramid(pyramid, &bounds, output, DEFAULT_CRS).map(Some);
        }

        let id = coord::tile_id(col, row, zoom)?;
        match pyramid.source().fetch(id, zoom) {
            Ok(block) => Ok(Some(RenderedRaster {
                raster: block.into_owned(),
                is_transparent: false,
                zoom,
                nodata: metadata.nodata_values(),
            })),
            Err(SourceError::NotFound { .. }) => Ok(None),
            Err(source) => Err(RenderError::Tile {
                name: pyramid.name().to_string(),
                zoom,
                col,
                row,
                source,
            }),
        }
    }
}

/// A transparent raster holding only the pyramid's nodata.
fn empty(metadata: &PyramidMetadata, width: usize, height: usize, zoom: u8) -> RenderedRaster {
    let nodata = metadata.nodata_values();
    RenderedRaster {
        raster: Raster::filled(width, height, metadata.tile_type, &nodata),
        is_transparent: true,
        zoom,
        nodata,
    }
}
