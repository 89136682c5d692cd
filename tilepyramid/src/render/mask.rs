//! Mask compositing.

use crate::raster::{is_nodata, Raster};

/// Blanks every pixel of `raster` the mask does not let through.
///
/// A pixel survives when at least one band of the mask pixel at the same
/// position is at most `max` and not that band's mask nodata. Otherwise
/// every band of the output pixel is set to `nodata`. Both rasters must be
/// the same size.
///
/// # Example
///
/// ```
/// use tilepyramid::raster::{Raster, TileType};
/// use tilepyramid::render::apply_mask;
///
/// let mut data = Raster::filled(2, 1, TileType::Double, &[5.0]);
/// let mask = Raster::from_data(2, 1, 1, TileType::Double, vec![0.0, 3.0]).unwrap();
///
/// apply_mask(&mut data, &[-1.0], &mask, &[-9999.0], 1.0);
/// assert_eq!(data.data(), &[5.0, -1.0]);
/// ```
pub fn apply_mask(raster: &mut Raster, nodata: &[f64], mask: &Raster, mask_nodata: &[f64], max: f64) {
    let width = raster.width().min(mask.width());
    let height = raster.height().min(mask.height());

    for y in 0..height {
        for x in 0..width {
            let keep = mask
                .pixel(x, y)
                .iter()
                .zip(mask_nodata)
                .any(|(v, nd)| *v <= max && !is_nodata(*v, *nd));
            if !keep {
                raster.set_pixel(x, y, nodata);
            }
        }
    }
}
