//! Integration tests for the tile renderer.
//!
//! These tests run whole requests through the public API:
//! - Bounds requests outside the data
//! - Mosaic consistency across tile boundaries
//! - Zoom resolution and clamping
//! - Mask compositing on bounds and tile requests
//! - Access control and missing data
//! - Tile encoding

use std::sync::Arc;

use tilepyramid::codec::{ImageCodec, ImageFormat};
use tilepyramid::config::RenderConfig;
use tilepyramid::coord::{self, GeoBounds, TileCoord};
use tilepyramid::metadata::PyramidMetadata;
use tilepyramid::raster::{Raster, TileType};
use tilepyramid::render::{
    MaskRequest, OutputSize, RenderError, RenderRequest, TileRenderer, TileZoom,
};
use tilepyramid::source::{AccessPolicy, MemoryCatalog, MemoryTileStore};

// =============================================================================
// Test Helpers
// =============================================================================

const ND: f64 = -9999.0;
const TILE: usize = 4;

/// Tiles (8..=9, 4..=5) at zoom 3 span 0..45 degrees in both directions.
fn data_bounds() -> GeoBounds {
    GeoBounds::new(0.0, 0.0, 45.0, 45.0)
}

fn metadata(bounds: GeoBounds, max_zoom: u8) -> PyramidMetadata {
    let mut metadata = PyramidMetadata {
        bounds,
        tile_size: TILE as u32,
        default_values: vec![ND],
        ..Default::default()
    };
    metadata.set_max_zoom_level(max_zoom);
    metadata.set_name(max_zoom, max_zoom.to_string());
    metadata
}

fn tile_with(f: impl Fn(usize, usize) -> f64) -> Raster {
    let data = (0..TILE * TILE).map(|i| f(i % TILE, i / TILE)).collect();
    Raster::from_data(TILE, TILE, 1, TileType::Double, data).unwrap()
}

/// Every pixel distinct: col * 1000 + row * 100 + pixel index.
fn dem_tile(col: u32, row: u32) -> Raster {
    tile_with(|x, y| f64::from(col * 1000 + row * 100) + (y * TILE + x) as f64)
}

/// Column 0 and 3 pass a 1.0 threshold; column 1 is too high and
/// column 2 is nodata.
fn mask_tile() -> Raster {
    tile_with(|x, _| [0.5, 2.0, ND, 1.0][x])
}

fn catalog() -> Arc<MemoryCatalog> {
    let dem = Arc::new(MemoryTileStore::new());
    for col in 8..=9 {
        for row in 4..=5 {
            dem.insert(TileCoord::new(col, row, 3), dem_tile(col, row))
                .unwrap();
        }
    }

    let mask = Arc::new(MemoryTileStore::new());
    mask.insert(TileCoord::new(8, 5, 3), mask_tile()).unwrap();

    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register("dem", metadata(data_bounds(), 3), dem);
    catalog.register("mask", metadata(data_bounds(), 3), mask);
    catalog
}

fn renderer(catalog: Arc<MemoryCatalog>) -> TileRenderer {
    TileRenderer::new(catalog, Arc::new(ImageCodec::new()), RenderConfig::default())
}

fn public() -> AccessPolicy {
    AccessPolicy::public()
}

// =============================================================================
// Bounds Requests
// =============================================================================

#[test]
fn test_request_outside_data_is_transparent() {
    let renderer = renderer(catalog());
    let bounds = GeoBounds::new(160.3125, -12.65625, 161.71875, -11.25);

    let rendered = renderer
        .render_by_bounds("dem", &bounds, 37, 21, &public(), None)
        .unwrap();

    assert!(rendered.is_transparent);
    assert_eq!(rendered.raster.width(), 37);
    assert_eq!(rendered.raster.height(), 21);
    assert!(rendered.raster.is_all_nodata(&[ND]));
}

#[test]
fn test_one_tile_matches_four_tile_mosaic() {
    let renderer = renderer(catalog());

    // (8, 5) is the north-west tile of the four
    let single = renderer
        .render_by_bounds(
            "dem",
            &GeoBounds::new(0.0, 22.5, 22.5, 45.0),
            TILE,
            TILE,
            &public(),
            None,
        )
        .unwrap();
    let four = renderer
        .render_by_bounds("dem", &data_bounds(), TILE * 2, TILE * 2, &public(), None)
        .unwrap();

    assert_eq!(single.zoom, 3);
    assert_eq!(four.zoom, 3);
    assert!(!single.is_transparent);
    for y in 0..TILE {
        for x in 0..TILE {
            assert_eq!(single.raster.get(x, y, 0), four.raster.get(x, y, 0));
        }
    }
    assert_eq!(single.raster, dem_tile(8, 5));
    // (9, 4) is the south-east tile
    assert_eq!(four.raster.get(TILE * 2 - 1, TILE * 2 - 1, 0), 9400.0 + 15.0);
}

#[test]
fn test_resampled_seam_matches_across_request_sizes() {
    let renderer = renderer(catalog());

    // 4.5 degree pixels are finer than zoom 3 but clamp to it, so both
    // requests resample the same source grid
    let single = renderer
        .render_by_bounds("dem", &GeoBounds::new(0.0, 22.5, 22.5, 45.0), 5, 5, &public(), None)
        .unwrap();
    let four = renderer
        .render_by_bounds("dem", &data_bounds(), 10, 10, &public(), None)
        .unwrap();

    assert_eq!(single.zoom, 3);
    assert_eq!(four.zoom, 3);
    for y in 0..5 {
        for x in 0..5 {
            let (a, b) = (single.raster.get(x, y, 0), four.raster.get(x, y, 0));
            assert!((a - b).abs() < 1e-9, "({x}, {y}): {a} != {b}");
        }
    }

    // the east column interpolates into (9, 5)
    let seam = single.raster.get(4, 0, 0);
    assert!((seam - (0.9 * 8503.0 + 0.1 * 9500.0)).abs() < 1e-6, "{seam}");
}

#[test]
fn test_unaligned_bounds_are_resampled_at_native_size() {
    let renderer = renderer(catalog());
    let res = coord::resolution(3, TILE as u32);

    // 3.5 pixels wide starting a quarter pixel into (8, 5): the covering
    // window is four whole pixels but sits a quarter pixel west
    let bounds = GeoBounds::new(0.25 * res, 22.5, 3.75 * res, 45.0);
    let rendered = renderer
        .render_by_bounds("dem", &bounds, TILE, TILE, &public(), None)
        .unwrap();

    assert_eq!(rendered.zoom, 3);
    let first = rendered.raster.get(0, 0, 0);
    assert_ne!(first, 8500.0);
    assert!(first > 8500.0 && first < 8501.0, "{first}");
}

#[test]
fn test_render_by_zoom_uses_native_resolution() {
    let renderer = renderer(catalog());

    let by_zoom = renderer
        .render(&RenderRequest::by_zoom("dem", data_bounds(), 3))
        .unwrap();
    let by_size = renderer
        .render_by_bounds("dem", &data_bounds(), TILE * 2, TILE * 2, &public(), None)
        .unwrap();

    assert_eq!(by_zoom.raster, by_size.raster);
}

#[test]
fn test_finer_pixels_than_stored_clamp_to_max_zoom() {
    let store = Arc::new(MemoryTileStore::new());
    // the tile holding lon 0.., lat 0.. at zoom 9
    store
        .insert(
            TileCoord::new(512, 256, 9),
            Raster::filled(TILE, TILE, TileType::Double, &[5.0]),
        )
        .unwrap();
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register("deep", metadata(GeoBounds::WORLD, 9), store);
    let renderer = renderer(catalog);

    // four pixels at zoom 12 resolution
    let size = coord::resolution(12, TILE as u32) * TILE as f64;
    let bounds = GeoBounds::new(0.0, 0.0, size, size);
    assert_eq!(
        coord::zoom_for_pixel_size(size / TILE as f64, TILE as u32),
        12
    );

    let rendered = renderer
        .render_by_bounds("deep", &bounds, TILE, TILE, &public(), None)
        .unwrap();

    assert_eq!(rendered.zoom, 9);
    assert!(!rendered.is_transparent);
    assert!(rendered.raster.data().iter().all(|v| *v == 5.0));
}

#[test]
fn test_missing_interior_tile_renders_as_nodata() {
    let store = Arc::new(MemoryTileStore::new());
    store.insert(TileCoord::new(8, 5, 3), dem_tile(8, 5)).unwrap();
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register("holes", metadata(data_bounds(), 3), store);
    let renderer = renderer(catalog);

    let rendered = renderer
        .render_by_bounds("holes", &data_bounds(), TILE * 2, TILE * 2, &public(), None)
        .unwrap();

    assert_eq!(rendered.raster.get(0, 0, 0), 8500.0);
    assert_eq!(rendered.raster.get(TILE, TILE, 0), ND);
}

#[test]
fn test_unsupported_target_crs_is_a_codec_error() {
    let renderer = renderer(catalog());
    let err = renderer
        .render_by_bounds("dem", &data_bounds(), 8, 8, &public(), Some("EPSG:3857"))
        .unwrap_err();
    assert!(matches!(err, RenderError::Codec(_)));
}

#[test]
fn test_empty_output_size_is_rejected() {
    let renderer = renderer(catalog());
    let mut request = RenderRequest::by_size("dem", data_bounds(), 8, 8);
    request.output = OutputSize::Pixels {
        width: 0,
        height: 8,
    };
    assert!(matches!(
        renderer.render(&request),
        Err(RenderError::InvalidRequest(_))
    ));
}

// =============================================================================
// Masks
// =============================================================================

fn assert_masked(raster: &Raster) {
    for y in 0..TILE {
        let row = |x: usize| raster.get(x, y, 0);
        let expected = dem_tile(8, 5);
        assert_eq!(row(0), expected.get(0, y, 0));
        assert_eq!(row(1), ND, "mask above threshold");
        assert_eq!(row(2), ND, "mask nodata");
        assert_eq!(row(3), expected.get(3, y, 0), "threshold is inclusive");
    }
}

#[test]
fn test_mask_on_tile_request() {
    let renderer = renderer(catalog());
    let mask = MaskRequest::new("mask").with_max(1.0);

    let rendered = renderer
        .render_by_tile("dem", 8, 5, TileZoom::Level(3), &public(), Some(&mask))
        .unwrap();

    assert!(!rendered.is_transparent);
    assert_masked(&rendered.raster);
}

#[test]
fn test_mask_on_bounds_request_uses_configured_threshold() {
    let renderer = renderer(catalog());
    let request = RenderRequest::by_size("dem", GeoBounds::new(0.0, 22.5, 22.5, 45.0), TILE, TILE)
        .with_mask(MaskRequest::new("mask"));

    let rendered = renderer.render(&request).unwrap();

    assert_eq!(renderer.config().mask_max(), 1.0);
    assert_masked(&rendered.raster);
}

#[test]
fn test_missing_mask_tile_blanks_the_tile() {
    let renderer = renderer(catalog());
    let mask = MaskRequest::new("mask");

    let rendered = renderer
        .render_by_tile("dem", 9, 5, TileZoom::Level(3), &public(), Some(&mask))
        .unwrap();

    assert!(rendered.is_transparent);
    assert!(rendered.raster.is_all_nodata(&[ND]));
}

#[test]
fn test_missing_primary_tile_under_mask_is_empty() {
    let renderer = renderer(catalog());
    let mask = MaskRequest::new("mask");

    let rendered = renderer
        .render_by_tile("dem", 0, 0, TileZoom::Level(3), &public(), Some(&mask))
        .unwrap();

    assert!(rendered.is_transparent);
    assert_eq!(rendered.raster.width(), TILE);
}

#[test]
fn test_unknown_mask_is_data_not_found() {
    let renderer = renderer(catalog());
    let request = RenderRequest::by_size("dem", data_bounds(), 8, 8)
        .with_mask(MaskRequest::new("no-such-mask"));

    match renderer.render(&request) {
        Err(RenderError::DataNotFound(name)) => assert_eq!(name, "no-such-mask"),
        other => panic!("unexpected result: {other:?}"),
    }
}

// =============================================================================
// Tile Requests
// =============================================================================

#[test]
fn test_tile_request_returns_stored_tile() {
    let renderer = renderer(catalog());

    let by_level = renderer
        .render_by_tile("dem", 9, 4, TileZoom::Level(3), &public(), None)
        .unwrap();
    let by_scale = renderer
        .render_by_tile("dem", 9, 4, TileZoom::Scale(5.625), &public(), None)
        .unwrap();

    assert_eq!(by_level.raster, dem_tile(9, 4));
    assert_eq!(by_scale.raster, by_level.raster);
}

#[test]
fn test_missing_tile_is_tile_not_found() {
    let renderer = renderer(catalog());

    let err = renderer
        .render_by_tile("dem", 0, 0, TileZoom::Level(3), &public(), None)
        .unwrap_err();

    match err {
        RenderError::TileNotFound {
            name,
            zoom,
            col,
            row,
        } => {
            assert_eq!(name, "dem");
            assert_eq!((zoom, col, row), (3, 0, 0));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_tile_outside_grid_is_rejected() {
    let renderer = renderer(catalog());
    let err = renderer
        .render_by_tile("dem", 16, 0, TileZoom::Level(3), &public(), None)
        .unwrap_err();
    assert!(matches!(err, RenderError::Coord(_)));
}

#[test]
fn test_unstored_zoom_is_rendered_from_max_zoom() {
    let renderer = renderer(catalog());

    // (16, 10) at zoom 4 is the south-west quarter of (8, 5) at zoom 3
    let rendered = renderer
        .render_by_tile("dem", 16, 10, TileZoom::Level(4), &public(), None)
        .unwrap();

    assert_eq!(rendered.zoom, 3);
    assert!(!rendered.is_transparent);
    // interior pixels only see the quarter's own four source pixels
    let source = [8508.0, 8509.0, 8512.0, 8513.0];
    for y in 1..=2 {
        for x in 1..=2 {
            let value = rendered.raster.get(x, y, 0);
            assert!((source[0]..=source[3]).contains(&value), "{value} out of range");
        }
    }
    // the bottom row blends with the top row of (8, 4)
    assert!(rendered.raster.get(1, TILE - 1, 0) < source[0]);
}

// =============================================================================
// Access Control
// =============================================================================

#[test]
fn test_protected_pyramid_requires_role() {
    let catalog = catalog();
    let mut protected = metadata(data_bounds(), 3);
    protected.protection_level = Some("analyst".to_string());
    catalog.register("secret", protected, Arc::new(MemoryTileStore::new()));
    let renderer = renderer(catalog);

    let err = renderer
        .render_by_bounds("secret", &data_bounds(), 8, 8, &public(), None)
        .unwrap_err();
    assert!(matches!(err, RenderError::AccessDenied { .. }));

    let analyst = AccessPolicy::public().with_role("ANALYST");
    assert!(renderer
        .render_by_bounds("secret", &data_bounds(), 8, 8, &analyst, None)
        .is_ok());
}

#[test]
fn test_unknown_pyramid_is_data_not_found() {
    let renderer = renderer(catalog());
    let err = renderer
        .render_by_bounds("nothing", &data_bounds(), 8, 8, &public(), None)
        .unwrap_err();
    assert!(matches!(err, RenderError::DataNotFound(name) if name == "nothing"));
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_missing_tile_encodes_as_empty_tile() {
    let renderer = renderer(catalog());

    let bytes = renderer
        .encode_tile("dem", 0, 0, TileZoom::Level(3), &public(), None, None)
        .unwrap();

    let image = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (TILE as u32, TILE as u32));
    assert!(image.pixels().all(|p| p[3] == 0));
}

#[test]
fn test_stored_tile_encodes_opaque() {
    let renderer = renderer(catalog());

    let bytes = renderer
        .encode_tile(
            "dem",
            8,
            5,
            TileZoom::Level(3),
            &public(),
            None,
            Some(ImageFormat::Png),
        )
        .unwrap();

    let image = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert!(image.pixels().all(|p| p[3] == 255));
}

#[test]
fn test_encoding_keeps_not_found_for_unknown_pyramid() {
    let renderer = renderer(catalog());
    let err = renderer
        .encode_tile("nothing", 0, 0, TileZoom::Level(3), &public(), None, None)
        .unwrap_err();
    assert!(matches!(err, RenderError::DataNotFound(_)));
}
