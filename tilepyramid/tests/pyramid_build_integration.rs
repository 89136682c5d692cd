//! Integration tests for pyramid construction.
//!
//! These tests build pyramids in memory and then read them back:
//! - Parent tiles from their four children
//! - Sparse pyramids
//! - Configuration errors that stop a build
//! - Metadata persistence after a build
//! - Rendering from built levels

use std::sync::Arc;

use tempfile::TempDir;
use tilepyramid::aggregate::Aggregator;
use tilepyramid::builder::{BuildError, DownsampleMode, PyramidBuilder};
use tilepyramid::codec::ImageCodec;
use tilepyramid::config::{BuildConfig, RenderConfig};
use tilepyramid::coord::{self, GeoBounds, TileCoord};
use tilepyramid::metadata::PyramidMetadata;
use tilepyramid::raster::{Raster, RasterBlock, TileType};
use tilepyramid::render::{TileRenderer, TileZoom};
use tilepyramid::source::{AccessPolicy, MemoryCatalog, MemoryTileStore, TileSource};

// =============================================================================
// Test Helpers
// =============================================================================

const ND: f64 = -9999.0;
const TILE: usize = 4;

fn metadata(bounds: GeoBounds, max_zoom: u8) -> PyramidMetadata {
    let mut metadata = PyramidMetadata {
        pyramid: Some("dem".to_string()),
        bounds,
        tile_size: TILE as u32,
        default_values: vec![ND],
        ..Default::default()
    };
    metadata.set_max_zoom_level(max_zoom);
    metadata
}

fn dem_tile(col: u32, row: u32) -> Raster {
    let data = (0..TILE * TILE)
        .map(|i| f64::from(col * 1000 + row * 100) + i as f64)
        .collect();
    Raster::from_data(TILE, TILE, 1, TileType::Double, data).unwrap()
}

/// Four zoom 3 tiles making up (4, 2) at zoom 2.
fn quad_store() -> MemoryTileStore {
    let store = MemoryTileStore::new();
    for col in 8..=9 {
        for row in 4..=5 {
            store
                .insert(TileCoord::new(col, row, 3), dem_tile(col, row))
                .unwrap();
        }
    }
    store
}

fn fetch(store: &MemoryTileStore, col: u32, row: u32, zoom: u8) -> Option<Raster> {
    let id = coord::tile_id(col, row, zoom).unwrap();
    store.fetch(id, zoom).ok().map(RasterBlock::into_owned)
}

fn build(
    store: &MemoryTileStore,
    metadata: &mut PyramidMetadata,
    aggregator: Aggregator,
    mode: DownsampleMode,
) -> Result<tilepyramid::builder::BuildSummary, BuildError> {
    let config = BuildConfig::new()
        .with_aggregator(aggregator)
        .with_downsample(mode);
    PyramidBuilder::new(config).build("dem", metadata, store, store)
}

// =============================================================================
// Building
// =============================================================================

#[test]
fn test_parent_built_from_four_children() {
    let store = quad_store();
    let mut metadata = metadata(GeoBounds::new(0.0, 0.0, 45.0, 45.0), 3);

    let summary = build(&store, &mut metadata, Aggregator::Mean, DownsampleMode::Quad).unwrap();

    assert_eq!(summary.tiles_written(), 3);
    let parent = fetch(&store, 4, 2, 2).unwrap();
    // upper-left from (8, 5), lower-right from (9, 4)
    assert_eq!(parent.get(0, 0, 0), 8502.5);
    assert_eq!(parent.get(3, 3, 0), 9412.5);
    assert!(fetch(&store, 2, 1, 1).is_some());
    assert!(fetch(&store, 1, 0, 0).is_some());
}

#[test]
fn test_sparse_pyramid_only_covers_data() {
    let store = MemoryTileStore::new();
    store.insert(TileCoord::new(0, 0, 3), dem_tile(0, 0)).unwrap();
    store.insert(TileCoord::new(15, 7, 3), dem_tile(15, 7)).unwrap();
    let mut metadata = metadata(GeoBounds::WORLD, 3);

    let summary = build(&store, &mut metadata, Aggregator::Max, DownsampleMode::Quad).unwrap();

    for zoom in 0..3 {
        let level = summary.level(zoom).unwrap();
        assert_eq!((level.written, level.skipped), (2, 0), "zoom {zoom}");
    }
    assert_eq!(store.ids_at(1).len(), 2);
    assert!(fetch(&store, 0, 0, 1).is_some());
    assert!(fetch(&store, 3, 1, 1).is_some());
    assert!(fetch(&store, 1, 0, 1).is_none());
}

#[test]
fn test_min_avg_pair_suppresses_lone_samples() {
    let store = MemoryTileStore::new();
    let mut data = vec![ND; TILE * TILE];
    data[..4].copy_from_slice(&[1.0, 3.0, ND, 5.0]);
    store
        .insert(
            TileCoord::new(0, 0, 1),
            Raster::from_data(TILE, TILE, 1, TileType::Double, data).unwrap(),
        )
        .unwrap();
    let mut metadata = metadata(GeoBounds::WORLD, 1);

    build(&store, &mut metadata, Aggregator::MinAvgPair, DownsampleMode::Quad).unwrap();

    // (0, 0) at zoom 1 fills the lower-left quarter of (0, 0) at zoom 0
    let parent = fetch(&store, 0, 0, 0).unwrap();
    assert_eq!(parent.get(0, 2, 0), 2.0);
    assert_eq!(parent.get(1, 2, 0), ND);
}

#[test]
fn test_weighted_min_avg_pair_is_a_configuration_error() {
    let store = quad_store();
    let mut metadata = metadata(GeoBounds::new(0.0, 0.0, 45.0, 45.0), 3);

    let err = build(
        &store,
        &mut metadata,
        Aggregator::MinAvgPair,
        DownsampleMode::Weighted,
    )
    .unwrap_err();

    assert!(matches!(err, BuildError::NotImplemented { .. }));
    assert!(err.to_string().contains("minavgpair"));
    assert_eq!(store.len(), 4);
}

// =============================================================================
// Metadata and Rendering After a Build
// =============================================================================

#[test]
fn test_built_metadata_survives_save_and_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("dem").join("metadata.json");
    let store = quad_store();
    let mut metadata = metadata(GeoBounds::new(0.0, 0.0, 45.0, 45.0), 3);
    build(&store, &mut metadata, Aggregator::Mean, DownsampleMode::Quad).unwrap();

    metadata.save_to(&path).unwrap();
    let loaded = PyramidMetadata::load_from(&path).unwrap();

    assert_eq!(loaded, metadata);
    assert!(loaded.has_pyramids());
    assert_eq!(loaded.resampling_method, Some(Aggregator::Mean));
    assert_eq!(loaded.extrema(3), Some((8400.0, 9515.0)));
}

#[test]
fn test_render_reads_built_levels() {
    let store = Arc::new(quad_store());
    let bounds = GeoBounds::new(0.0, 0.0, 45.0, 45.0);
    let mut metadata = metadata(bounds, 3);
    build(&store, &mut metadata, Aggregator::Mean, DownsampleMode::Quad).unwrap();
    let parent = fetch(&store, 4, 2, 2).unwrap();

    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register("dem", metadata, store);
    let renderer = TileRenderer::new(catalog, Arc::new(ImageCodec::new()), RenderConfig::default());

    let rendered = renderer
        .render_by_bounds("dem", &bounds, TILE, TILE, &AccessPolicy::public(), None)
        .unwrap();
    assert_eq!(rendered.zoom, 2);
    assert_eq!(rendered.raster, parent);

    let tile = renderer
        .render_by_tile("dem", 4, 2, TileZoom::Level(2), &AccessPolicy::public(), None)
        .unwrap();
    assert_eq!(tile.raster, parent);
}
