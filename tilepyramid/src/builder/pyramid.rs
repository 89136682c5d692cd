//! Level-by-level pyramid construction.

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::{debug, info};

use super::{BuildError, DownsampleMode};
use crate::aggregate::Aggregator;
use crate::config::BuildConfig;
use crate::coord::{self, TileCoord, TileId};
use crate::metadata::{PyramidMetadata, Stats, StatsAccumulator};
use crate::raster::{is_nodata, Raster, RasterBlock, TileType};
use crate::source::{SourceError, TileSink, TileSource};

/// Tiles written and skipped at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSummary {
    pub zoom: u8,
    pub written: usize,
    /// Parents whose children held no valid pixels
    pub skipped: usize,
}

/// Outcome of a build, deepest level first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub levels: Vec<LevelSummary>,
}

impl BuildSummary {
    pub fn level(&self, zoom: u8) -> Option<&LevelSummary> {
        self.levels.iter().find(|l| l.zoom == zoom)
    }

    pub fn tiles_written(&self) -> usize {
        self.levels.iter().map(|l| l.written).sum()
    }

    pub fn tiles_skipped(&self) -> usize {
        self.levels.iter().map(|l| l.skipped).sum()
    }
}

/// Builds the lower zoom levels of a pyramid from its base level.
///
/// # Example
///
/// ```
/// use tilepyramid::aggregate::Aggregator;
/// use tilepyramid::builder::PyramidBuilder;
/// use tilepyramid::config::BuildConfig;
/// use tilepyramid::coord::TileCoord;
/// use tilepyramid::metadata::PyramidMetadata;
/// use tilepyramid::raster::{Raster, TileType};
/// use tilepyramid::source::MemoryTileStore;
///
/// let mut metadata = PyramidMetadata { tile_size: 4, ..Default::default() };
/// metadata.set_max_zoom_level(1);
///
/// let store = MemoryTileStore::new();
/// store
///     .insert(TileCoord::new(0, 0, 1), Raster::filled(4, 4, TileType::Double, &[1.0]))
///     .unwrap();
///
/// let builder = PyramidBuilder::new(BuildConfig::new().with_aggregator(Aggregator::Min));
/// let summary = builder.build("example", &mut metadata, &store, &store).unwrap();
/// assert_eq!(summary.tiles_written(), 1);
/// assert!(metadata.has_pyramids());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PyramidBuilder {
    config: BuildConfig,
}

impl PyramidBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds zoom levels `max_zoom - 1` down to 0.
    ///
    /// Reads base tiles from `source`, writes parents to `sink` and records
    /// per-level names, bounds and stats in `metadata`. The base level's
    /// stats and bounds are filled in when absent. Tiles written at one
    /// level are read back through `source` for the next, so both usually
    /// refer to the same store.
    ///
    /// # Errors
    ///
    /// [`BuildError::NotImplemented`] before anything is written when the
    /// downsample mode needs a weighted aggregator the configuration lacks.
    /// Any tile read or write failure other than a missing tile stops the
    /// build.
    pub fn build(
        &self,
        name: &str,
        metadata: &mut PyramidMetadata,
        source: &dyn TileSource,
        sink: &dyn TileSink,
    ) -> Result<BuildSummary, BuildError> {
        let aggregator = self.config.aggregator();
        let mode = self.config.downsample();

        if mode == DownsampleMode::Weighted && !aggregator.supports_weighted() {
            return Err(BuildError::NotImplemented {
                pyramid: name.to_string(),
                aggregator,
            });
        }

        let tile_size = metadata.tile_size as usize;
        if tile_size < 2 {
            return Err(BuildError::TileShape {
                pyramid: name.to_string(),
                zoom: metadata.max_zoom_level(),
                col: 0,
                row: 0,
                width: tile_size,
                height: tile_size,
                expected: 2,
            });
        }

        let max_zoom = metadata.max_zoom_level();
        let nodata = metadata.nodata_values();
        info!(
            pyramid = %name,
            max_zoom,
            aggregator = %aggregator,
            mode = %mode,
            "Building pyramid"
        );

        self.describe_base_level(name, metadata, source, &nodata)?;

        let mut summary = BuildSummary::default();
        for zoom in (0..max_zoom).rev() {
            let level = LevelBuild {
                pyramid: name,
                zoom,
                tile_size,
                tile_type: metadata.tile_type,
                nodata: &nodata,
                aggregator,
                mode,
                source,
                sink,
            };

            let parents = level.parents(metadata)?;
            let considered = parents.len();
            let outcomes = parents
                .into_par_iter()
                .map(|(row, col)| level.build_tile(col, row))
                .collect::<Result<Vec<_>, BuildError>>()?;

            let mut written = 0;
            let mut stats = vec![StatsAccumulator::default(); nodata.len()];
            for tile_stats in outcomes.into_iter().flatten() {
                written += 1;
                stats = merge_stats(stats, tile_stats);
            }
            let skipped = considered - written;

            let (tile_bounds, pixel_bounds) = metadata.grid_bounds(zoom);
            let entry = metadata.level_mut(zoom);
            entry.name = Some(zoom.to_string());
            entry.tile_bounds = Some(tile_bounds);
            entry.pixel_bounds = Some(pixel_bounds);
            entry.stats = Some(stats.iter().map(StatsAccumulator::finish).collect());

            info!(pyramid = %name, zoom, written, skipped, "Built pyramid level");
            summary.levels.push(LevelSummary {
                zoom,
                written,
                skipped,
            });
        }

        metadata.stats = metadata.level(max_zoom).and_then(|l| l.stats.clone());
        metadata.resampling_method = Some(aggregator);

        info!(
            pyramid = %name,
            tiles = summary.tiles_written(),
            skipped = summary.tiles_skipped(),
            "Pyramid built"
        );
        Ok(summary)
    }

    /// Names the base level and computes its stats and bounds if missing.
    fn describe_base_level(
        &self,
        name: &str,
        metadata: &mut PyramidMetadata,
        source: &dyn TileSource,
        nodata: &[f64],
    ) -> Result<(), BuildError> {
        let zoom = metadata.max_zoom_level();
        let (tile_bounds, pixel_bounds) = metadata.grid_bounds(zoom);

        let needs_stats = metadata.level(zoom).map_or(true, |l| l.stats.is_none());
        let stats: Option<Vec<Stats>> = if needs_stats {
            let ids = source
                .list_overlapping(&metadata.bounds, zoom)
                .map_err(|source| BuildError::Listing {
                    pyramid: name.to_string(),
                    zoom,
                    source,
                })?;
            debug!(pyramid = %name, zoom, tiles = ids.len(), "Scanning base level");

            let per_tile = ids
                .into_par_iter()
                .map(|id| match source.fetch(id, zoom) {
                    Ok(block) => Ok(Some(tile_stats(block.raster(), nodata))),
                    Err(SourceError::NotFound { .. }) => Ok(None),
                    Err(e) => Err(tile_error(name, zoom, id, e)),
                })
                .collect::<Result<Vec<_>, BuildError>>()?;

            let merged = per_tile
                .into_iter()
                .flatten()
                .fold(vec![StatsAccumulator::default(); nodata.len()], merge_stats);
            Some(merged.iter().map(StatsAccumulator::finish).collect())
        } else {
            None
        };

        let entry = metadata.level_mut(zoom);
        if !entry.is_populated() {
            entry.name = Some(zoom.to_string());
        }
        entry.tile_bounds.get_or_insert(tile_bounds);
        entry.pixel_bounds.get_or_insert(pixel_bounds);
        if stats.is_some() {
            entry.stats = stats;
        }
        Ok(())
    }
}

/// Everything needed to build the tiles of one level.
struct LevelBuild<'a> {
    pyramid: &'a str,
    zoom: u8,
    tile_size: usize,
    tile_type: TileType,
    nodata: &'a [f64],
    aggregator: Aggregator,
    mode: DownsampleMode,
    source: &'a dyn TileSource,
    sink: &'a dyn TileSink,
}

impl LevelBuild<'_> {
    /// Parent `(row, col)` positions with at least one child tile.
    fn parents(&self, metadata: &PyramidMetadata) -> Result<Vec<(u32, u32)>, BuildError> {
        let child_zoom = self.zoom + 1;
        let children = self
            .source
            .list_overlapping(&metadata.bounds, child_zoom)
            .map_err(|source| BuildError::Listing {
                pyramid: self.pyramid.to_string(),
                zoom: child_zoom,
                source,
            })?;

        let mut parents = BTreeSet::new();
        for id in children {
            let child = coord::tile_from_id(id).map_err(|e| BuildError::Listing {
                pyramid: self.pyramid.to_string(),
                zoom: child_zoom,
                source: e.into(),
            })?;
            if let Some(parent) = child.parent() {
                parents.insert((parent.row, parent.col));
            }
        }
        Ok(parents.into_iter().collect())
    }

    /// Aggregates one parent tile and stores it.
    ///
    /// Returns the tile's stats, or `None` when the result held only nodata
    /// and nothing was written.
    fn build_tile(&self, col: u32, row: u32) -> Result<Option<Vec<StatsAccumulator>>, BuildError> {
        let parent = TileCoord::new(col, row, self.zoom);
        let position_error = |source: SourceError| BuildError::Source {
            pyramid: self.pyramid.to_string(),
            zoom: self.zoom,
            col,
            row,
            source,
        };
        let id = coord::tile_id(col, row, self.zoom).map_err(|e| position_error(e.into()))?;

        let children = parent
            .children()
            .iter()
            .map(|child| self.fetch_child(child))
            .collect::<Result<Vec<_>, _>>()?;

        if children.iter().all(Option::is_none) {
            debug!(pyramid = %self.pyramid, tile = %parent, "No children, skipping");
            return Ok(None);
        }

        let raster = self.reduce(&children, parent)?;
        if raster.is_all_nodata(self.nodata) {
            debug!(pyramid = %self.pyramid, tile = %parent, "All nodata, skipping");
            return Ok(None);
        }

        let stats = tile_stats(&raster, self.nodata);
        self.sink
            .store(self.zoom, RasterBlock::new(id, raster))
            .map_err(position_error)?;
        Ok(Some(stats))
    }

    fn fetch_child(&self, child: &TileCoord) -> Result<Option<RasterBlock>, BuildError> {
        let position_error = |source: SourceError| BuildError::Source {
            pyramid: self.pyramid.to_string(),
            zoom: child.zoom,
            col: child.col,
            row: child.row,
            source,
        };

        let id = coord::tile_id(child.col, child.row, child.zoom)
            .map_err(|e| position_error(e.into()))?;
        let block = match self.source.fetch(id, child.zoom) {
            Ok(block) => block,
            Err(SourceError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(position_error(e)),
        };

        let raster = block.raster();
        if raster.width() != self.tile_size
            || raster.height() != self.tile_size
            || raster.bands() < self.nodata.len()
        {
            return Err(BuildError::TileShape {
                pyramid: self.pyramid.to_string(),
                zoom: child.zoom,
                col: child.col,
                row: child.row,
                width: raster.width(),
                height: raster.height(),
                expected: self.tile_size,
            });
        }
        Ok(Some(block))
    }

    /// Reduces the four children, ordered upper-left, upper-right,
    /// lower-left, lower-right, into one parent raster.
    fn reduce(&self, children: &[Option<RasterBlock>], parent: TileCoord) -> Result<Raster, BuildError> {
        let size = self.tile_size;
        let half = size / 2;
        let mut out = Raster::filled(size, size, self.tile_type, self.nodata);

        for y in 0..size {
            for x in 0..size {
                let quadrant = usize::from(y >= half) * 2 + usize::from(x >= half);
                let Some(child) = &children[quadrant] else {
                    continue;
                };
                let child = child.raster();
                let cx = (x % half) * 2;
                let cy = (y % half) * 2;

                for (band, &nodata) in self.nodata.iter().enumerate() {
                    let samples = [
                        child.get(cx, cy, band),
                        child.get(cx + 1, cy, band),
                        child.get(cx, cy + 1, band),
                        child.get(cx + 1, cy + 1, band),
                    ];
                    let value = match self.mode {
                        DownsampleMode::Quad => {
                            self.aggregator.aggregate_as(self.tile_type, samples, nodata)
                        }
                        DownsampleMode::Weighted => self
                            .aggregator
                            .aggregate_weighted_as(
                                self.tile_type,
                                &[[samples[0], samples[1]], [samples[2], samples[3]]],
                                0.5,
                                0.5,
                                nodata,
                            )
                            .map_err(|source| BuildError::Aggregate {
                                pyramid: self.pyramid.to_string(),
                                zoom: parent.zoom,
                                col: parent.col,
                                row: parent.row,
                                source,
                            })?,
                    };
                    out.set(x, y, band, value);
                }
            }
        }
        Ok(out)
    }
}

fn tile_error(pyramid: &str, zoom: u8, id: TileId, source: SourceError) -> BuildError {
    let (col, row) = coord::tile_from_id(id).map_or((0, 0), |t| (t.col, t.row));
    BuildError::Source {
        pyramid: pyramid.to_string(),
        zoom,
        col,
        row,
        source,
    }
}

/// Per-band stats over the valid pixels of one raster.
fn tile_stats(raster: &Raster, nodata: &[f64]) -> Vec<StatsAccumulator> {
    let mut stats = vec![StatsAccumulator::default(); nodata.len()];
    for pixel in raster.data().chunks_exact(raster.bands()) {
        for ((value, nd), acc) in pixel.iter().zip(nodata).zip(stats.iter_mut()) {
            if !is_nodata(*value, *nd) && !value.is_nan() {
                acc.add(*value);
            }
        }
    }
    stats
}

fn merge_stats(a: Vec<StatsAccumulator>, b: Vec<StatsAccumulator>) -> Vec<StatsAccumulator> {
    a.into_iter().zip(b).map(|(a, b)| a.merge(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::GeoBounds;
    use crate::source::MemoryTileStore;

    const ND: f64 = -9999.0;

    fn metadata(tile_type: TileType, max_zoom: u8) -> PyramidMetadata {
        let mut metadata = PyramidMetadata {
            tile_size: 4,
            tile_type,
            default_values: vec![ND],
            ..Default::default()
        };
        metadata.set_max_zoom_level(max_zoom);
        metadata
    }

    /// 4x4 tile with value x + 4y at each pixel.
    fn ramp() -> Raster {
        let data = (0..16).map(f64::from).collect();
        Raster::from_data(4, 4, 1, TileType::Double, data).unwrap()
    }

    fn fetch(store: &MemoryTileStore, col: u32, row: u32, zoom: u8) -> Option<Raster> {
        let id = coord::tile_id(col, row, zoom).unwrap();
        store.fetch(id, zoom).ok().map(RasterBlock::into_owned)
    }

    fn builder(aggregator: Aggregator, mode: DownsampleMode) -> PyramidBuilder {
        PyramidBuilder::new(
            BuildConfig::new()
                .with_aggregator(aggregator)
                .with_downsample(mode),
        )
    }

    #[test]
    fn test_child_lands_in_its_quadrant() {
        // (4, 2) at zoom 2 is the lower-left child of (2, 1) at zoom 1
        let store = MemoryTileStore::new();
        store.insert(TileCoord::new(4, 2, 2), ramp()).unwrap();
        let mut metadata = metadata(TileType::Double, 2);

        builder(Aggregator::Mean, DownsampleMode::Quad)
            .build("ramp", &mut metadata, &store, &store)
            .unwrap();

        let parent = fetch(&store, 2, 1, 1).unwrap();
        assert_eq!(parent.get(0, 2, 0), 2.5);
        assert_eq!(parent.get(1, 2, 0), 4.5);
        assert_eq!(parent.get(0, 3, 0), 10.5);
        assert_eq!(parent.get(1, 3, 0), 12.5);
        assert_eq!(parent.get(0, 0, 0), ND);
        assert_eq!(parent.get(3, 3, 0), ND);

        // (2, 1) at zoom 1 is the upper-left child of (1, 0) at zoom 0
        let root = fetch(&store, 1, 0, 0).unwrap();
        assert_eq!(root.get(0, 1, 0), 7.5);
        assert_eq!(root.get(0, 0, 0), ND);
        assert_eq!(root.get(1, 1, 0), ND);
    }

    #[test]
    fn test_metadata_records_each_level() {
        let store = MemoryTileStore::new();
        store.insert(TileCoord::new(4, 2, 2), ramp()).unwrap();
        let mut metadata = metadata(TileType::Double, 2);

        let summary = builder(Aggregator::Mean, DownsampleMode::Quad)
            .build("ramp", &mut metadata, &store, &store)
            .unwrap();

        assert_eq!(summary.tiles_written(), 2);
        assert_eq!(summary.level(1).unwrap().written, 1);
        assert!(metadata.has_pyramids());
        for zoom in 0..=2 {
            assert_eq!(metadata.name(zoom), Some(zoom.to_string().as_str()));
            assert!(metadata.level(zoom).unwrap().tile_bounds.is_some());
        }

        let level1 = &metadata.level(1).unwrap().stats.as_ref().unwrap()[0];
        assert_eq!(level1.min, 2.5);
        assert_eq!(level1.max, 12.5);
        assert_eq!(level1.mean, 7.5);

        let base = &metadata.stats.as_ref().unwrap()[0];
        assert_eq!((base.min, base.max, base.mean), (0.0, 15.0, 7.5));
        assert_eq!(metadata.resampling_method, Some(Aggregator::Mean));
    }

    #[test]
    fn test_all_nodata_parents_are_skipped() {
        let store = MemoryTileStore::new();
        store
            .insert(TileCoord::new(0, 0, 1), Raster::filled(4, 4, TileType::Double, &[ND]))
            .unwrap();
        let mut metadata = metadata(TileType::Double, 1);

        let summary = builder(Aggregator::Mean, DownsampleMode::Quad)
            .build("empty", &mut metadata, &store, &store)
            .unwrap();

        assert_eq!(summary.level(0).unwrap().written, 0);
        assert_eq!(summary.level(0).unwrap().skipped, 1);
        assert!(fetch(&store, 0, 0, 0).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_weighted_without_support_fails_before_writing() {
        let store = MemoryTileStore::new();
        store.insert(TileCoord::new(0, 0, 1), ramp()).unwrap();
        let mut metadata = metadata(TileType::Double, 1);

        let err = builder(Aggregator::MinAvgPair, DownsampleMode::Weighted)
            .build("dem", &mut metadata, &store, &store)
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::NotImplemented {
                aggregator: Aggregator::MinAvgPair,
                ..
            }
        ));
        assert_eq!(store.len(), 1);
        assert!(!metadata.has_pyramids());
        assert!(metadata.resampling_method.is_none());
    }

    #[test]
    fn test_weighted_mean_matches_quad_mean_on_full_blocks() {
        let quad_store = MemoryTileStore::new();
        let weighted_store = MemoryTileStore::new();
        quad_store.insert(TileCoord::new(0, 0, 1), ramp()).unwrap();
        weighted_store.insert(TileCoord::new(0, 0, 1), ramp()).unwrap();

        let mut quad_meta = metadata(TileType::Double, 1);
        let mut weighted_meta = quad_meta.clone();
        builder(Aggregator::Mean, DownsampleMode::Quad)
            .build("a", &mut quad_meta, &quad_store, &quad_store)
            .unwrap();
        builder(Aggregator::Mean, DownsampleMode::Weighted)
            .build("b", &mut weighted_meta, &weighted_store, &weighted_store)
            .unwrap();

        assert_eq!(
            fetch(&quad_store, 0, 0, 0),
            fetch(&weighted_store, 0, 0, 0)
        );
    }

    #[test]
    fn test_integer_tiles_use_their_own_arithmetic() {
        let store = MemoryTileStore::new();
        let data = vec![
            1.0, 2.0, 0.0, 0.0, //
            2.0, 2.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 0.0,
        ];
        let tile = Raster::from_data(4, 4, 1, TileType::Byte, data).unwrap();
        store.insert(TileCoord::new(0, 0, 1), tile).unwrap();
        let mut metadata = metadata(TileType::Byte, 1);
        metadata.default_values = vec![0.0];

        builder(Aggregator::Mode, DownsampleMode::Quad)
            .build("classes", &mut metadata, &store, &store)
            .unwrap();

        // (0, 0) at zoom 1 is the lower-left child of (0, 0) at zoom 0
        let parent = fetch(&store, 0, 0, 0).unwrap();
        assert_eq!(parent.tile_type(), TileType::Byte);
        assert_eq!(parent.get(0, 2, 0), 2.0);
    }

    #[test]
    fn test_read_errors_carry_tile_position() {
        struct Broken;

        impl TileSource for Broken {
            fn fetch(&self, _id: TileId, _zoom: u8) -> Result<RasterBlock, SourceError> {
                Err(SourceError::Io("connection reset".to_string()))
            }

            fn list_overlapping(
                &self,
                _bounds: &GeoBounds,
                zoom: u8,
            ) -> Result<Vec<TileId>, SourceError> {
                Ok(vec![coord::tile_id(3, 1, zoom)?])
            }
        }

        let sink = MemoryTileStore::new();
        let mut metadata = metadata(TileType::Double, 2);
        if let Some(level) = metadata.levels.get_mut(2) {
            level.stats = Some(vec![Stats::EMPTY]);
        }

        let err = builder(Aggregator::Mean, DownsampleMode::Quad)
            .build("remote", &mut metadata, &Broken, &sink)
            .unwrap_err();

        match err {
            BuildError::Source {
                pyramid,
                zoom,
                col,
                row,
                ..
            } => {
                assert_eq!(pyramid, "remote");
                assert_eq!(zoom, 2);
                assert_eq!((col, row), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sink.is_empty());
    }
}
