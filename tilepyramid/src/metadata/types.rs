//! Metadata type definitions

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coord::GridRect;

/// How pixel values may be interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Classification {
    /// Measurements on a continuous scale; blending is allowed.
    #[default]
    Continuous,
    /// Class labels; only nearest/mode style resampling is allowed.
    Categorical,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Continuous => write!(f, "Continuous"),
            Classification::Categorical => write!(f, "Categorical"),
        }
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(Classification::Continuous),
            "categorical" => Ok(Classification::Categorical),
            other => Err(format!("unknown classification '{other}'")),
        }
    }
}

/// Summary statistics for one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(with = "crate::metadata::float_text")]
    pub min: f64,
    #[serde(with = "crate::metadata::float_text")]
    pub max: f64,
    #[serde(with = "crate::metadata::float_text")]
    pub mean: f64,
}

impl Stats {
    /// Stats for a band with no valid pixels.
    pub const EMPTY: Stats = Stats {
        min: f64::NAN,
        max: f64::NAN,
        mean: f64::NAN,
    };
}

/// Running min/max/mean over valid pixels.
///
/// Accumulators can be merged, so each worker may keep its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsAccumulator {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

impl StatsAccumulator {
    #[inline]
    pub fn add(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    pub fn merge(mut self, other: StatsAccumulator) -> StatsAccumulator {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
        self
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finish(&self) -> Stats {
        if self.count == 0 {
            return Stats::EMPTY;
        }
        Stats {
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
        }
    }
}

/// What is known about one zoom level.
///
/// Every field is optional; a level with no `name` has no tiles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLevelMetadata {
    #[serde(default)]
    pub stats: Option<Vec<Stats>>,
    #[serde(default)]
    pub pixel_bounds: Option<GridRect>,
    #[serde(default)]
    pub tile_bounds: Option<GridRect>,
    #[serde(default, alias = "image")]
    pub name: Option<String>,
}

impl ImageLevelMetadata {
    /// True when the level has been built.
    #[inline]
    pub fn is_populated(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// Per-zoom metadata, indexable directly by zoom level.
///
/// Always holds `max_zoom + 1` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomLevels {
    levels: Vec<ImageLevelMetadata>,
}

impl Default for ZoomLevels {
    fn default() -> Self {
        Self::with_max_zoom(0)
    }
}

impl ZoomLevels {
    pub fn with_max_zoom(max_zoom: u8) -> Self {
        Self {
            levels: vec![ImageLevelMetadata::default(); max_zoom as usize + 1],
        }
    }

    pub(crate) fn from_vec(mut levels: Vec<ImageLevelMetadata>) -> Self {
        if levels.is_empty() {
            levels.push(ImageLevelMetadata::default());
        }
        Self { levels }
    }

    #[inline]
    pub fn max_zoom(&self) -> u8 {
        (self.levels.len() - 1) as u8
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Never true; there is always a zoom 0 entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Resizes to `max_zoom + 1` entries, keeping existing entries by zoom.
    ///
    /// Growing appends empty levels; shrinking drops the deepest ones.
    pub fn resize(&mut self, max_zoom: u8) {
        self.levels
            .resize(max_zoom as usize + 1, ImageLevelMetadata::default());
    }

    #[inline]
    pub fn get(&self, zoom: u8) -> Option<&ImageLevelMetadata> {
        self.levels.get(zoom as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, zoom: u8) -> Option<&mut ImageLevelMetadata> {
        self.levels.get_mut(zoom as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &ImageLevelMetadata)> {
        self.levels.iter().enumerate().map(|(z, l)| (z as u8, l))
    }

    pub(crate) fn as_slice(&self) -> &[ImageLevelMetadata] {
        &self.levels
    }
}

impl Index<u8> for ZoomLevels {
    type Output = ImageLevelMetadata;

    fn index(&self, zoom: u8) -> &Self::Output {
        &self.levels[zoom as usize]
    }
}

impl IndexMut<u8> for ZoomLevels {
    fn index_mut(&mut self, zoom: u8) -> &mut Self::Output {
        &mut self.levels[zoom as usize]
    }
}
