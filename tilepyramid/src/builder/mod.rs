//! Pyramid construction.
//!
//! [`PyramidBuilder`] fills in every level below a dataset's base zoom by
//! reducing each 2×2 block of child pixels to one parent pixel with the
//! configured [`Aggregator`](crate::aggregate::Aggregator). Levels are
//! built strictly from the deepest up; tiles within a level are built in
//! parallel.
//!
//! The result is sparse: a parent whose children hold no valid data is not
//! written, and a missing tile reads as nodata.

mod pyramid;

pub use pyramid::{BuildSummary, LevelSummary, PyramidBuilder};

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::aggregate::{AggregateError, Aggregator};
use crate::source::SourceError;

/// How child pixels are reduced to a parent pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DownsampleMode {
    /// Plain four-sample reduction; every aggregator supports it.
    #[default]
    Quad,
    /// Interpolation at the centre of each 2×2 block. Needs an aggregator
    /// with a weighted form.
    Weighted,
}

impl DownsampleMode {
    pub fn name(self) -> &'static str {
        match self {
            DownsampleMode::Quad => "quad",
            DownsampleMode::Weighted => "weighted",
        }
    }
}

impl fmt::Display for DownsampleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DownsampleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quad" => Ok(DownsampleMode::Quad),
            "weighted" => Ok(DownsampleMode::Weighted),
            other => Err(format!("unknown downsample mode '{other}'")),
        }
    }
}

/// Errors that stop a build.
///
/// None of these are retried. Tiles already written for deeper levels stay
/// written.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Cannot build pyramid '{pyramid}': aggregator '{aggregator}' has no weighted form")]
    NotImplemented {
        pyramid: String,
        aggregator: Aggregator,
    },

    #[error("Pyramid '{pyramid}' tile {col},{row} at zoom {zoom}: {source}")]
    Aggregate {
        pyramid: String,
        zoom: u8,
        col: u32,
        row: u32,
        #[source]
        source: AggregateError,
    },

    #[error("Pyramid '{pyramid}' tile {col},{row} at zoom {zoom}: {source}")]
    Source {
        pyramid: String,
        zoom: u8,
        col: u32,
        row: u32,
        #[source]
        source: SourceError,
    },

    #[error("Pyramid '{pyramid}' tile {col},{row} at zoom {zoom} is {width}x{height}, expected {expected}x{expected}")]
    TileShape {
        pyramid: String,
        zoom: u8,
        col: u32,
        row: u32,
        width: usize,
        height: usize,
        expected: usize,
    },

    #[error("Pyramid '{pyramid}' listing zoom {zoom}: {source}")]
    Listing {
        pyramid: String,
        zoom: u8,
        #[source]
        source: SourceError,
    },
}
