//! Pyramid build configuration.

use super::defaults::{DEFAULT_AGGREGATOR, DEFAULT_DOWNSAMPLE};
use crate::aggregate::Aggregator;
use crate::builder::DownsampleMode;

/// How lower zoom levels are derived.
///
/// # Example
///
/// ```
/// use tilepyramid::aggregate::Aggregator;
/// use tilepyramid::builder::DownsampleMode;
/// use tilepyramid::config::BuildConfig;
///
/// let config = BuildConfig::new()
///     .with_aggregator(Aggregator::MinAvgPair)
///     .with_downsample(DownsampleMode::Quad);
/// assert_eq!(config.aggregator(), Aggregator::MinAvgPair);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfig {
    aggregator: Aggregator,
    downsample: DownsampleMode,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the aggregator. Default: mean.
    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Set the downsampling mode. Default: quad.
    ///
    /// [`DownsampleMode::Weighted`] only works with aggregators that
    /// support weighted aggregation.
    pub fn with_downsample(mut self, downsample: DownsampleMode) -> Self {
        self.downsample = downsample;
        self
    }

    pub fn aggregator(&self) -> Aggregator {
        self.aggregator
    }

    pub fn downsample(&self) -> DownsampleMode {
        self.downsample
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            aggregator: DEFAULT_AGGREGATOR,
            downsample: DEFAULT_DOWNSAMPLE,
        }
    }
}
