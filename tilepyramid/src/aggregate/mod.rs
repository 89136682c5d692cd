//! Downsampling aggregators.
//!
//! An [`Aggregator`] reduces the four pixels of a 2×2 block at one zoom
//! level to the single pixel covering them one level up. Samples equal to
//! nodata (bitwise, so a NaN sentinel works) are ignored; if all four are
//! nodata the result is nodata.
//!
//! Some aggregators also support a weighted form over a 2×2 neighbourhood,
//! used for sub-pixel resampling. The others report
//! [`AggregateError::NotImplemented`].
//!
//! # Example
//!
//! ```
//! use tilepyramid::aggregate::Aggregator;
//!
//! let nodata = -9999.0;
//! let value = Aggregator::MinAvgPair.aggregate([1.0, 3.0, nodata, nodata], nodata);
//! assert_eq!(value, 2.0);
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::raster::{Sample, TileType};

/// Errors from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("Aggregator '{0}' does not implement weighted aggregation")]
    NotImplemented(Aggregator),

    #[error("Unknown aggregator: '{0}'")]
    Unknown(String),
}

/// Downsampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Aggregator {
    /// Arithmetic mean of the valid samples.
    #[default]
    Mean,
    /// Smallest valid sample.
    Min,
    /// Largest valid sample.
    Max,
    /// Smallest average over every pair of valid samples.
    MinAvgPair,
    /// Most frequent valid sample; ties go to the earliest.
    Mode,
    /// First valid sample in upper-left, upper-right, lower-left,
    /// lower-right order.
    Nearest,
}

impl Aggregator {
    pub const ALL: [Aggregator; 6] = [
        Aggregator::Mean,
        Aggregator::Min,
        Aggregator::Max,
        Aggregator::MinAvgPair,
        Aggregator::Mode,
        Aggregator::Nearest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Aggregator::Mean => "mean",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
            Aggregator::MinAvgPair => "minavgpair",
            Aggregator::Mode => "mode",
            Aggregator::Nearest => "nearest",
        }
    }

    /// Whether [`Aggregator::aggregate_weighted`] produces a value.
    pub fn supports_weighted(self) -> bool {
        matches!(self, Aggregator::Mean | Aggregator::Nearest)
    }

    /// Reduces four samples to one.
    ///
    /// Samples are ordered upper-left, upper-right, lower-left, lower-right.
    pub fn aggregate<T: Sample>(self, samples: [T; 4], nodata: T) -> T {
        let valid = |v: &T| !v.same_bits(nodata);

        match self {
            Aggregator::Mean => {
                let (sum, count) = samples
                    .iter()
                    .filter(|&v| valid(v))
                    .fold((0.0, 0u32), |(sum, n), v| (sum + v.to_f64(), n + 1));
                if count == 0 {
                    nodata
                } else {
                    T::from_f64(sum / count as f64)
                }
            }
            Aggregator::Min => samples
                .into_iter()
                .filter(valid)
                .reduce(|a, b| if b < a { b } else { a })
                .unwrap_or(nodata),
            Aggregator::Max => samples
                .into_iter()
                .filter(valid)
                .reduce(|a, b| if b > a { b } else { a })
                .unwrap_or(nodata),
            Aggregator::MinAvgPair => {
                let mut best: Option<f64> = None;
                for i in 0..4 {
                    for j in (i + 1)..4 {
                        if valid(&samples[i]) && valid(&samples[j]) {
                            let mut avg = (samples[i].to_f64() + samples[j].to_f64()) / 2.0;
                            if T::TILE_TYPE.is_integer() {
                                // integer pairs divide toward zero
                                avg = avg.trunc();
                            }
                            best = Some(best.map_or(avg, |b| b.min(avg)));
                        }
                    }
                }
                best.map_or(nodata, T::from_f64)
            }
            Aggregator::Mode => {
                let mut winner: Option<(T, usize)> = None;
                for v in samples.iter().filter(|&v| valid(v)) {
                    let count = samples.iter().filter(|o| o.same_bits(*v)).count();
                    if winner.map_or(true, |(_, best)| count > best) {
                        winner = Some((*v, count));
                    }
                }
                winner.map_or(nodata, |(v, _)| v)
            }
            Aggregator::Nearest => samples.into_iter().find(valid).unwrap_or(nodata),
        }
    }

    /// Interpolates within a 2×2 neighbourhood.
    ///
    /// `neighborhood[row][col]` with row 0 on top. `weight_x` and
    /// `weight_y` are the fractional position (0..=1) from the upper-left
    /// cell toward the lower-right one.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::NotImplemented`] unless
    /// [`Aggregator::supports_weighted`] is true.
    pub fn aggregate_weighted<T: Sample>(
        self,
        neighborhood: &[[T; 2]; 2],
        weight_x: f64,
        weight_y: f64,
        nodata: T,
    ) -> Result<T, AggregateError> {
        match self {
            Aggregator::Mean => {
                let weights = [
                    [(1.0 - weight_x) * (1.0 - weight_y), weight_x * (1.0 - weight_y)],
                    [(1.0 - weight_x) * weight_y, weight_x * weight_y],
                ];
                let mut sum = 0.0;
                let mut total = 0.0;
                for (row, row_weights) in neighborhood.iter().zip(weights.iter()) {
                    for (v, w) in row.iter().zip(row_weights.iter()) {
                        if !v.same_bits(nodata) {
                            sum += v.to_f64() * w;
                            total += w;
                        }
                    }
                }
                if total <= 0.0 {
                    Ok(nodata)
                } else {
                    Ok(T::from_f64(sum / total))
                }
            }
            Aggregator::Nearest => {
                let col = usize::from(weight_x.round() >= 1.0);
                let row = usize::from(weight_y.round() >= 1.0);
                Ok(neighborhood[row][col])
            }
            other => Err(AggregateError::NotImplemented(other)),
        }
    }

    /// [`Aggregator::aggregate`] on values stored as `f64` for a raster of
    /// `tile_type`, computed in that type's own arithmetic.
    pub fn aggregate_as(self, tile_type: TileType, samples: [f64; 4], nodata: f64) -> f64 {
        fn typed<T: Sample>(agg: Aggregator, samples: [f64; 4], nodata: f64) -> f64 {
            agg.aggregate(samples.map(T::from_f64), T::from_f64(nodata))
                .to_f64()
        }
        match tile_type {
            TileType::Byte => typed::<u8>(self, samples, nodata),
            TileType::UShort => typed::<u16>(self, samples, nodata),
            TileType::Short => typed::<i16>(self, samples, nodata),
            TileType::Int => typed::<i32>(self, samples, nodata),
            TileType::Float => typed::<f32>(self, samples, nodata),
            TileType::Double => typed::<f64>(self, samples, nodata),
        }
    }

    /// [`Aggregator::aggregate_weighted`] on values stored as `f64` for a
    /// raster of `tile_type`.
    pub fn aggregate_weighted_as(
        self,
        tile_type: TileType,
        neighborhood: &[[f64; 2]; 2],
        weight_x: f64,
        weight_y: f64,
        nodata: f64,
    ) -> Result<f64, AggregateError> {
        fn typed<T: Sample>(
            agg: Aggregator,
            neighborhood: &[[f64; 2]; 2],
            weight_x: f64,
            weight_y: f64,
            nodata: f64,
        ) -> Result<f64, AggregateError> {
            let cells = neighborhood.map(|row| row.map(T::from_f64));
            agg.aggregate_weighted(&cells, weight_x, weight_y, T::from_f64(nodata))
                .map(Sample::to_f64)
        }
        match tile_type {
            TileType::Byte => typed::<u8>(self, neighborhood, weight_x, weight_y, nodata),
            TileType::UShort => typed::<u16>(self, neighborhood, weight_x, weight_y, nodata),
            TileType::Short => typed::<i16>(self, neighborhood, weight_x, weight_y, nodata),
            TileType::Int => typed::<i32>(self, neighborhood, weight_x, weight_y, nodata),
            TileType::Float => typed::<f32>(self, neighborhood, weight_x, weight_y, nodata),
            TileType::Double => typed::<f64>(self, neighborhood, weight_x, weight_y, nodata),
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregator {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Aggregator::ALL
            .into_iter()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| AggregateError::Unknown(s.to_string()))
    }
}
