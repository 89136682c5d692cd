//! Numeric pixel types and nodata comparison.

use serde::{Deserialize, Serialize};

/// Pixel storage type of a pyramid.
///
/// Persisted as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TileType {
    Byte,
    UShort,
    Short,
    Int,
    Float,
    #[default]
    Double,
}

impl TileType {
    pub fn code(self) -> u8 {
        match self {
            TileType::Byte => 0,
            TileType::UShort => 1,
            TileType::Short => 2,
            TileType::Int => 3,
            TileType::Float => 4,
            TileType::Double => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TileType::Byte),
            1 => Some(TileType::UShort),
            2 => Some(TileType::Short),
            3 => Some(TileType::Int),
            4 => Some(TileType::Float),
            5 => Some(TileType::Double),
            _ => None,
        }
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        !matches!(self, TileType::Float | TileType::Double)
    }

    /// Converts `value` to what this type can actually store, as `f64`.
    ///
    /// Integer types round to nearest and saturate; NaN becomes 0.
    /// `Float` narrows through `f32`.
    #[inline]
    pub fn coerce(self, value: f64) -> f64 {
        match self {
            TileType::Byte => u8::from_f64(value).to_f64(),
            TileType::UShort => u16::from_f64(value).to_f64(),
            TileType::Short => i16::from_f64(value).to_f64(),
            TileType::Int => i32::from_f64(value).to_f64(),
            TileType::Float => f32::from_f64(value).to_f64(),
            TileType::Double => value,
        }
    }
}

impl TryFrom<u8> for TileType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        TileType::from_code(code).ok_or_else(|| format!("unknown tile type code {code}"))
    }
}

impl From<TileType> for u8 {
    fn from(tile_type: TileType) -> Self {
        tile_type.code()
    }
}

/// A numeric pixel value that aggregation can operate on.
pub trait Sample: Copy + PartialOrd + Send + Sync + 'static {
    const TILE_TYPE: TileType;

    fn to_f64(self) -> f64;

    /// Rounds and saturates for integer types. NaN maps to 0.
    fn from_f64(value: f64) -> Self;

    /// Bitwise identity; two NaNs are always the same.
    fn same_bits(self, other: Self) -> bool;
}

macro_rules! impl_integer_sample {
    ($($ty:ty => $tile_type:expr),* $(,)?) => {
        $(
            impl Sample for $ty {
                const TILE_TYPE: TileType = $tile_type;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(value: f64) -> Self {
                    // `as` saturates and maps NaN to zero
                    value.round() as $ty
                }

                #[inline]
                fn same_bits(self, other: Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_integer_sample! {
    u8 => TileType::Byte,
    u16 => TileType::UShort,
    i16 => TileType::Short,
    i32 => TileType::Int,
}

impl Sample for f32 {
    const TILE_TYPE: TileType = TileType::Float;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn same_bits(self, other: Self) -> bool {
        self.to_bits() == other.to_bits() || (self.is_nan() && other.is_nan())
    }
}

impl Sample for f64 {
    const TILE_TYPE: TileType = TileType::Double;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn same_bits(self, other: Self) -> bool {
        is_nodata(self, other)
    }
}

/// True when `value` is the nodata sentinel.
///
/// Compares bit patterns so that a NaN sentinel matches any NaN, and
/// never uses numeric equality.
#[inline]
pub fn is_nodata(value: f64, nodata: f64) -> bool {
    value.to_bits() == nodata.to_bits() || (value.is_nan() && nodata.is_nan())
}
