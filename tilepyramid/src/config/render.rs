//! Rendering configuration.

use super::defaults::{DEFAULT_IMAGE_FORMAT, DEFAULT_MASK_MAX, DEFAULT_TARGET_CRS};
use crate::codec::ImageFormat;

/// Settings shared by every request a renderer serves.
///
/// # Example
///
/// ```
/// use tilepyramid::codec::ImageFormat;
/// use tilepyramid::config::RenderConfig;
///
/// let config = RenderConfig::default();
/// assert_eq!(config.target_crs(), "EPSG:4326");
/// assert_eq!(config.mask_max(), 1.0);
///
/// let config = RenderConfig::new()
///     .with_mask_max(0.5)
///     .with_format(ImageFormat::Jpeg);
/// assert_eq!(config.format(), ImageFormat::Jpeg);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// CRS of rendered output when the request names none
    target_crs: String,
    /// Mask threshold when the request gives none
    mask_max: f64,
    /// Encoding used for encoded tile responses
    format: ImageFormat,
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default output CRS. Default: EPSG:4326.
    pub fn with_target_crs(mut self, crs: impl Into<String>) -> Self {
        self.target_crs = crs.into();
        self
    }

    /// Set the default mask threshold. Default: 1.0.
    pub fn with_mask_max(mut self, mask_max: f64) -> Self {
        self.mask_max = mask_max;
        self
    }

    /// Set the encoding for encoded tiles. Default: PNG.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn target_crs(&self) -> &str {
        &self.target_crs
    }

    pub fn mask_max(&self) -> f64 {
        self.mask_max
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_crs: DEFAULT_TARGET_CRS.to_string(),
            mask_max: DEFAULT_MASK_MAX,
            format: DEFAULT_IMAGE_FORMAT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.target_crs(), DEFAULT_TARGET_CRS);
        assert_eq!(config.mask_max(), DEFAULT_MASK_MAX);
        assert_eq!(config.format(), DEFAULT_IMAGE_FORMAT);
        assert_eq!(config, RenderConfig::new());
    }

    #[test]
    fn test_builder_chaining() {
        let config = RenderConfig::new()
            .with_target_crs("WGS84")
            .with_mask_max(3.0)
            .with_format(ImageFormat::Tiff);
        assert_eq!(config.target_crs(), "WGS84");
        assert_eq!(config.mask_max(), 3.0);
        assert_eq!(config.format(), ImageFormat::Tiff);
    }
}
