//! On-disk JSON shape of pyramid metadata.
//!
//! Reading is tolerant of legacy spellings (see the aliases on
//! [`GeoBounds`] and [`ImageLevelMetadata`]) but rejects any top-level
//! field it does not know. Writing always uses the canonical names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::float_text;
use super::types::{Classification, ImageLevelMetadata, Stats, ZoomLevels};
use super::{MetadataError, PyramidMetadata, DEFAULT_TILE_SIZE};
use crate::coord::{GeoBounds, MAX_ZOOM};
use crate::raster::TileType;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(super) struct MetadataDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pyramid: Option<String>,
    #[serde(default)]
    bounds: Option<GeoBounds>,
    #[serde(default, alias = "tileSize")]
    tilesize: Option<u32>,
    #[serde(default)]
    bands: Option<usize>,
    #[serde(default, with = "float_text::option_vec")]
    default_values: Option<Vec<f64>>,
    #[serde(default)]
    tile_type: Option<TileType>,
    #[serde(default)]
    classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protection_level: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    image_metadata: Vec<Option<ImageLevelMetadata>>,
    #[serde(default)]
    max_zoom_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stats: Option<Vec<Stats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resampling_method: Option<String>,
}

impl From<&PyramidMetadata> for MetadataDocument {
    fn from(meta: &PyramidMetadata) -> Self {
        Self {
            pyramid: meta.pyramid.clone(),
            bounds: Some(meta.bounds),
            tilesize: Some(meta.tile_size),
            bands: Some(meta.bands),
            default_values: Some(meta.default_values.clone()),
            tile_type: Some(meta.tile_type),
            classification: Some(meta.classification),
            protection_level: meta.protection_level.clone(),
            tags: meta.tags.clone(),
            image_metadata: meta.levels.as_slice().iter().cloned().map(Some).collect(),
            max_zoom_level: Some(meta.levels.max_zoom()),
            stats: meta.stats.clone(),
            resampling_method: meta.resampling_method.map(|a| a.name().to_string()),
        }
    }
}

impl TryFrom<MetadataDocument> for PyramidMetadata {
    type Error = MetadataError;

    fn try_from(doc: MetadataDocument) -> Result<Self, Self::Error> {
        let tile_size = doc.tilesize.unwrap_or(DEFAULT_TILE_SIZE);
        if !tile_size.is_power_of_two() {
            return Err(MetadataError::Invalid(format!(
                "tilesize {tile_size} is not a power of two"
            )));
        }

        let (bands, default_values) = match (doc.bands, doc.default_values) {
            (Some(bands), Some(values)) if values.len() != bands => {
                return Err(MetadataError::Invalid(format!(
                    "{} defaultValues for {bands} bands",
                    values.len()
                )));
            }
            (Some(bands), Some(values)) => (bands, values),
            (Some(bands), None) => (bands, vec![f64::NAN; bands]),
            (None, Some(values)) if !values.is_empty() => (values.len(), values),
            (None, _) => (1, vec![f64::NAN]),
        };
        if bands == 0 {
            return Err(MetadataError::Invalid("bands must be at least 1".into()));
        }

        if let Some(zoom) = doc.max_zoom_level {
            if zoom > MAX_ZOOM {
                return Err(MetadataError::Invalid(format!(
                    "maxZoomLevel {zoom} exceeds {MAX_ZOOM}"
                )));
            }
        }
        if doc.image_metadata.len() > MAX_ZOOM as usize + 1 {
            return Err(MetadataError::Invalid(format!(
                "{} imageMetadata entries exceed zoom {MAX_ZOOM}",
                doc.image_metadata.len()
            )));
        }

        let resampling_method = doc
            .resampling_method
            .filter(|m| !m.trim().is_empty())
            .map(|m| {
                m.parse()
                    .map_err(|e| MetadataError::Invalid(format!("resamplingMethod: {e}")))
            })
            .transpose()?;

        let mut levels = ZoomLevels::from_vec(
            doc.image_metadata
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect(),
        );
        let max_zoom = doc.max_zoom_level.unwrap_or(levels.max_zoom());
        levels.resize(max_zoom);

        Ok(PyramidMetadata {
            pyramid: doc.pyramid,
            bounds: doc.bounds.unwrap_or(GeoBounds::WORLD),
            tile_size,
            bands,
            default_values,
            tile_type: doc.tile_type.unwrap_or_default(),
            classification: doc.classification.unwrap_or_default(),
            protection_level: doc.protection_level,
            tags: doc.tags,
            levels,
            stats: doc.stats,
            resampling_method,
        })
    }
}
