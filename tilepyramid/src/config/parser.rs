//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to settings.

use std::path::PathBuf;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::aggregate::Aggregator;
use crate::builder::DownsampleMode;
use crate::codec::ImageFormat;

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [render] section
    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("target_crs") {
            let v = v.trim();
            if !v.is_empty() {
                config.render = config.render.with_target_crs(v);
            }
        }
        if let Some(v) = section.get("mask_max") {
            let mask_max: f64 = v
                .trim()
                .parse()
                .map_err(|_| invalid("render", "mask_max", v, "must be a number"))?;
            if !mask_max.is_finite() {
                return Err(invalid("render", "mask_max", v, "must be finite"));
            }
            config.render = config.render.with_mask_max(mask_max);
        }
        if let Some(v) = section.get("format") {
            let format: ImageFormat = v
                .parse()
                .map_err(|_| invalid("render", "format", v, "must be one of: png, jpeg, tiff"))?;
            config.render = config.render.with_format(format);
        }
    }

    // [build] section
    if let Some(section) = ini.section(Some("build")) {
        if let Some(v) = section.get("aggregator") {
            let aggregator: Aggregator = v.parse().map_err(|_| {
                invalid(
                    "build",
                    "aggregator",
                    v,
                    "must be one of: mean, min, max, minavgpair, mode, nearest",
                )
            })?;
            config.build = config.build.with_aggregator(aggregator);
        }
        if let Some(v) = section.get("downsample") {
            let mode: DownsampleMode = v
                .parse()
                .map_err(|_| invalid("build", "downsample", v, "must be quad or weighted"))?;
            config.build = config.build.with_downsample(mode);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging = config.logging.with_directory(expand_tilde(v));
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging = config.logging.with_file(v);
            }
        }
        if let Some(v) = section.get("level") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging = config.logging.with_level(v);
            }
        }
    }

    Ok(config)
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
