//! Serialization of `ConfigFile` back to INI text.

use std::path::Path;

use super::settings::ConfigFile;

/// Render the configuration as a commented INI document.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let directory = config
        .logging
        .directory()
        .map(path_to_string)
        .unwrap_or_default();

    format!(
        r#"[render]
; Coordinate reference system of rendered output when a request names none.
; Only geographic WGS84 (EPSG:4326) is supported by the built-in codec.
target_crs = {}
; Mask threshold: output pixels whose mask value exceeds this are blanked.
mask_max = {}
; Encoding of encoded tile responses: png, jpeg, tiff
format = {}

[build]
; Downsampling aggregator: mean, min, max, minavgpair, mode, nearest
aggregator = {}
; quad     - reduce each 2x2 block of child pixels
; weighted - interpolate child pixels (mean and nearest only)
downsample = {}

[logging]
; Directory for the log file; leave empty to log to stdout only
directory = {}
file = {}
; Filter used when RUST_LOG is unset, e.g. info or tilepyramid=debug
level = {}
"#,
        config.render.target_crs(),
        config.render.mask_max(),
        config.render.format(),
        config.build.aggregator(),
        config.build.downsample(),
        directory,
        config.logging.file(),
        config.logging.level(),
    )
}

/// Convert a path to a string, collapsing the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
