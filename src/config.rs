//! Tool configuration.
//!
//! Handles loading, validating, and merging `assetgen.toml`. Stock defaults
//! form the base layer; a user file (found in the working directory, or named
//! with `--config`) is merged on top, key by key.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! quality = 90                # JPEG quality (1-100)
//! icon_dir = "appicon/ios/Images.xcassets/AppIcon.appiconset"
//! launch_dir = "launchimage/ios"
//!
//! [icon]
//! matte = true                # Frame the artwork before resizing
//! inset_percent = 10          # Frame margin per side (0-49)
//! matte_color = [255, 255, 255]
//!
//! [[icon.extra]]              # Additional icon outputs
//! width = 512
//! height = 512
//! name = "Icon-512.png"
//! strategy = "scale-crop"
//!
//! [preview]
//! max_width = 620
//! max_height = 960
//! suffix = "-m"
//! crop = false                # true: cut to exactly max_width x max_height
//!
//! [retina]
//! template = "2x"             # Scale sources are authored at
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::catalog::{Catalog, CatalogError, GeometrySpec, Matte, StrategyId};
use crate::imaging::Quality;
use crate::naming::RetinaScale;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "assetgen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

impl From<CatalogError> for ConfigError {
    fn from(err: CatalogError) -> Self {
        ConfigError::Validation(err.to_string())
    }
}

/// Tool configuration loaded from `assetgen.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Where catalog outputs go and how they are encoded.
    pub output: OutputConfig,
    /// App icon preparation.
    pub icon: IconConfig,
    /// Preview (`-m`) derivatives.
    pub preview: PreviewConfig,
    /// Retina derivation.
    pub retina: RetinaConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ToolConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        if self.output.icon_dir.is_empty() || self.output.launch_dir.is_empty() {
            return Err(ConfigError::Validation(
                "output.icon_dir and output.launch_dir must not be empty".into(),
            ));
        }
        if self.icon.inset_percent >= 50 {
            return Err(ConfigError::Validation(
                "icon.inset_percent must be below 50".into(),
            ));
        }
        if self.preview.max_width == 0 || self.preview.max_height == 0 {
            return Err(ConfigError::Validation(
                "preview.max_width and preview.max_height must be non-zero".into(),
            ));
        }
        if self.preview.suffix.is_empty() {
            return Err(ConfigError::Validation(
                "preview.suffix must not be empty".into(),
            ));
        }
        if [RetinaScale::X2, RetinaScale::X3]
            .iter()
            .any(|s| self.preview.suffix.ends_with(s.suffix()))
        {
            return Err(ConfigError::Validation(format!(
                "preview.suffix '{}' collides with a retina suffix",
                self.preview.suffix
            )));
        }
        for entry in &self.icon.extra {
            GeometrySpec::new(entry.width, entry.height, entry.name.clone(), entry.strategy)?;
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.output.quality)
    }

    /// The matte applied to icon sources, if enabled.
    pub fn matte(&self) -> Option<Matte> {
        self.icon.matte.then_some(Matte {
            inset_percent: self.icon.inset_percent,
            color: self.icon.matte_color,
        })
    }

    /// The stock icon catalog with this config's matte and extra entries.
    pub fn icon_catalog(&self) -> Result<Catalog, ConfigError> {
        Ok(Catalog::app_icons()
            .with_matte(self.matte())
            .with_extra(&self.icon.extra)?)
    }
}

/// Output locations and encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JPEG quality (1-100). Lossless formats ignore it.
    pub quality: u32,
    /// Directory the icon catalog is written to.
    pub icon_dir: String,
    /// Directory the launch-image catalog is written to.
    pub launch_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            icon_dir: "appicon/ios/Images.xcassets/AppIcon.appiconset".to_string(),
            launch_dir: "launchimage/ios".to_string(),
        }
    }
}

/// Icon matte and extra outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IconConfig {
    /// Frame the artwork inside a solid square before resizing.
    pub matte: bool,
    /// Frame margin on each side, as a percentage of the source width.
    pub inset_percent: u32,
    /// Frame color as `[r, g, b]`.
    pub matte_color: [u8; 3],
    /// Additional outputs appended to the stock icon catalog.
    pub extra: Vec<GeometrySpec>,
}

impl Default for IconConfig {
    fn default() -> Self {
        let matte = Matte::default();
        Self {
            matte: true,
            inset_percent: matte.inset_percent,
            matte_color: matte.color,
            extra: Vec::new(),
        }
    }
}

/// Preview derivative settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Marker inserted between stem and extension.
    pub suffix: String,
    /// Cut to exactly `max_width x max_height` instead of only scaling.
    pub crop: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_width: 620,
            max_height: 960,
            suffix: "-m".to_string(),
            crop: false,
        }
    }
}

impl PreviewConfig {
    /// Target geometry for a preview of the file called `name`.
    pub fn geometry(&self, name: impl Into<String>) -> Result<GeometrySpec, CatalogError> {
        let strategy = if self.crop {
            StrategyId::ScaleCrop
        } else {
            StrategyId::ScaleOnly
        };
        GeometrySpec::new(self.max_width, self.max_height, name, strategy)
    }
}

/// Retina derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetinaConfig {
    /// Scale at which sources are authored. The other two are generated.
    pub template: RetinaScale,
}

impl Default for RetinaConfig {
    fn default() -> Self {
        Self {
            template: RetinaScale::X2,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ToolConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ToolConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective configuration.
///
/// An explicit path must exist. Without one, `assetgen.toml` in `cwd` is used
/// when present, and the stock defaults otherwise.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<ToolConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(load_raw_config(path)?),
        None => {
            let candidate = cwd.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                Some(load_raw_config(&candidate)?)
            } else {
                None
            }
        }
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `assetgen.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# assetgen Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# The file is read from ./assetgen.toml, or from the path given with --config.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# JPEG encoding quality (1 = worst, 100 = best). PNG output is lossless.
quality = 90

# Directory the app icon set is written to (Contents.json goes here too).
icon_dir = "appicon/ios/Images.xcassets/AppIcon.appiconset"

# Directory launch images are written to.
launch_dir = "launchimage/ios"

# ---------------------------------------------------------------------------
# App icons
# ---------------------------------------------------------------------------
[icon]
# Draw the artwork inside a solid square frame before resizing.
matte = true

# Frame margin on each side, in percent of the source width (0-49).
inset_percent = 10

# Frame color as [r, g, b].
matte_color = [255, 255, 255]

# Extra outputs appended to the stock icon set. Strategies:
# "scale-only", "scale-crop", "pad-composite", "rotate-scale-cut", "identity".
# [[icon.extra]]
# width = 512
# height = 512
# name = "iTunesArtwork.png"
# strategy = "scale-crop"

# ---------------------------------------------------------------------------
# Previews (assetgen preview, assetgen watch --preview)
# ---------------------------------------------------------------------------
[preview]
max_width = 620
max_height = 960

# Marker between stem and extension: photo.jpg -> photo-m.jpg
suffix = "-m"

# Cut to exactly max_width x max_height instead of only scaling down.
crop = false

# ---------------------------------------------------------------------------
# Retina derivation (assetgen retina, and assetgen watch without --preview)
# ---------------------------------------------------------------------------
[retina]
# Scale sources are authored at: "1x", "2x" or "3x".
template = "2x"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
