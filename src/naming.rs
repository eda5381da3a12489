//! Centralized filename handling for generated derivatives.
//!
//! Two conventions link a source file to the files generated from it:
//!
//! - **Retina scales**: `icon.png`, `icon@2x.png`, `icon@3x.png` are the 1x, 2x
//!   and 3x renditions of the same base image. The suffix sits between the stem
//!   and the extension.
//! - **Previews**: `photo.jpg` gets a downscaled sibling `photo-m.jpg`. The
//!   marker (`-m` by default) is configurable.
//!
//! Everything here is pure string/path manipulation. Nothing touches the
//! filesystem, so the watch loop can ask [`Namer::is_own_derivative`] about a
//! path that no longer exists.
//!
//! ## Path-independence
//!
//! Deriving a scale always starts from the bare stem, so the starting scale
//! never leaks into the result:
//!
//! ```text
//! derive("a/icon@3x.png", 2x)  → "a/icon@2x.png"
//! derive("a/icon.png", 2x)     → "a/icon@2x.png"
//! scale_of("a/icon@2x.png")    → 2x
//! strip_scale("a/icon@2x.png") → "a/icon.png"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("Malformed path (expected `name.ext`): {0}")]
    MalformedPath(PathBuf),
}

/// Retina multiplier encoded in a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RetinaScale {
    #[serde(rename = "1x")]
    X1,
    #[serde(rename = "2x")]
    X2,
    #[serde(rename = "3x")]
    X3,
}

impl RetinaScale {
    pub const ALL: [RetinaScale; 3] = [RetinaScale::X1, RetinaScale::X2, RetinaScale::X3];

    /// Filename suffix inserted before the extension. Empty for 1x.
    pub fn suffix(self) -> &'static str {
        match self {
            RetinaScale::X1 => "",
            RetinaScale::X2 => "@2x",
            RetinaScale::X3 => "@3x",
        }
    }

    pub fn factor(self) -> u32 {
        match self {
            RetinaScale::X1 => 1,
            RetinaScale::X2 => 2,
            RetinaScale::X3 => 3,
        }
    }
}

impl fmt::Display for RetinaScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

impl FromStr for RetinaScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1x" | "1" => Ok(RetinaScale::X1),
            "2x" | "2" => Ok(RetinaScale::X2),
            "3x" | "3" => Ok(RetinaScale::X3),
            other => Err(format!("unknown retina scale '{other}' (expected 1x, 2x or 3x)")),
        }
    }
}

/// Split a file name into `(stem, extension)`.
///
/// The extension is everything after the last dot. A leading dot does not
/// count (`.png` is a hidden file with no extension).
fn split_name(path: &Path) -> Result<(&str, &str), NamingError> {
    let malformed = || NamingError::MalformedPath(path.to_path_buf());
    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(malformed)?;
    let dot = name
        .rfind('.')
        .filter(|&i| i > 0 && i + 1 < name.len())
        .ok_or_else(malformed)?;
    Ok((&name[..dot], &name[dot + 1..]))
}

/// Remove every trailing scale suffix from a stem.
///
/// A suffix is only removed when something is left in front of it, so a file
/// literally called `@2x.png` keeps its stem.
fn bare_stem(stem: &str) -> &str {
    let mut current = stem;
    loop {
        let stripped = [RetinaScale::X2, RetinaScale::X3]
            .iter()
            .find_map(|s| current.strip_suffix(s.suffix()))
            .filter(|rest| !rest.is_empty());
        match stripped {
            Some(rest) => current = rest,
            None => return current,
        }
    }
}

/// Which retina scale a path encodes. Paths without a suffix are 1x.
pub fn scale_of(path: &Path) -> Result<RetinaScale, NamingError> {
    let (stem, _) = split_name(path)?;
    if bare_stem(stem).len() == stem.len() {
        return Ok(RetinaScale::X1);
    }
    if stem.ends_with(RetinaScale::X2.suffix()) {
        Ok(RetinaScale::X2)
    } else {
        Ok(RetinaScale::X3)
    }
}

/// Sibling path encoding `scale`, with the extension preserved.
pub fn derive(path: &Path, scale: RetinaScale) -> Result<PathBuf, NamingError> {
    let (stem, ext) = split_name(path)?;
    let name = format!("{}{}.{}", bare_stem(stem), scale.suffix(), ext);
    Ok(path.with_file_name(name))
}

/// The 1x base path.
pub fn strip_scale(path: &Path) -> Result<PathBuf, NamingError> {
    derive(path, RetinaScale::X1)
}

/// Preview sibling: `photo.jpg` + `-m` → `photo-m.jpg`.
pub fn preview_path(path: &Path, suffix: &str) -> Result<PathBuf, NamingError> {
    let (stem, ext) = split_name(path)?;
    Ok(path.with_file_name(format!("{stem}{suffix}.{ext}")))
}

/// Links a discovered source to one sibling it must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativePlan {
    /// 1x path of the image family.
    pub base_path: PathBuf,
    pub scale: RetinaScale,
    pub output_path: PathBuf,
}

/// Which files count as generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivativeConvention {
    /// Sources are authored at `template`; the other two scales are generated.
    Retina { template: RetinaScale },
    /// Every source gets one `<stem><suffix>.<ext>` sibling.
    Preview { suffix: String },
}

/// Naming rules for one generation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namer {
    convention: DerivativeConvention,
}

impl Namer {
    pub fn new(convention: DerivativeConvention) -> Self {
        Self { convention }
    }

    pub fn retina(template: RetinaScale) -> Self {
        Self::new(DerivativeConvention::Retina { template })
    }

    pub fn preview(suffix: impl Into<String>) -> Self {
        Self::new(DerivativeConvention::Preview {
            suffix: suffix.into(),
        })
    }

    pub fn convention(&self) -> &DerivativeConvention {
        &self.convention
    }

    /// True when `path` is something this mode writes itself.
    ///
    /// The watch loop drops every event for which this holds; a derivative's
    /// own creation must never trigger another generation. Paths that do not
    /// follow the `name.ext` shape are never derivatives.
    pub fn is_own_derivative(&self, path: &Path) -> bool {
        match &self.convention {
            DerivativeConvention::Retina { template } => {
                scale_of(path).is_ok_and(|scale| scale != *template)
            }
            DerivativeConvention::Preview { suffix } => {
                split_name(path).is_ok_and(|(stem, _)| stem.ends_with(suffix.as_str()))
            }
        }
    }

    /// Sibling paths generated for `source` under this convention.
    pub fn derivatives_of(&self, source: &Path) -> Result<Vec<PathBuf>, NamingError> {
        match &self.convention {
            DerivativeConvention::Retina { template } => RetinaScale::ALL
                .iter()
                .filter(|&&scale| scale != *template)
                .map(|&scale| derive(source, scale))
                .collect(),
            DerivativeConvention::Preview { suffix } => Ok(vec![preview_path(source, suffix)?]),
        }
    }

    /// One plan per derivative of `source`.
    ///
    /// Preview plans carry the source's own scale, since previews keep it.
    pub fn plan(&self, source: &Path) -> Result<Vec<DerivativePlan>, NamingError> {
        let base_path = strip_scale(source)?;
        match &self.convention {
            DerivativeConvention::Retina { template } => RetinaScale::ALL
                .iter()
                .filter(|&&scale| scale != *template)
                .map(|&scale| {
                    Ok(DerivativePlan {
                        base_path: base_path.clone(),
                        scale,
                        output_path: derive(source, scale)?,
                    })
                })
                .collect(),
            DerivativeConvention::Preview { suffix } => Ok(vec![DerivativePlan {
                base_path,
                scale: scale_of(source)?,
                output_path: preview_path(source, suffix)?,
            }]),
        }
    }
}

/// Plans for the two scales missing next to a supplied retina rendition.
pub fn retina_plans(supplied: &Path) -> Result<Vec<DerivativePlan>, NamingError> {
    let supplied_scale = scale_of(supplied)?;
    let base_path = strip_scale(supplied)?;
    RetinaScale::ALL
        .iter()
        .filter(|&&scale| scale != supplied_scale)
        .map(|&scale| {
            Ok(DerivativePlan {
                base_path: base_path.clone(),
                scale,
                output_path: derive(supplied, scale)?,
            })
        })
        .collect()
}
