//! Static catalogs of derivative geometries.
//!
//! A catalog is an ordered list of [`GeometrySpec`] records. Each record names
//! the output file, its exact pixel size, and the [`StrategyId`] that turns a
//! source image into it. Three catalogs ship with the tool:
//!
//! | Catalog | Entries | Strategy |
//! |---|---|---|
//! | [`Catalog::app_icons`] | iPhone, iPad, Watch and marketing icons | scale-crop (square) |
//! | [`Catalog::launch_images`] | portrait + landscape launch images | pad-composite |
//! | [`Catalog::launch_images_plain`] | same sizes, background only | scale-crop / rotate-scale-cut |
//!
//! Icon sources are matted first (see [`Matte`]) so the artwork sits inside a
//! white frame, matching what the App Store expects for pre-rendered icons.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Geometry '{name}' has a zero dimension ({width}x{height})")]
    EmptyGeometry {
        name: String,
        width: u32,
        height: u32,
    },
}

/// Which transform produces a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    /// Aspect-preserving resize, no crop.
    ScaleOnly,
    /// Resize to cover, then center-crop to the exact size.
    ScaleCrop,
    /// Full-bleed background plus a centered emblem.
    PadComposite,
    /// Resize by width, then cut the vertical center band.
    RotateScaleCut,
    /// Source copied through unchanged.
    Identity,
}

/// One required output: exact size, file name, and producing strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometrySpec {
    pub width: u32,
    pub height: u32,
    /// Output file name (relative to the catalog's output directory).
    pub name: String,
    pub strategy: StrategyId,
}

impl GeometrySpec {
    /// Build a spec, rejecting zero-sized targets.
    pub fn new(
        width: u32,
        height: u32,
        name: impl Into<String>,
        strategy: StrategyId,
    ) -> Result<Self, CatalogError> {
        let name = name.into();
        if width == 0 || height == 0 {
            return Err(CatalogError::EmptyGeometry {
                name,
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            name,
            strategy,
        })
    }

    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }
}

/// White inset frame applied to an icon source before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matte {
    /// Margin on each side, as a percentage of the source width.
    pub inset_percent: u32,
    pub color: [u8; 3],
}

impl Default for Matte {
    fn default() -> Self {
        Self {
            inset_percent: 10,
            color: [255, 255, 255],
        }
    }
}

/// An ordered set of geometries generated together.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub name: &'static str,
    pub entries: Vec<GeometrySpec>,
    pub matte: Option<Matte>,
}

/// Square icon sizes: (edge length, file name).
const APP_ICONS: &[(u32, &str)] = &[
    // Settings
    (29, "Icon-29x29.png"),
    (58, "Icon-29x29@2x.png"),
    (87, "Icon-29x29@3x.png"),
    // Spotlight
    (40, "Icon-40x40.png"),
    (80, "Icon-40x40@2x.png"),
    (120, "Icon-40x40@3x.png"),
    // iPad home screen
    (76, "Icon-76x76.png"),
    (152, "Icon-76x76@2x.png"),
    // iPad Pro home screen
    (167, "Icon-83.5x83.5@2x.png"),
    // iPhone notifications and home screen
    (20, "Icon-20x20.png"),
    (40, "Icon-20x20@2x.png"),
    (60, "Icon-20x20@3x.png"),
    (120, "Icon-60x60@2x.png"),
    (180, "Icon-60x60@3x.png"),
    // Watch
    (48, "Icon-24@2x.png"),
    (55, "Icon-27.5@2x.png"),
    (58, "Icon-29@2x.png"),
    (80, "Icon-40@2x.png"),
    (87, "Icon-29@3x.png"),
    (88, "Icon-44@2x.png"),
    (172, "Icon-86@2x.png"),
    (196, "Icon-98@2x.png"),
    // App Store
    (1024, "iTunesArtwork@2x.png"),
];

/// Launch image sizes: (width, height, file name).
const LAUNCH_IMAGES: &[(u32, u32, &str)] = &[
    (640, 1136, "Default-568h@2x~iphone.png"),
    (1136, 640, "Default-Landscape-568h@2x~iphone.png"),
    (750, 1334, "Default-375w-667h@2x~iphone.png"),
    (1334, 750, "Default-Landscape-375w-667h@2x~iphone.png"),
    (1242, 2208, "Default-414w-736h@3x~iphone.png"),
    (2208, 1242, "Default-Landscape-414w-736h@3x~iphone.png"),
    (768, 1024, "Default-Portrait~ipad.png"),
    (1024, 768, "Default-Landscape~ipad.png"),
    (1536, 2048, "Default-Portrait@2x~ipad.png"),
    (2048, 1536, "Default-Landscape@2x~ipad.png"),
    (1668, 2224, "Default-Portrait-1112@2x.png"),
    (2224, 1668, "Default-Landscape-1112@2x.png"),
    (1125, 2436, "Default-375w-812h@3x.png"),
    (2436, 1125, "Default-Landscape-375w-812h@3x.png"),
    (2048, 2732, "Default-Portrait@2x.png"),
    (2732, 2048, "Default-Landscape@2x.png"),
];

fn spec(width: u32, height: u32, name: &str, strategy: StrategyId) -> GeometrySpec {
    GeometrySpec {
        width,
        height,
        name: name.to_string(),
        strategy,
    }
}

impl Catalog {
    /// iOS app icon set. Sources are matted before resizing.
    pub fn app_icons() -> Self {
        Self {
            name: "app-icons",
            entries: APP_ICONS
                .iter()
                .map(|&(edge, name)| spec(edge, edge, name, StrategyId::ScaleCrop))
                .collect(),
            matte: Some(Matte::default()),
        }
    }

    /// Launch images: background filled to the frame, emblem centered on top.
    pub fn launch_images() -> Self {
        Self {
            name: "launch-images",
            entries: LAUNCH_IMAGES
                .iter()
                .map(|&(w, h, name)| spec(w, h, name, StrategyId::PadComposite))
                .collect(),
            matte: None,
        }
    }

    /// Launch images from a single portrait artwork, without an emblem.
    ///
    /// Landscape frames cut the vertical center band out of the width-fitted
    /// portrait artwork instead of cropping its sides away.
    pub fn launch_images_plain() -> Self {
        Self {
            name: "launch-images",
            entries: LAUNCH_IMAGES
                .iter()
                .map(|&(w, h, name)| {
                    let strategy = if w < h {
                        StrategyId::ScaleCrop
                    } else {
                        StrategyId::RotateScaleCut
                    };
                    spec(w, h, name, strategy)
                })
                .collect(),
            matte: None,
        }
    }

    /// Replace the matte (or drop it with `None`).
    pub fn with_matte(mut self, matte: Option<Matte>) -> Self {
        self.matte = matte;
        self
    }

    /// Append extra entries, validating each.
    pub fn with_extra(mut self, extra: &[GeometrySpec]) -> Result<Self, CatalogError> {
        for entry in extra {
            self.entries.push(GeometrySpec::new(
                entry.width,
                entry.height,
                entry.name.clone(),
                entry.strategy,
            )?);
        }
        Ok(self)
    }

    pub fn find(&self, name: &str) -> Option<&GeometrySpec> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_catalogs() -> Vec<Catalog> {
        vec![
            Catalog::app_icons(),
            Catalog::launch_images(),
            Catalog::launch_images_plain(),
        ]
    }

    #[test]
    fn every_entry_has_positive_dimensions() {
        for catalog in all_catalogs() {
            for e in &catalog.entries {
                assert!(e.width > 0 && e.height > 0, "{}", e.name);
            }
        }
    }

    #[test]
    fn file_names_are_unique_per_catalog() {
        for catalog in all_catalogs() {
            let names: HashSet<&str> = catalog.entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names.len(), catalog.entries.len(), "{}", catalog.name);
        }
    }

    #[test]
    fn app_icons_are_square_and_matted() {
        let catalog = Catalog::app_icons();
        assert_eq!(catalog.entries.len(), 23);
        assert!(catalog.entries.iter().all(|e| e.width == e.height));
        assert_eq!(catalog.matte, Some(Matte::default()));
        assert_eq!(catalog.find("iTunesArtwork@2x.png").unwrap().width, 1024);
    }

    #[test]
    fn launch_images_come_in_orientation_pairs() {
        let catalog = Catalog::launch_images();
        assert_eq!(catalog.entries.len(), 16);
        for pair in catalog.entries.chunks(2) {
            assert_eq!(pair[0].width, pair[1].height);
            assert_eq!(pair[0].height, pair[1].width);
            assert!(pair[0].is_portrait());
        }
        assert!(
            catalog
                .entries
                .iter()
                .all(|e| e.strategy == StrategyId::PadComposite)
        );
    }

    #[test]
    fn plain_launch_images_cut_landscape_frames() {
        let catalog = Catalog::launch_images_plain();
        let landscape = catalog
            .find("Default-Landscape-414w-736h@3x~iphone.png")
            .unwrap();
        assert_eq!(landscape.strategy, StrategyId::RotateScaleCut);
        let portrait = catalog.find("Default-414w-736h@3x~iphone.png").unwrap();
        assert_eq!(portrait.strategy, StrategyId::ScaleCrop);
    }

    #[test]
    fn geometry_new_rejects_zero() {
        let err = GeometrySpec::new(0, 10, "bad.png", StrategyId::ScaleOnly).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyGeometry { width: 0, .. }));
    }

    #[test]
    fn with_extra_appends_validated_entries() {
        let extra = vec![spec(512, 512, "iTunesArtwork.png", StrategyId::Identity)];
        let catalog = Catalog::app_icons().with_extra(&extra).unwrap();
        assert_eq!(catalog.entries.len(), 24);
        assert_eq!(
            catalog.find("iTunesArtwork.png").unwrap().strategy,
            StrategyId::Identity
        );

        let bad = vec![spec(0, 512, "broken.png", StrategyId::ScaleCrop)];
        assert!(Catalog::app_icons().with_extra(&bad).is_err());
    }

    #[test]
    fn strategy_ids_deserialize_from_kebab_case() {
        let s: GeometrySpec = toml::from_str(
            r#"
            width = 64
            height = 32
            name = "banner.png"
            strategy = "rotate-scale-cut"
            "#,
        )
        .unwrap();
        assert_eq!(s.strategy, StrategyId::RotateScaleCut);
    }
}
