//! `Contents.json` for the generated `AppIcon.appiconset`.
//!
//! Xcode reads this manifest to map each icon file to the device idiom,
//! point size and scale it serves. The table below covers the files in
//! [`Catalog::app_icons`](crate::catalog::Catalog::app_icons); icons are
//! marked pre-rendered so the system adds no gloss.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

pub const CONTENTS_FILE: &str = "Contents.json";

/// One icon slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconSlot {
    pub size: &'static str,
    pub idiom: &'static str,
    pub filename: &'static str,
    pub scale: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Properties {
    #[serde(rename = "pre-rendered")]
    pub pre_rendered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contents {
    pub images: Vec<IconSlot>,
    pub properties: Properties,
}

const fn slot(
    size: &'static str,
    idiom: &'static str,
    filename: &'static str,
    scale: &'static str,
) -> IconSlot {
    IconSlot {
        size,
        idiom,
        filename,
        scale,
        role: None,
        subtype: None,
    }
}

const fn watch(
    size: &'static str,
    filename: &'static str,
    scale: &'static str,
    role: &'static str,
    subtype: Option<&'static str>,
) -> IconSlot {
    IconSlot {
        size,
        idiom: "watch",
        filename,
        scale,
        role: Some(role),
        subtype,
    }
}

const SLOTS: &[IconSlot] = &[
    slot("20x20", "iphone", "Icon-20x20@2x.png", "2x"),
    slot("20x20", "iphone", "Icon-20x20@3x.png", "3x"),
    slot("29x29", "iphone", "Icon-29x29@2x.png", "2x"),
    slot("29x29", "iphone", "Icon-29x29@3x.png", "3x"),
    slot("40x40", "iphone", "Icon-40x40@2x.png", "2x"),
    slot("40x40", "iphone", "Icon-40x40@3x.png", "3x"),
    slot("60x60", "iphone", "Icon-60x60@2x.png", "2x"),
    slot("60x60", "iphone", "Icon-60x60@3x.png", "3x"),
    slot("20x20", "ipad", "Icon-20x20.png", "1x"),
    slot("20x20", "ipad", "Icon-20x20@2x.png", "2x"),
    slot("29x29", "ipad", "Icon-29x29.png", "1x"),
    slot("29x29", "ipad", "Icon-29x29@2x.png", "2x"),
    slot("40x40", "ipad", "Icon-40x40.png", "1x"),
    slot("40x40", "ipad", "Icon-40x40@2x.png", "2x"),
    slot("76x76", "ipad", "Icon-76x76.png", "1x"),
    slot("76x76", "ipad", "Icon-76x76@2x.png", "2x"),
    slot("83.5x83.5", "ipad", "Icon-83.5x83.5@2x.png", "2x"),
    slot("1024x1024", "ios-marketing", "iTunesArtwork@2x.png", "1x"),
    watch("24x24", "Icon-24@2x.png", "2x", "notificationCenter", Some("38mm")),
    watch("27.5x27.5", "Icon-27.5@2x.png", "2x", "notificationCenter", Some("42mm")),
    watch("29x29", "Icon-29@2x.png", "2x", "companionSettings", None),
    watch("29x29", "Icon-29@3x.png", "3x", "companionSettings", None),
    watch("40x40", "Icon-40@2x.png", "2x", "appLauncher", Some("38mm")),
    watch("44x44", "Icon-44@2x.png", "2x", "longLook", Some("42mm")),
    watch("86x86", "Icon-86@2x.png", "2x", "quickLook", Some("38mm")),
    watch("98x98", "Icon-98@2x.png", "2x", "quickLook", Some("42mm")),
];

pub fn contents() -> Contents {
    Contents {
        images: SLOTS.to_vec(),
        properties: Properties { pre_rendered: true },
    }
}

/// Write `Contents.json` into `dir`, returning its path.
pub fn write_contents_json(dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(CONTENTS_FILE);
    let json = serde_json::to_string_pretty(&contents())?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use tempfile::TempDir;

    #[test]
    fn every_slot_names_a_catalog_file() {
        let catalog = Catalog::app_icons();
        for slot in SLOTS {
            assert!(
                catalog.find(slot.filename).is_some(),
                "{} missing from catalog",
                slot.filename
            );
        }
    }

    #[test]
    fn slot_pixel_size_matches_catalog() {
        let catalog = Catalog::app_icons();
        for slot in SLOTS {
            let points: f64 = slot.size.split('x').next().unwrap().parse().unwrap();
            let scale: f64 = slot.scale.trim_end_matches('x').parse().unwrap();
            // Marketing icons are listed at 1x with their pixel size
            let expected = (points * scale) as u32;
            let entry = catalog.find(slot.filename).unwrap();
            assert_eq!(entry.width, expected, "{}", slot.filename);
        }
    }

    #[test]
    fn json_shape() {
        let value = serde_json::to_value(contents()).unwrap();
        assert_eq!(value["properties"]["pre-rendered"], true);
        let images = value["images"].as_array().unwrap();
        assert_eq!(images.len(), SLOTS.len());
        assert!(images[0].get("role").is_none());
        let watch_slot = images
            .iter()
            .find(|i| i["filename"] == "Icon-24@2x.png")
            .unwrap();
        assert_eq!(watch_slot["role"], "notificationCenter");
        assert_eq!(watch_slot["subtype"], "38mm");
    }

    #[test]
    fn write_contents_json_creates_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_contents_json(tmp.path()).unwrap();
        assert_eq!(path, tmp.path().join("Contents.json"));
        let text = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["images"][0]["filename"], "Icon-20x20@2x.png");
    }
}
