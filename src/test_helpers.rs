//! Shared test utilities for the assetgen test suite.
//!
//! Provides raster builders, fixture writers, and report assertions used by
//! the batch and watch tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let src = write_png(tmp.path(), "icon@2x.png", 120, 120);
//! let report = driver.derive_retina(&src, RetinaScale::X2);
//! assert_written_names(&report, &["icon.png", "icon@3x.png"]);
//! ```

use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

use crate::batch::BatchReport;

// =========================================================================
// Rasters
// =========================================================================

/// RGB gradient; every pixel differs from its neighbours.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

/// Single-color RGBA raster.
pub fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
}

// =========================================================================
// Fixture files
// =========================================================================

/// Write a gradient PNG at `dir/name`, creating parent directories.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    gradient(width, height).save(&path).unwrap();
    path
}

/// Write placeholder bytes; enough for a mock codec.
pub fn write_dummy(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, name.as_bytes()).unwrap();
    path
}

// =========================================================================
// Report assertions
// =========================================================================

/// File names (not full paths) of everything a report wrote, sorted.
pub fn written_names(report: &BatchReport) -> Vec<String> {
    let mut names: Vec<String> = report
        .written
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert the report wrote exactly `expected` (order-insensitive) and failed nothing.
pub fn assert_written_names(report: &BatchReport, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert!(
        report.failed.is_empty(),
        "unexpected failures: {:?}",
        report.failed
    );
    assert_eq!(written_names(report), expected);
}
