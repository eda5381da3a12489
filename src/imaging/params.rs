//! Parameter types shared by the codec and the transforms.
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`CropRect`]: a crop window inside a resized raster.

/// Quality setting for lossy image encoding (1-100).
///
/// Only JPEG honours it; PNG, GIF, TIFF and WebP are written losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Crop window: top-left anchor plus size, in pixels of the resized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Whether the window lies entirely inside a `(width, height)` raster.
    pub fn fits_within(&self, (width, height): (u32, u32)) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}
