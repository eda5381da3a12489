//! Image codec trait and the `image`-crate implementation.
//!
//! The [`Codec`] trait is the seam between pixel work and bytes: the batch
//! driver reads a file, hands the bytes to [`Codec::decode`], runs its
//! transforms on the raster, and writes whatever [`Codec::encode`] returns.
//! Swapping in a mock codec lets the driver be tested without real images.
//!
//! ## Format mapping
//!
//! | Extension | Format | Encoding |
//! |---|---|---|
//! | `png` | PNG | lossless, RGBA8 |
//! | `jpg`, `jpeg` | JPEG | lossy, RGB8, honours [`Quality`] |
//! | `gif` | GIF | RGBA8 |
//! | `webp` | WebP | lossless, RGBA8 |
//! | `tif`, `tiff` | TIFF | RGBA8 |

use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Decode and encode rasters.
///
/// Implementations must be deterministic: the same raster, format and
/// quality always encode to the same bytes. Re-running a batch relies on it.
pub trait Codec: Sync {
    /// Decode bytes, sniffing the format from the content.
    fn decode(&self, bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), CodecError>;

    /// Encode a raster in `format`.
    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError>;
}

const FORMATS: &[(&str, ImageFormat)] = &[
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    FORMATS
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// File extensions the built-in codec can both read and write.
pub fn supported_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

fn is_supported_format(format: ImageFormat) -> bool {
    FORMATS.iter().any(|(_, f)| *f == format)
}

/// Output format implied by a path's extension.
pub fn format_for_path(path: &Path) -> Result<ImageFormat, CodecError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    FORMATS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, f)| *f)
        .ok_or_else(|| CodecError::UnsupportedFormat(format!("'.{ext}' ({})", path.display())))
}

/// Whether a path looks like an image this tool can process.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Codec backed by the pure-Rust `image` crate decoders and encoders.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), CodecError> {
        let format = image::guess_format(bytes)
            .map_err(|e| CodecError::UnsupportedFormat(e.to_string()))?;
        if !is_supported_format(format) {
            return Err(CodecError::UnsupportedFormat(format!("{format:?}")));
        }
        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok((img, format))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError> {
        let mut buf = Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
            f if is_supported_format(f) => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut buf, f)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
            other => return Err(CodecError::UnsupportedFormat(format!("{other:?}"))),
        }
        Ok(buf.into_inner())
    }
}
