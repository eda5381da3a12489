//! Image processing in pure Rust, with no system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` crate behind the [`Codec`] trait |
//! | **Resize** | `DynamicImage::resize_exact` with a bilinear filter |
//! | **Crop** | `DynamicImage::crop_imm` after an explicit bounds check |
//! | **Composite** | `imageops::overlay` (alpha-over) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: [`Quality`] and [`CropRect`]
//! - **Codec**: [`Codec`] trait + [`RustCodec`]
//! - **Strategies**: the transforms a catalog entry can name

mod calculations;
pub mod codec;
mod params;
pub mod strategies;

pub use codec::{Codec, CodecError, RustCodec, format_for_path, is_supported_image};
pub use params::{CropRect, Quality};
pub use strategies::{TransformError, apply, matte, rescale};
