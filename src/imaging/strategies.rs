//! Transform strategies: source raster + target geometry → output raster.
//!
//! Every strategy is a pure function. File I/O, encoding and error reporting
//! happen in the batch driver; a strategy only ever sees rasters. All
//! resampling goes through [`RESAMPLE_FILTER`] so outputs are reproducible.
//!
//! | Strategy | Resize | Crop | Exact size |
//! |---|---|---|---|
//! | [`scale_only`] | width or height, whichever fills | none | no |
//! | [`scale_crop`] | cover | centered | yes |
//! | [`pad_composite`] | cover (background) | centered | yes |
//! | [`rotate_scale_cut`] | width | vertical center band | yes, or `CropOutOfBounds` |
//! | [`identity`] | none | none | source size |

use super::calculations::{
    center_crop, cover_dimensions, emblem_frame, fit_height, fit_width, matte_layout,
    retina_dimensions, scale_only_dimensions, vertical_band,
};
use super::params::CropRect;
use crate::catalog::{GeometrySpec, Matte, StrategyId};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use thiserror::Error;

/// The single resampling filter used everywhere (bilinear).
pub const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error(
        "Crop {}x{} at ({}, {}) exceeds resized image {width}x{height}",
        .rect.width, .rect.height, .rect.x, .rect.y
    )]
    CropOutOfBounds {
        rect: CropRect,
        width: u32,
        height: u32,
    },
    #[error("Source image has no pixels")]
    EmptySource,
    #[error("Target size {width}x{height} is empty")]
    EmptyTarget { width: u32, height: u32 },
}

/// Run the strategy named by `geometry`.
///
/// `emblem` is only consulted by [`StrategyId::PadComposite`].
pub fn apply(
    geometry: &GeometrySpec,
    source: &DynamicImage,
    emblem: Option<&DynamicImage>,
) -> Result<DynamicImage, TransformError> {
    match geometry.strategy {
        StrategyId::ScaleOnly => scale_only(source, geometry),
        StrategyId::ScaleCrop => scale_crop(source, geometry),
        StrategyId::PadComposite => pad_composite(source, geometry, emblem),
        StrategyId::RotateScaleCut => rotate_scale_cut(source, geometry),
        StrategyId::Identity => Ok(identity(source)),
    }
}

fn dims(img: &DynamicImage) -> (u32, u32) {
    img.dimensions()
}

fn check_inputs(source: &DynamicImage, geometry: &GeometrySpec) -> Result<(), TransformError> {
    if geometry.width == 0 || geometry.height == 0 {
        return Err(TransformError::EmptyTarget {
            width: geometry.width,
            height: geometry.height,
        });
    }
    if source.width() == 0 || source.height() == 0 {
        return Err(TransformError::EmptySource);
    }
    Ok(())
}

fn resize(img: &DynamicImage, (width, height): (u32, u32)) -> DynamicImage {
    if dims(img) == (width, height) {
        return img.clone();
    }
    img.resize_exact(width, height, RESAMPLE_FILTER)
}

fn crop(img: &DynamicImage, rect: CropRect) -> Result<DynamicImage, TransformError> {
    let (width, height) = dims(img);
    if !rect.fits_within((width, height)) {
        return Err(TransformError::CropOutOfBounds {
            rect,
            width,
            height,
        });
    }
    if (rect.x, rect.y, rect.width, rect.height) == (0, 0, width, height) {
        return Ok(img.clone());
    }
    Ok(img.crop_imm(rect.x, rect.y, rect.width, rect.height))
}

/// Resize keeping the aspect ratio so the target is filled on one axis.
/// No cropping; the other axis may overshoot.
pub fn scale_only(
    source: &DynamicImage,
    geometry: &GeometrySpec,
) -> Result<DynamicImage, TransformError> {
    check_inputs(source, geometry)?;
    let size = scale_only_dimensions(dims(source), (geometry.width, geometry.height));
    Ok(resize(source, size))
}

/// Resize to cover the target, then center-crop to exactly its size.
pub fn scale_crop(
    source: &DynamicImage,
    geometry: &GeometrySpec,
) -> Result<DynamicImage, TransformError> {
    check_inputs(source, geometry)?;
    let target = (geometry.width, geometry.height);
    let resized = resize(source, cover_dimensions(dims(source), target));
    let rect = center_crop(dims(&resized), target).ok_or(TransformError::CropOutOfBounds {
        rect: CropRect {
            x: 0,
            y: 0,
            width: target.0,
            height: target.1,
        },
        width: resized.width(),
        height: resized.height(),
    })?;
    crop(&resized, rect)
}

/// Full-bleed background with an emblem centered on top.
///
/// The background is handled exactly like [`scale_crop`]. The emblem is
/// resized along the frame's short axis to twice a quarter of it and drawn,
/// alpha-blended and clipped, into the square from
/// [`emblem_frame`](super::calculations::emblem_frame). Without an emblem the
/// result is the background alone.
pub fn pad_composite(
    background: &DynamicImage,
    geometry: &GeometrySpec,
    emblem: Option<&DynamicImage>,
) -> Result<DynamicImage, TransformError> {
    let mut canvas: RgbaImage = scale_crop(background, geometry)?.to_rgba8();

    let Some(emblem) = emblem else {
        return Ok(DynamicImage::ImageRgba8(canvas));
    };
    let frame = emblem_frame((geometry.width, geometry.height));
    if frame.side == 0 || emblem.width() == 0 || emblem.height() == 0 {
        return Ok(DynamicImage::ImageRgba8(canvas));
    }

    let size = if frame.fit_width {
        fit_width(dims(emblem), frame.side)
    } else {
        fit_height(dims(emblem), frame.side)
    };
    let resized = resize(emblem, size);
    let clipped = resized.crop_imm(
        0,
        0,
        resized.width().min(frame.side),
        resized.height().min(frame.side),
    );
    imageops::overlay(
        &mut canvas,
        &clipped.to_rgba8(),
        i64::from(frame.x),
        i64::from(frame.y),
    );
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Resize by width only, then keep the vertical center band.
///
/// Meant for landscape frames cut from portrait artwork. Fails with
/// `CropOutOfBounds` when the width-fitted image is shorter than the frame.
pub fn rotate_scale_cut(
    source: &DynamicImage,
    geometry: &GeometrySpec,
) -> Result<DynamicImage, TransformError> {
    check_inputs(source, geometry)?;
    let target = (geometry.width, geometry.height);
    let resized = resize(source, fit_width(dims(source), geometry.width));
    crop(&resized, vertical_band(dims(&resized), target))
}

pub fn identity(source: &DynamicImage) -> DynamicImage {
    source.clone()
}

/// Place icon artwork inside a solid square frame.
///
/// The canvas edge is the source width. The artwork is squeezed into a
/// square `inset_percent` in from every side.
pub fn matte(source: &DynamicImage, matte: &Matte) -> Result<DynamicImage, TransformError> {
    if source.width() == 0 || source.height() == 0 {
        return Err(TransformError::EmptySource);
    }
    let side = source.width();
    let [r, g, b] = matte.color;
    let mut canvas = RgbaImage::from_pixel(side, side, Rgba([r, g, b, 255]));
    let (edge, offset) = matte_layout(side, matte.inset_percent);
    if edge > 0 {
        let art = resize(source, (edge, edge)).to_rgba8();
        imageops::overlay(&mut canvas, &art, i64::from(offset), i64::from(offset));
    }
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Rescale between retina factors with integer math: `size * to / from`.
pub fn rescale(source: &DynamicImage, from: u32, to: u32) -> Result<DynamicImage, TransformError> {
    if source.width() == 0 || source.height() == 0 {
        return Err(TransformError::EmptySource);
    }
    let (width, height) = retina_dimensions(dims(source), from, to);
    if width == 0 || height == 0 {
        return Err(TransformError::EmptyTarget { width, height });
    }
    Ok(resize(source, (width, height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient, solid};
    use image::RgbImage;

    fn geometry(width: u32, height: u32, strategy: StrategyId) -> GeometrySpec {
        GeometrySpec::new(width, height, "out.png", strategy).unwrap()
    }

    /// Bounding box `(x0, y0, x1, y1)` (exclusive) of pixels with a strong red channel.
    fn red_bounds(img: &DynamicImage) -> (u32, u32, u32, u32) {
        let rgba = img.to_rgba8();
        let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
        for (x, y, p) in rgba.enumerate_pixels() {
            if p[0] > 128 && p[1] < 64 {
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x + 1);
                y1 = y1.max(y + 1);
            }
        }
        (x0, y0, x1, y1)
    }

    // =========================================================================
    // scale-only
    // =========================================================================

    #[test]
    fn scale_only_fills_larger_axis_without_crop() {
        let out = scale_only(&gradient(800, 1200), &geometry(620, 960, StrategyId::ScaleOnly))
            .unwrap();
        assert_eq!(out.dimensions(), (640, 960));
    }

    // =========================================================================
    // scale-crop
    // =========================================================================

    #[test]
    fn scale_crop_exact_match_is_untouched() {
        let src = gradient(750, 1334);
        let out = scale_crop(&src, &geometry(750, 1334, StrategyId::ScaleCrop)).unwrap();
        assert_eq!(out.dimensions(), (750, 1334));
        assert_eq!(out.to_rgb8(), src.to_rgb8());
    }

    #[test]
    fn scale_crop_always_hits_target() {
        let sources = [(1, 1), (3, 500), (500, 3), (640, 480), (1000, 1001)];
        let targets = [(29, 29), (1136, 640), (640, 1136), (7, 3)];
        for &(sw, sh) in &sources {
            for &(tw, th) in &targets {
                let out = scale_crop(&gradient(sw, sh), &geometry(tw, th, StrategyId::ScaleCrop))
                    .unwrap();
                assert_eq!(out.dimensions(), (tw, th), "{sw}x{sh} → {tw}x{th}");
            }
        }
    }

    #[test]
    fn scale_crop_rejects_empty_source() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let err = scale_crop(&empty, &geometry(10, 10, StrategyId::ScaleCrop)).unwrap_err();
        assert_eq!(err, TransformError::EmptySource);
    }

    // =========================================================================
    // rotate-scale-cut
    // =========================================================================

    #[test]
    fn rotate_scale_cut_landscape_from_portrait() {
        let out = rotate_scale_cut(
            &gradient(1242, 2208),
            &geometry(2208, 1242, StrategyId::RotateScaleCut),
        )
        .unwrap();
        assert_eq!(out.dimensions(), (2208, 1242));
    }

    #[test]
    fn rotate_scale_cut_keeps_vertical_center_band() {
        let src = gradient(124, 220);
        let out = rotate_scale_cut(&src, &geometry(220, 124, StrategyId::RotateScaleCut))
            .unwrap();
        // Width-fitted to 220x390, band anchored at (0, (390 - 124) / 2).
        let resized = src.resize_exact(220, 390, RESAMPLE_FILTER);
        let expected = resized.crop_imm(0, 133, 220, 124);
        assert_eq!(out.to_rgb8(), expected.to_rgb8());
    }

    #[test]
    fn rotate_scale_cut_fails_when_too_short() {
        // 400x100 fitted to width 400 stays 100 tall; a 400x300 band cannot fit.
        let err = rotate_scale_cut(
            &gradient(400, 100),
            &geometry(400, 300, StrategyId::RotateScaleCut),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransformError::CropOutOfBounds {
                width: 400,
                height: 100,
                ..
            }
        ));
    }

    // =========================================================================
    // pad-composite
    // =========================================================================

    #[test]
    fn pad_composite_output_matches_frame() {
        let bg = solid(300, 300, [0, 0, 0, 255]);
        let emblem = solid(10, 10, [255, 0, 0, 255]);
        let out = pad_composite(
            &bg,
            &geometry(640, 1136, StrategyId::PadComposite),
            Some(&emblem),
        )
        .unwrap();
        assert_eq!(out.dimensions(), (640, 1136));
    }

    #[test]
    fn pad_composite_emblem_is_centered_portrait() {
        let bg = solid(50, 50, [0, 0, 0, 255]);
        let emblem = solid(10, 10, [255, 0, 0, 255]);
        let (w, h) = (101, 203);
        let out =
            pad_composite(&bg, &geometry(w, h, StrategyId::PadComposite), Some(&emblem)).unwrap();
        let (x0, y0, x1, y1) = red_bounds(&out);
        assert_eq!((x0, y0, x1 - x0, y1 - y0), (25, 76, 50, 50));
        assert!(((x0 + x1) / 2).abs_diff(w / 2) <= 1);
        assert!(((y0 + y1) / 2).abs_diff(h / 2) <= 1);
    }

    #[test]
    fn pad_composite_emblem_is_centered_landscape() {
        let bg = solid(50, 50, [0, 0, 0, 255]);
        let emblem = solid(10, 10, [255, 0, 0, 255]);
        let (w, h) = (1136, 640);
        let out =
            pad_composite(&bg, &geometry(w, h, StrategyId::PadComposite), Some(&emblem)).unwrap();
        let (x0, y0, x1, y1) = red_bounds(&out);
        assert_eq!((x0, y0, x1 - x0, y1 - y0), (408, 160, 320, 320));
        assert!(((x0 + x1) / 2).abs_diff(w / 2) <= 1);
        assert!(((y0 + y1) / 2).abs_diff(h / 2) <= 1);
    }

    #[test]
    fn pad_composite_clips_tall_emblem_to_square() {
        let bg = solid(50, 50, [0, 0, 0, 255]);
        let emblem = solid(10, 40, [255, 0, 0, 255]);
        let out = pad_composite(
            &bg,
            &geometry(400, 800, StrategyId::PadComposite),
            Some(&emblem),
        )
        .unwrap();
        let (x0, y0, x1, y1) = red_bounds(&out);
        assert_eq!((x0, y0, x1 - x0, y1 - y0), (100, 300, 200, 200));
    }

    #[test]
    fn pad_composite_transparent_emblem_keeps_background() {
        let bg = solid(64, 128, [0, 0, 255, 255]);
        let emblem = solid(10, 10, [255, 0, 0, 0]);
        let out = pad_composite(
            &bg,
            &geometry(64, 128, StrategyId::PadComposite),
            Some(&emblem),
        )
        .unwrap()
        .to_rgba8();
        assert!(out.pixels().all(|p| p.0 == [0, 0, 255, 255]));
    }

    #[test]
    fn pad_composite_without_emblem_is_background_only() {
        let bg = gradient(200, 300);
        let g = geometry(100, 150, StrategyId::PadComposite);
        let composed = pad_composite(&bg, &g, None).unwrap();
        let cropped = scale_crop(&bg, &g).unwrap();
        assert_eq!(composed.to_rgba8(), cropped.to_rgba8());
    }

    // =========================================================================
    // identity, matte, rescale, dispatch
    // =========================================================================

    #[test]
    fn identity_returns_source() {
        let src = gradient(12, 34);
        let out = apply(&geometry(1, 1, StrategyId::Identity), &src, None).unwrap();
        assert_eq!(out.to_rgb8(), src.to_rgb8());
    }

    #[test]
    fn apply_dispatches_by_strategy() {
        let src = gradient(300, 200);
        let out = apply(&geometry(100, 100, StrategyId::ScaleCrop), &src, None).unwrap();
        assert_eq!(out.dimensions(), (100, 100));
        let out = apply(&geometry(100, 100, StrategyId::ScaleOnly), &src, None).unwrap();
        assert_eq!(out.dimensions(), (150, 100));
    }

    #[test]
    fn matte_frames_artwork() {
        let art = solid(100, 100, [255, 0, 0, 255]);
        let framed = matte(&art, &Matte::default()).unwrap();
        assert_eq!(framed.dimensions(), (100, 100));
        let rgba = framed.to_rgba8();
        assert_eq!(rgba.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(rgba.get_pixel(9, 50).0, [255, 255, 255, 255]);
        assert!(rgba.get_pixel(50, 50)[0] > 250);
        assert_eq!(red_bounds(&framed), (10, 10, 90, 90));
    }

    #[test]
    fn matte_canvas_follows_source_width() {
        let framed = matte(&gradient(120, 80), &Matte::default()).unwrap();
        assert_eq!(framed.dimensions(), (120, 120));
    }

    #[test]
    fn rescale_from_2x() {
        let src = gradient(120, 120);
        assert_eq!(rescale(&src, 2, 1).unwrap().dimensions(), (60, 60));
        assert_eq!(rescale(&src, 2, 3).unwrap().dimensions(), (180, 180));
    }

    #[test]
    fn rescale_to_nothing_is_an_error() {
        let err = rescale(&gradient(2, 2), 3, 1).unwrap_err();
        assert_eq!(
            err,
            TransformError::EmptyTarget {
                width: 0,
                height: 0
            }
        );
    }

    #[test]
    fn transforms_are_deterministic() {
        let src = gradient(333, 517);
        let g = geometry(120, 90, StrategyId::ScaleCrop);
        assert_eq!(
            scale_crop(&src, &g).unwrap().to_rgb8(),
            scale_crop(&src, &g).unwrap().to_rgb8()
        );
    }
}
