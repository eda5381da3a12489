//! Pure calculation functions for derivative geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Divisions floor, computed on `u64` so large frames cannot overflow, and
//! every resize result keeps at least one pixel per axis.

use super::params::CropRect;

/// `a * b / c` with a `u64` intermediate, saturating at `u32::MAX`.
fn mul_div(a: u32, b: u32, c: u32) -> u32 {
    u32::try_from(u64::from(a) * u64::from(b) / u64::from(c.max(1))).unwrap_or(u32::MAX)
}

/// Dimensions after resizing to `target_width`, keeping the aspect ratio.
pub fn fit_width(source: (u32, u32), target_width: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    (target_width, mul_div(src_h, target_width, src_w).max(1))
}

/// Dimensions after resizing to `target_height`, keeping the aspect ratio.
pub fn fit_height(source: (u32, u32), target_height: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    (mul_div(src_w, target_height, src_h).max(1), target_height)
}

/// Resize rule for the scale-only strategy.
///
/// Resizes by width when the width-fitted height reaches the target height,
/// otherwise by height. Never crops, so one axis may overshoot the target.
pub fn scale_only_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (tgt_w, tgt_h) = target;
    let by_width = fit_width(source, tgt_w);
    if by_width.1 >= tgt_h {
        by_width
    } else {
        fit_height(source, tgt_h)
    }
}

/// Resize rule for scale-then-crop.
///
/// Resize by height, unless that leaves the width short of the target, in
/// which case resize by width. Either way both axes end up at or above the
/// target, so a crop to exactly `target` always fits.
pub fn cover_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (tgt_w, tgt_h) = target;
    let by_height = fit_height(source, tgt_h);
    if by_height.0 < tgt_w {
        fit_width(source, tgt_w)
    } else {
        by_height
    }
}

/// Centered crop of `target` out of a `resized` raster.
///
/// Width excess anchors at `((rw - tw) / 2, 0)`, height excess at
/// `(0, (rh - th) / 2)`. An exact match degenerates to the full frame.
/// Returns `None` when the raster is smaller than the target on either axis.
pub fn center_crop(resized: (u32, u32), target: (u32, u32)) -> Option<CropRect> {
    let (res_w, res_h) = resized;
    let (tgt_w, tgt_h) = target;
    if res_w < tgt_w || res_h < tgt_h {
        return None;
    }
    Some(CropRect {
        x: (res_w - tgt_w) / 2,
        y: (res_h - tgt_h) / 2,
        width: tgt_w,
        height: tgt_h,
    })
}

/// Vertical-center band of `target` height, anchored at the left edge.
pub fn vertical_band(resized: (u32, u32), target: (u32, u32)) -> CropRect {
    let (_, res_h) = resized;
    let (tgt_w, tgt_h) = target;
    CropRect {
        x: 0,
        y: res_h.saturating_sub(tgt_h) / 2,
        width: tgt_w,
        height: tgt_h,
    }
}

/// Where the emblem goes on a launch-image frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmblemFrame {
    pub x: u32,
    pub y: u32,
    /// Edge of the square the emblem is drawn into.
    pub side: u32,
    /// Portrait frames size the emblem by width, landscape ones by height.
    pub fit_width: bool,
}

/// Emblem square for a `(width, height)` frame.
///
/// Portrait: `x = w/4`, `y = h/2 - x`, side `2x`. Landscape and square:
/// `y = h/4`, `x = w/2 - y`, side `2y`. The quarter is truncated before it
/// is doubled, so odd frames sit up to one pixel off true center.
pub fn emblem_frame(frame: (u32, u32)) -> EmblemFrame {
    let (w, h) = frame;
    if w < h {
        let x = w / 4;
        EmblemFrame {
            x,
            y: h / 2 - x,
            side: x * 2,
            fit_width: true,
        }
    } else {
        let y = h / 4;
        EmblemFrame {
            x: w / 2 - y,
            y,
            side: y * 2,
            fit_width: false,
        }
    }
}

/// Integer rescale between retina factors: `dims * to / from`.
pub fn retina_dimensions(source: (u32, u32), from: u32, to: u32) -> (u32, u32) {
    let (w, h) = source;
    (mul_div(w, to, from), mul_div(h, to, from))
}

/// Icon matte layout for a square of `side`: `(artwork edge, offset)`.
pub fn matte_layout(side: u32, inset_percent: u32) -> (u32, u32) {
    let inset = inset_percent.min(49);
    (mul_div(side, 100 - 2 * inset, 100), mul_div(side, inset, 100))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // fit / scale-only
    // =========================================================================

    #[test]
    fn fit_width_keeps_aspect() {
        assert_eq!(fit_width((1242, 2208), 2208), (2208, 3925));
    }

    #[test]
    fn fit_never_returns_zero() {
        assert_eq!(fit_width((1000, 1), 10), (10, 1));
        assert_eq!(fit_height((1, 1000), 10), (1, 10));
    }

    #[test]
    fn extreme_ratios_saturate() {
        assert_eq!(fit_width((1, u32::MAX), u32::MAX), (u32::MAX, u32::MAX));
        assert_eq!(fit_height((u32::MAX, 2), 4), (u32::MAX, 4));
    }

    #[test]
    fn scale_only_prefers_width_when_height_fills() {
        // 800x1200 into 620x960: by width → 620x930, short of 960 → by height
        assert_eq!(scale_only_dimensions((800, 1200), (620, 960)), (640, 960));
        // 600x1200 into 620x960: by width → 620x1240 ≥ 960
        assert_eq!(scale_only_dimensions((600, 1200), (620, 960)), (620, 1240));
    }

    // =========================================================================
    // cover + center crop
    // =========================================================================

    #[test]
    fn cover_exact_match() {
        assert_eq!(cover_dimensions((750, 1334), (750, 1334)), (750, 1334));
        assert_eq!(
            center_crop((750, 1334), (750, 1334)),
            Some(CropRect {
                x: 0,
                y: 0,
                width: 750,
                height: 1334
            })
        );
    }

    #[test]
    fn cover_wide_source_resizes_by_height() {
        // 2000x1000 into 640x1136 → by height 2272x1136
        assert_eq!(cover_dimensions((2000, 1000), (640, 1136)), (2272, 1136));
        let rect = center_crop((2272, 1136), (640, 1136)).unwrap();
        assert_eq!((rect.x, rect.y), ((2272 - 640) / 2, 0));
    }

    #[test]
    fn cover_tall_source_resizes_by_width() {
        // 1000x3000 into 1136x640 → by height 213 wide, short → by width 1136x3408
        assert_eq!(cover_dimensions((1000, 3000), (1136, 640)), (1136, 3408));
        let rect = center_crop((1136, 3408), (1136, 640)).unwrap();
        assert_eq!((rect.x, rect.y), (0, (3408 - 640) / 2));
    }

    #[test]
    fn cover_always_reaches_target() {
        let sources = [
            (1, 1),
            (1, 977),
            (977, 1),
            (3, 7),
            (640, 480),
            (4032, 3024),
            (1125, 2436),
            (999, 1001),
        ];
        let targets = [(29, 29), (1136, 640), (640, 1136), (2732, 2048), (1, 1), (7, 3)];
        for &s in &sources {
            for &t in &targets {
                let resized = cover_dimensions(s, t);
                assert!(
                    center_crop(resized, t).is_some(),
                    "{s:?} → {t:?} resized to {resized:?}"
                );
            }
        }
    }

    #[test]
    fn center_crop_rejects_small_raster() {
        assert_eq!(center_crop((100, 100), (101, 50)), None);
    }

    // =========================================================================
    // vertical band
    // =========================================================================

    #[test]
    fn vertical_band_is_centered() {
        let rect = vertical_band((2208, 3925), (2208, 1242));
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: (3925 - 1242) / 2,
                width: 2208,
                height: 1242
            }
        );
    }

    // =========================================================================
    // emblem frame
    // =========================================================================

    #[test]
    fn emblem_portrait_layout() {
        let f = emblem_frame((640, 1136));
        assert_eq!(
            f,
            EmblemFrame {
                x: 160,
                y: 408,
                side: 320,
                fit_width: true
            }
        );
    }

    #[test]
    fn emblem_landscape_layout() {
        let f = emblem_frame((1136, 640));
        assert_eq!(
            f,
            EmblemFrame {
                x: 408,
                y: 160,
                side: 320,
                fit_width: false
            }
        );
    }

    #[test]
    fn emblem_is_centered_within_one_pixel() {
        for w in 4..90u32 {
            for h in 4..90u32 {
                let f = emblem_frame((w, h));
                let cx = f.x + f.side / 2;
                let cy = f.y + f.side / 2;
                assert!(cx.abs_diff(w / 2) <= 1, "x off for {w}x{h}: {f:?}");
                assert!(cy.abs_diff(h / 2) <= 1, "y off for {w}x{h}: {f:?}");
                assert!(f.x + f.side <= w && f.y + f.side <= h, "{w}x{h}: {f:?}");
            }
        }
    }

    // =========================================================================
    // retina + matte
    // =========================================================================

    #[test]
    fn retina_from_2x() {
        assert_eq!(retina_dimensions((120, 120), 2, 1), (60, 60));
        assert_eq!(retina_dimensions((120, 120), 2, 3), (180, 180));
    }

    #[test]
    fn retina_from_3x_and_1x() {
        assert_eq!(retina_dimensions((180, 90), 3, 1), (60, 30));
        assert_eq!(retina_dimensions((180, 90), 3, 2), (120, 60));
        assert_eq!(retina_dimensions((33, 21), 1, 3), (99, 63));
    }

    #[test]
    fn matte_default_is_four_fifths() {
        assert_eq!(matte_layout(1000, 10), (800, 100));
        assert_eq!(matte_layout(1024, 10), (1024 * 4 / 5, 1024 / 10));
    }

    #[test]
    fn matte_zero_inset_is_full_size() {
        assert_eq!(matte_layout(512, 0), (512, 0));
    }
}
