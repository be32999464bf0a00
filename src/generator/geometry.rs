//! Target-size arithmetic for the four operations.
//!
//! Kept free of pixel data so the sizing rules can be tested directly.

use crate::spec::Anchor;

/// Size and placement of a crop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crop region for a `w`x`h` request on a `src_w`x`src_h` source.
///
/// A missing side copies the other one. The region is clamped to the
/// source; without an explicit origin it is centered.
#[must_use]
pub fn crop_region(
    (src_w, src_h): (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    origin: (Option<u32>, Option<u32>),
) -> CropRegion {
    let w = width.or(height).unwrap_or(src_w).min(src_w);
    let h = height.or(width).unwrap_or(src_h).min(src_h);

    let max_x = src_w - w;
    let max_y = src_h - h;
    let x = origin.0.map_or(max_x / 2, |x| x.min(max_x));
    let y = origin.1.map_or(max_y / 2, |y| y.min(max_y));

    CropRegion {
        x,
        y,
        width: w,
        height: h,
    }
}

fn scaled(side: u32, factor: f64) -> u32 {
    ((f64::from(side) * factor).round() as u32).max(1)
}

/// Largest aspect-preserving size that fits inside the box. A missing side
/// does not constrain.
#[must_use]
pub fn fit_within((src_w, src_h): (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let fx = width.map(|w| f64::from(w) / f64::from(src_w));
    let fy = height.map(|h| f64::from(h) / f64::from(src_h));
    let factor = match (fx, fy) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => 1.0,
    };
    (scaled(src_w, factor), scaled(src_h, factor))
}

/// Exact resize target; a missing side follows the source aspect ratio.
#[must_use]
pub fn resize_to((src_w, src_h): (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled(src_h, f64::from(w) / f64::from(src_w))),
        (None, Some(h)) => (scaled(src_w, f64::from(h) / f64::from(src_h)), h),
        (None, None) => (src_w, src_h),
    }
}

/// Canvas size for a resize-canvas request.
#[must_use]
pub fn canvas_size(
    (src_w, src_h): (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    relative: bool,
) -> (u32, u32) {
    if relative {
        (
            src_w.saturating_add(width.unwrap_or(0)),
            src_h.saturating_add(height.unwrap_or(0)),
        )
    } else {
        (width.unwrap_or(src_w), height.unwrap_or(src_h))
    }
}

/// Offset of the source's top-left corner on the canvas. Negative values
/// mean the source is cropped on that side.
#[must_use]
pub fn canvas_offset(src: (u32, u32), canvas: (u32, u32), anchor: Anchor) -> (i64, i64) {
    let (fx, fy) = anchor.factors();
    let place = |src: u32, canvas: u32, factor: u8| {
        let free = i64::from(canvas) - i64::from(src);
        match factor {
            0 => 0,
            1 => free / 2,
            _ => free,
        }
    };
    (place(src.0, canvas.0, fx), place(src.1, canvas.1, fy))
}
