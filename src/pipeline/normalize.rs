//! Page-image size normalisation.
//!
//! Vision APIs reject images that are too large, too small or too
//! elongated. Every rendered page is brought inside these limits before it
//! is published:
//!
//! | Constraint | Limit |
//! |------------|-------|
//! | long edge  | ≤ 2240 px |
//! | short edge | ≥ 4 px |
//! | long / short | ≤ 5 |
//!
//! The arithmetic lives in [`normalize_dimensions`] (pure, integer-only) so
//! it can be tested without touching pixels; [`normalize_image`] applies the
//! result with a single Lanczos3 resample.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Maximum length of the longer edge in pixels.
pub const MAX_LONG_EDGE: u32 = 2240;
/// Minimum length of the shorter edge in pixels.
pub const MIN_SHORT_EDGE: u32 = 4;
/// Maximum ratio between the longer and the shorter edge.
pub const MAX_ASPECT_RATIO: u32 = 5;

/// Compute the normalised `(width, height)` for an image of the given size.
///
/// Steps, in order:
/// 1. If the aspect ratio exceeds 5:1 (either orientation), cap the long
///    edge at 2240 and set the short edge to `max(⌈long / 5⌉, 4)`.
/// 2. If the long edge exceeds 2240, scale both edges down uniformly.
/// 3. If the short edge is below 4, scale both edges up uniformly.
///
/// Scaling floors. A final guard lifts the short edge by at most a pixel
/// when flooring would push the ratio past 5:1.
pub fn normalize_dimensions(width: u32, height: u32) -> (u32, u32) {
    let (w, h) = (width.max(1), height.max(1));
    let landscape = w >= h;
    let (mut long, mut short) = if landscape { (w, h) } else { (h, w) };

    if u64::from(long) > u64::from(MAX_ASPECT_RATIO) * u64::from(short) {
        long = long.min(MAX_LONG_EDGE);
        short = long.div_ceil(MAX_ASPECT_RATIO).max(MIN_SHORT_EDGE);
    }

    if long > MAX_LONG_EDGE {
        short = scale(short, MAX_LONG_EDGE, long);
        long = MAX_LONG_EDGE;
    }

    if short < MIN_SHORT_EDGE {
        long = scale(long, MIN_SHORT_EDGE, short);
        short = MIN_SHORT_EDGE;
    }

    short = short.max(long.div_ceil(MAX_ASPECT_RATIO));

    if landscape {
        (long, short)
    } else {
        (short, long)
    }
}

/// `value * num / den`, floored.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    (u64::from(value) * u64::from(num) / u64::from(den)) as u32
}

/// Resize `img` to its normalised dimensions (no-op when already compliant).
pub fn normalize_image(img: DynamicImage) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let (nw, nh) = normalize_dimensions(w, h);
    if (nw, nh) == (w, h) {
        return img;
    }
    debug!("Normalising {}x{} → {}x{}", w, h, nw, nh);
    img.resize_exact(nw, nh, FilterType::Lanczos3)
}

/// Whether `(width, height)` satisfies every size constraint.
pub fn is_normalized(width: u32, height: u32) -> bool {
    let long = width.max(height);
    let short = width.min(height);
    short >= MIN_SHORT_EDGE
        && long <= MAX_LONG_EDGE
        && u64::from(long) <= u64::from(MAX_ASPECT_RATIO) * u64::from(short)
}
