//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `original` down to `target_width`, preserving the aspect ratio.
///
/// Never upscales: a target at or above the original width returns the
/// original dimensions. The height is rounded and never drops below 1px.
///
/// # Examples
/// ```
/// # use mediaforge::imaging::scale_down_to_width;
/// assert_eq!(scale_down_to_width((1920, 1080), 640), (640, 360));
/// assert_eq!(scale_down_to_width((300, 200), 640), (300, 200));
/// ```
pub fn scale_down_to_width(original: (u32, u32), target_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if target_width == 0 || orig_w == 0 || target_width >= orig_w {
        return original;
    }
    let ratio = target_width as f64 / orig_w as f64;
    let height = (orig_h as f64 * ratio).round() as u32;
    (target_width, height.max(1))
}

/// Fit `original` inside an optional bounding box, preserving the aspect ratio.
///
/// Missing bounds are unconstrained. Like [`scale_down_to_width`], this never
/// upscales.
pub fn fit_within(original: (u32, u32), max_width: Option<u32>, max_height: Option<u32>) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w == 0 || orig_h == 0 {
        return original;
    }

    let width_ratio = max_width
        .filter(|&w| w > 0)
        .map(|w| w as f64 / orig_w as f64)
        .unwrap_or(1.0);
    let height_ratio = max_height
        .filter(|&h| h > 0)
        .map(|h| h as f64 / orig_h as f64)
        .unwrap_or(1.0);
    let ratio = width_ratio.min(height_ratio).min(1.0);

    if ratio >= 1.0 {
        return original;
    }

    (
        ((orig_w as f64 * ratio).round() as u32).max(1),
        ((orig_h as f64 * ratio).round() as u32).max(1),
    )
}
