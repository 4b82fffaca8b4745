//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate which target widths apply to a source.
///
/// Drops every width wider than the source (never upscale). If that leaves
/// nothing, returns the native width as the only entry so a valid source
/// always produces at least one derivative set.
///
/// # Examples
/// ```
/// # use imgset::imaging::calculate_target_widths;
/// assert_eq!(calculate_target_widths(400, &[320, 640, 960, 1600]), vec![320]);
/// assert_eq!(calculate_target_widths(200, &[320, 640]), vec![200]);
/// ```
pub fn calculate_target_widths(native_width: u32, widths: &[u32]) -> Vec<u32> {
    let result: Vec<u32> = widths
        .iter()
        .copied()
        .filter(|&w| w <= native_width)
        .collect();

    if result.is_empty() {
        vec![native_width]
    } else {
        result
    }
}

/// Scale `original` to `target_width`, preserving aspect ratio.
///
/// Height is rounded and never drops below one pixel. A target wider than
/// the original is clamped to the original (resize never upscales).
pub fn scale_to_width(original: (u32, u32), target_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w == 0 || target_width >= orig_w {
        return original;
    }
    let ratio = target_width as f64 / orig_w as f64;
    let height = (orig_h as f64 * ratio).round().max(1.0) as u32;
    (target_width, height)
}
