//! # HSV Color Conversion
//!
//! Converts hue/saturation/value colors to the RGBA floats stored per vertex.

/// Converts an HSV color plus alpha to `[r, g, b, a]`.
///
/// `hue` is in degrees and wraps around 360 (negative hues included).
/// `saturation`, `value` and `alpha` are expected in `[0, 1]`; if any of them
/// exceeds 1 the input is rejected with `None` rather than clamped.
///
/// ```
/// use glint::gfx::color::hsva;
///
/// assert_eq!(hsva(120.0, 1.0, 1.0, 1.0), Some([0.0, 1.0, 0.0, 1.0]));
/// assert_eq!(hsva(0.0, 1.5, 1.0, 1.0), None);
/// ```
pub fn hsva(hue: f32, saturation: f32, value: f32, alpha: f32) -> Option<[f32; 4]> {
    if saturation > 1.0 || value > 1.0 || alpha > 1.0 {
        return None;
    }

    let (s, v) = (saturation, value);
    if s == 0.0 {
        return Some([v, v, v, alpha]);
    }

    let h = hue.rem_euclid(360.0) / 60.0;
    // rem_euclid can round up to exactly 360 for tiny negative hues
    let sector = (h.floor() as usize) % 6;
    let f = h - h.floor();

    let m = v * (1.0 - s);
    let n = v * (1.0 - s * f);
    let k = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector {
        0 => (v, k, m),
        1 => (n, v, m),
        2 => (m, v, k),
        3 => (m, n, v),
        4 => (k, m, v),
        _ => (v, m, n),
    };

    Some([r, g, b, alpha])
}
