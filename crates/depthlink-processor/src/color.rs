//! 8-bit RGB to HSV, the foundation of depth-as-hue decoding.

/// HSV with every component in `[0, 1]`; hue is a unit angle in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

/// Convert an 8-bit RGB triple to HSV.
///
/// Achromatic input (`max == min`) yields `h = 0`, black yields `s = 0`.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let mut h = 0.0;
    if d != 0.0 {
        h = if max == r {
            ((g - b) / d) % 6.0
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        h /= 6.0;
    }
    if h < 0.0 {
        h += 1.0;
    }

    Hsv {
        h,
        s: if max == 0.0 { 0.0 } else { d / max },
        v: max,
    }
}

/// Hue channel only; what the depth decoder actually needs.
#[inline]
pub fn hue(rgb: [u8; 3]) -> f32 {
    rgb_to_hsv(rgb[0], rgb[1], rgb[2]).h
}

/// Inverse conversion, rounded to the nearest byte.
pub fn hsv_to_rgb(hsv: Hsv) -> [u8; 3] {
    let c = hsv.s * hsv.v;
    let h6 = hsv.h.rem_euclid(1.0) * 6.0;
    let x = c * (1.0 - ((h6 % 2.0) - 1.0).abs());
    let m = hsv.v - c;

    let (r1, g1, b1) = match h6 as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_byte(r1), to_byte(g1), to_byte(b1)]
}
