//! HSV/HSL to RGB conversion on 8-bit channels.

use libm::floorf;

use super::{BLACK, Hsl, Hsv, Rgb};

/// Saturation threshold below which the WS2812 curve is not applied
const CURVE_MIN_SATURATION: f32 = 0.004;

/// Perceptual correction applied to saturation before conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Curve {
    /// Use channel values as is
    #[default]
    Linear,
    /// Boost low saturations, WS2812 LEDs wash out pastel colors
    Ws2812,
}

impl Curve {
    fn apply(self, saturation: f32) -> f32 {
        match self {
            Self::Linear => saturation,
            Self::Ws2812 if saturation > CURVE_MIN_SATURATION => {
                let inverse = 1.0 - saturation;
                1.0 - inverse * inverse
            }
            Self::Ws2812 => saturation,
        }
    }
}

/// Convert an HSV color to RGB
pub fn hsv_to_rgb(hsv: Hsv, curve: Curve) -> Rgb {
    if hsv.sat == 0 {
        return Rgb::new(hsv.val, hsv.val, hsv.val);
    }
    if hsv.val == 0 {
        return BLACK;
    }

    let h = unit(hsv.hue);
    let s = curve.apply(unit(hsv.sat));
    let v = unit(hsv.val);

    let scaled = h * 6.0;
    let sector = floorf(scaled);
    let f = scaled - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (r, g, b) = match (sector as u8) % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    Rgb::new(channel(r), channel(g), channel(b))
}

/// Convert an HSL color to RGB
pub fn hsl_to_rgb(hsl: Hsl, curve: Curve) -> Rgb {
    let h = unit(hsl.hue);
    let s = curve.apply(unit(hsl.sat));
    let l = unit(hsl.lum);

    if hsl.sat == 0 {
        return Rgb::new(hsl.lum, hsl.lum, hsl.lum);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    Rgb::new(
        channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        channel(hue_to_rgb(p, q, h)),
        channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

fn unit(value: u8) -> f32 {
    f32::from(value) / 255.0
}

// Truncates, the float-to-int cast saturates out of range values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(value: f32) -> u8 {
    (value * 255.0) as u8
}
