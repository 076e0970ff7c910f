use super::{Curve, Hsl, Hsv, Rgb, hsl_to_rgb, hsv_to_rgb};

const COLOR_MODE_NAME_RGB: &str = "rgb";
const COLOR_MODE_NAME_HSV: &str = "hsv";
const COLOR_MODE_NAME_HSL: &str = "hsl";

const COLOR_MODE_ID_RGB: u8 = 0;
const COLOR_MODE_ID_HSV: u8 = 1;
const COLOR_MODE_ID_HSL: u8 = 2;

/// How the three bytes stored for each pixel are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorMode {
    #[default]
    Rgb = COLOR_MODE_ID_RGB,
    Hsv = COLOR_MODE_ID_HSV,
    Hsl = COLOR_MODE_ID_HSL,
}

impl ColorMode {
    pub const fn from_raw(value: u8) -> Option<Self> {
        Some(match value {
            COLOR_MODE_ID_RGB => Self::Rgb,
            COLOR_MODE_ID_HSV => Self::Hsv,
            COLOR_MODE_ID_HSL => Self::Hsl,
            _ => return None,
        })
    }

    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => COLOR_MODE_NAME_RGB,
            Self::Hsv => COLOR_MODE_NAME_HSV,
            Self::Hsl => COLOR_MODE_NAME_HSL,
        }
    }

    /// Convert a stored pixel to RGB
    pub fn to_rgb(self, pixel: [u8; 3], curve: Curve) -> Rgb {
        let [a, b, c] = pixel;
        match self {
            Self::Rgb => Rgb::new(a, b, c),
            Self::Hsv => hsv_to_rgb(
                Hsv {
                    hue: a,
                    sat: b,
                    val: c,
                },
                curve,
            ),
            Self::Hsl => hsl_to_rgb(
                Hsl {
                    hue: a,
                    sat: b,
                    lum: c,
                },
                curve,
            ),
        }
    }
}
