mod convert;
mod mode;

pub use convert::{Curve, hsl_to_rgb, hsv_to_rgb};
pub use mode::ColorMode;
use smart_leds::{RGB8, hsv::Hsv as HSV};

pub type Rgb = RGB8;
pub type Hsv = HSV;

pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

/// Hue/saturation/luminance color, all channels in `0..=255`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hsl {
    pub hue: u8,
    pub sat: u8,
    pub lum: u8,
}
