//! Render programs filling a channel's pixel store.
//!
//! A program gets `init` once after every channel reset and `refresh` on every
//! other cycle. Loading user supplied programs happens outside this crate,
//! it is seen here through [`ProgramSource`].

use crate::color::ColorMode;

/// Per channel view handed to a program
#[derive(Debug)]
pub struct LedChan<'a> {
    /// Three bytes per pixel, meaning given by `color_mode`
    pub pixels: &'a mut [[u8; 3]],
    /// Subscribed DMX slots of the last frame
    pub dmx_vals: &'a [u8],
    pub id: u8,
    /// Programs may change it, the change is persisted after the cycle
    pub color_mode: ColorMode,
    pub refresh_msec: u16,
    pub n_leds: u16,
}

impl LedChan<'_> {
    /// Pixels currently shown
    pub fn active_pixels(&mut self) -> &mut [[u8; 3]] {
        let count = usize::from(self.n_leds).min(self.pixels.len());
        &mut self.pixels[..count]
    }
}

pub trait UserProgram {
    fn init(&self, chan: &mut LedChan<'_>);
    fn refresh(&self, chan: &mut LedChan<'_>);
}

/// No program is loaded right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramUnavailable;

/// Provides the currently loaded program
pub trait ProgramSource {
    fn with_program(
        &self,
        f: &mut dyn FnMut(&dyn UserProgram),
    ) -> Result<(), ProgramUnavailable>;
}

/// Mirrors DMX slots 1-3 on every pixel; slot 4, when below 3, selects the
/// color mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProgram;

impl DefaultProgram {
    fn select_mode(chan: &mut LedChan<'_>) {
        chan.color_mode = chan
            .dmx_vals
            .get(3)
            .and_then(|raw| ColorMode::from_raw(*raw))
            .unwrap_or(ColorMode::Rgb);
    }
}

impl UserProgram for DefaultProgram {
    fn init(&self, chan: &mut LedChan<'_>) {
        Self::select_mode(chan);
        chan.active_pixels().fill([0; 3]);
    }

    fn refresh(&self, chan: &mut LedChan<'_>) {
        Self::select_mode(chan);
        if let &[a, b, c, ..] = chan.dmx_vals {
            chan.active_pixels().fill([a, b, c]);
        }
    }
}

impl ProgramSource for DefaultProgram {
    fn with_program(
        &self,
        f: &mut dyn FnMut(&dyn UserProgram),
    ) -> Result<(), ProgramUnavailable> {
        f(self);
        Ok(())
    }
}

/// Source with nothing loaded
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgram;

impl ProgramSource for NoProgram {
    fn with_program(
        &self,
        _f: &mut dyn FnMut(&dyn UserProgram),
    ) -> Result<(), ProgramUnavailable> {
        Err(ProgramUnavailable)
    }
}
