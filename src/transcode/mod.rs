//! Bit-level encoders for WS2812-style LED buses.
//!
//! The LED bus is driven by a SPI peripheral clocked at 8 MHz, every SPI bit
//! being one 125 ns slot of the bus waveform. An [`Encoding`] turns one pixel
//! into the SPI bytes reproducing the LED protocol timing, and a
//! [`Transcoder`] appends encoded pixels and bus-reset gaps to an
//! [`OutputBuffer`].

mod buffer;
mod spi;

use core::marker::PhantomData;

pub use buffer::OutputBuffer;
pub use spi::{Spi8Mhz, Spi8MhzAlt};

use crate::color::Rgb;

/// Largest number of bytes any encoding uses for one pixel
pub const MAX_BYTES_PER_PIXEL: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeError {
    /// The output buffer has no room left
    Overflow,
}

/// Wire encoding of a single pixel
pub trait Encoding {
    /// Encoded size of one pixel
    const BYTES_PER_PIXEL: usize;
    /// Length of the low period separating two frames
    const BYTES_PER_RESET: usize;

    /// Encode `color` into `out`, which is exactly `BYTES_PER_PIXEL` long
    fn encode(color: Rgb, out: &mut [u8]);

    /// Buffer size needed for `n_leds` pixels framed by two bus resets
    fn frame_size(n_leds: usize) -> usize {
        n_leds * Self::BYTES_PER_PIXEL + 2 * Self::BYTES_PER_RESET
    }
}

/// Something pixels can be written to
pub trait Transcode {
    /// Append the inter-frame idle period
    fn write_bus_reset(&mut self) -> Result<(), TranscodeError>;

    /// Append one pixel
    fn write(&mut self, color: Rgb) -> Result<(), TranscodeError>;
}

/// Writes pixels into an [`OutputBuffer`] using encoding `E`
pub struct Transcoder<'b, 'a, E: Encoding> {
    output: &'b mut OutputBuffer<'a>,
    _encoding: PhantomData<E>,
}

impl<'b, 'a, E: Encoding> Transcoder<'b, 'a, E> {
    pub fn new(output: &'b mut OutputBuffer<'a>) -> Self {
        Self {
            output,
            _encoding: PhantomData,
        }
    }
}

impl<E: Encoding> Transcode for Transcoder<'_, '_, E> {
    fn write_bus_reset(&mut self) -> Result<(), TranscodeError> {
        self.output.fill(0, E::BYTES_PER_RESET)
    }

    fn write(&mut self, color: Rgb) -> Result<(), TranscodeError> {
        let mut pixel = [0u8; MAX_BYTES_PER_PIXEL];
        let pixel = &mut pixel[..E::BYTES_PER_PIXEL];
        E::encode(color, pixel);
        self.output.write(pixel)
    }
}
