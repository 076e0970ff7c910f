//! WS2812 encodings for an 8 MHz SPI clock.
//!
//! Colors go out in GRB order, most significant bit first. Each data bit is
//! one high pulse: 3 slots wide for a zero, 5 or 6 slots wide for a one.

use super::Encoding;
use crate::color::Rgb;

/// One byte per data bit. T0H = 375 ns, T1H = 625 ns
pub struct Spi8Mhz;

impl Spi8Mhz {
    const ZERO: u8 = 0b1110_0000;
    const ONE: u8 = 0b1111_1000;
}

impl Encoding for Spi8Mhz {
    const BYTES_PER_PIXEL: usize = 24;
    const BYTES_PER_RESET: usize = 300;

    fn encode(color: Rgb, out: &mut [u8]) {
        for (channel, chunk) in [color.g, color.r, color.b]
            .into_iter()
            .zip(out.chunks_exact_mut(8))
        {
            for (bit, byte) in chunk.iter_mut().enumerate() {
                *byte = if channel & (0x80 >> bit) != 0 {
                    Self::ONE
                } else {
                    Self::ZERO
                };
            }
        }
    }
}

/// Ten SPI bits per data bit, packed five bytes per nibble
///
/// Closer to the nominal 1.25 us bit period than [`Spi8Mhz`], which keeps
/// long strips from drifting out of tolerance.
pub struct Spi8MhzAlt;

impl Spi8MhzAlt {
    // (one, zero) pattern for each of the five bytes of a nibble
    const PATTERNS: [(u8, u8); 5] = [
        (0b1111_1100, 0b1110_0000),
        (0b0011_1111, 0b0011_1000),
        (0b0000_1111, 0b0000_1110),
        (0b1100_0011, 0b0000_0011),
        (0b1111_0000, 0b1000_0000),
    ];

    // Bit of the nibble driving each of the five bytes
    const NIBBLE_BITS: [u8; 5] = [3, 2, 1, 1, 0];

    fn encode_nibble(nibble: u8, out: &mut [u8]) {
        for ((byte, (one, zero)), bit) in out
            .iter_mut()
            .zip(Self::PATTERNS)
            .zip(Self::NIBBLE_BITS)
        {
            *byte = if nibble & (1 << bit) != 0 { one } else { zero };
        }
    }
}

impl Encoding for Spi8MhzAlt {
    const BYTES_PER_PIXEL: usize = 30;
    const BYTES_PER_RESET: usize = 380;

    fn encode(color: Rgb, out: &mut [u8]) {
        for (channel, chunk) in [color.g, color.r, color.b]
            .into_iter()
            .zip(out.chunks_exact_mut(10))
        {
            let (high, low) = chunk.split_at_mut(5);
            Self::encode_nibble(channel >> 4, high);
            Self::encode_nibble(channel & 0x0f, low);
        }
    }
}
