mod tests {
    use myrtio_dmx_light::color::Rgb;
    use myrtio_dmx_light::transcode::{
        Encoding, OutputBuffer, Spi8Mhz, Spi8MhzAlt, Transcode, TranscodeError, Transcoder,
    };

    /// Recover data bits from an SPI bit stream by measuring high pulses
    fn decode_pulses(bytes: &[u8]) -> Vec<bool> {
        let mut bits = Vec::new();
        let mut run = 0;
        for byte in bytes {
            for bit in (0..8).rev() {
                if byte & (1 << bit) != 0 {
                    run += 1;
                } else if run > 0 {
                    bits.push(run >= 4);
                    run = 0;
                }
            }
        }
        if run > 0 {
            bits.push(run >= 4);
        }
        bits
    }

    fn color_bits(colors: &[Rgb]) -> Vec<bool> {
        colors
            .iter()
            .flat_map(|color| [color.g, color.r, color.b])
            .flat_map(|channel| (0..8).rev().map(move |bit| channel & (1 << bit) != 0))
            .collect()
    }

    fn encode_frame<E: Encoding>(colors: &[Rgb]) -> Vec<u8> {
        let mut memory = vec![0xAAu8; E::frame_size(colors.len())];
        let mut output = OutputBuffer::new(&mut memory);
        let mut transcoder = Transcoder::<E>::new(&mut output);
        transcoder.write_bus_reset().unwrap();
        for color in colors {
            transcoder.write(*color).unwrap();
        }
        transcoder.write_bus_reset().unwrap();
        assert_eq!(output.len(), E::frame_size(colors.len()));
        output.as_slice().to_vec()
    }

    const COLORS: [Rgb; 4] = [
        Rgb { r: 0, g: 0, b: 0 },
        Rgb { r: 255, g: 255, b: 255 },
        Rgb { r: 10, g: 20, b: 30 },
        Rgb { r: 0x5A, g: 0xC3, b: 0x81 },
    ];

    #[test]
    fn test_spi8mhz_decodes_to_grb() {
        let frame = encode_frame::<Spi8Mhz>(&COLORS);
        assert!(frame[..Spi8Mhz::BYTES_PER_RESET].iter().all(|byte| *byte == 0));
        assert!(frame[frame.len() - Spi8Mhz::BYTES_PER_RESET..].iter().all(|byte| *byte == 0));
        assert_eq!(decode_pulses(&frame), color_bits(&COLORS));
    }

    #[test]
    fn test_spi8mhz_alt_decodes_to_grb() {
        let frame = encode_frame::<Spi8MhzAlt>(&COLORS);
        assert!(frame[..Spi8MhzAlt::BYTES_PER_RESET].iter().all(|byte| *byte == 0));
        assert_eq!(decode_pulses(&frame), color_bits(&COLORS));
    }

    #[test]
    fn test_pixel_sizes() {
        let mut pixel = [0u8; 24];
        Spi8Mhz::encode(Rgb::new(0, 0, 0), &mut pixel);
        assert!(pixel.iter().all(|byte| *byte == 0b1110_0000));
        Spi8Mhz::encode(Rgb::new(255, 255, 255), &mut pixel);
        assert!(pixel.iter().all(|byte| *byte == 0b1111_1000));

        assert_eq!(Spi8Mhz::frame_size(1), 624);
        assert_eq!(Spi8MhzAlt::frame_size(1), 790);
    }

    #[test]
    fn test_alt_pulse_widths() {
        let mut pixel = [0u8; 30];
        Spi8MhzAlt::encode(Rgb::new(0xFF, 0x00, 0xFF), &mut pixel);
        // Green goes first, all zeros: 3 slots high in every 10
        assert_eq!(&pixel[..5], &[0b1110_0000, 0b0011_1000, 0b0000_1110, 0b0000_0011, 0b1000_0000]);
        // Red, all ones: 6 slots high in every 10
        assert_eq!(&pixel[10..15], &[0b1111_1100, 0b0011_1111, 0b0000_1111, 0b1100_0011, 0b1111_0000]);
    }

    #[test]
    fn test_zero_fill_over_known_zeroes_skips_writes() {
        let mut memory = [0x55u8; 16];
        let mut output = OutputBuffer::new(&mut memory);
        assert_eq!(output.zeroed_prefix(), 0);

        output.fill(0, 8).unwrap();
        assert_eq!(output.zeroed_prefix(), 8);
        output.write(&[1, 2]).unwrap();
        assert_eq!(output.zeroed_prefix(), 8);

        output.clear();
        output.fill(0, 6).unwrap();
        assert_eq!(output.len(), 6);
        assert_eq!(output.zeroed_prefix(), 8);
        output.write(&[0, 0, 7]).unwrap();
        assert_eq!(output.zeroed_prefix(), 8);
        assert_eq!(output.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 0, 7]);

        output.clear();
        output.write(&[9]).unwrap();
        assert_eq!(output.zeroed_prefix(), 0);
    }

    #[test]
    fn test_zeroed_buffer() {
        let mut memory = [0xFFu8; 32];
        let mut output = OutputBuffer::zeroed(&mut memory);
        assert_eq!(output.zeroed_prefix(), 32);
        assert!(output.is_empty());
        output.fill(0, 32).unwrap();
        assert_eq!(output.as_slice(), &[0u8; 32]);
        assert_eq!(output.remaining(), 0);
    }

    #[test]
    fn test_overflow() {
        let mut memory = [0u8; Spi8Mhz::BYTES_PER_RESET + 10];
        let mut output = OutputBuffer::new(&mut memory);
        let mut transcoder = Transcoder::<Spi8Mhz>::new(&mut output);
        transcoder.write_bus_reset().unwrap();
        assert_eq!(transcoder.write(Rgb::new(1, 2, 3)), Err(TranscodeError::Overflow));
        assert_eq!(transcoder.write_bus_reset(), Err(TranscodeError::Overflow));
        assert_eq!(output.len(), Spi8Mhz::BYTES_PER_RESET);
        assert_eq!(output.capacity(), Spi8Mhz::BYTES_PER_RESET + 10);
    }
}
