//! Direct pixel writes from the programming channel.
//!
//! Wire format, first byte selects the command:
//!
//! ```text
//! 00                      clear the strip
//! 01 xxxx yyyy aa bb cc   set yyyy pixels from xxxx on to (aa, bb, cc)
//! 10 xxxx                 set the sequential write position
//! 11 aa bb cc ...         write pixels from the sequential write position on
//! ```
//!
//! Multi-byte numbers are little endian. Pixel bytes are stored as given and
//! interpreted with the channel's color mode.

use heapless::Vec;

use crate::config::MAX_CONTROL_LEN;

const CMD_CLEAR: u8 = 0x00;
const CMD_FILL: u8 = 0x01;
const CMD_SEQ_OFFSET: u8 = 0x10;
const CMD_SEQ_WRITE: u8 = 0x11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// Unknown command or wrong length
    Malformed,
    /// Too many commands waiting for the next cycle
    QueueFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Clear,
    Fill {
        start: u16,
        count: u16,
        pixel: [u8; 3],
    },
    SetSeqOffset(u16),
    SeqWrite(Vec<u8, MAX_CONTROL_LEN>),
}

impl ControlCommand {
    pub fn parse(bytes: &[u8]) -> Result<Self, ControlError> {
        match *bytes {
            [CMD_CLEAR] => Ok(Self::Clear),
            [CMD_FILL, s0, s1, n0, n1, a, b, c] => Ok(Self::Fill {
                start: u16::from_le_bytes([s0, s1]),
                count: u16::from_le_bytes([n0, n1]),
                pixel: [a, b, c],
            }),
            [CMD_SEQ_OFFSET, o0, o1] => Ok(Self::SetSeqOffset(u16::from_le_bytes([o0, o1]))),
            [CMD_SEQ_WRITE, ref data @ ..] if !data.is_empty() => Vec::from_slice(data)
                .map(Self::SeqWrite)
                .map_err(|_| ControlError::Malformed),
            _ => Err(ControlError::Malformed),
        }
    }
}

/// Apply `command` to a pixel store, returns whether the strip must reset
pub(super) fn apply(command: &ControlCommand, pixels: &mut [[u8; 3]], seq_offset: &mut usize) -> bool {
    match command {
        ControlCommand::Clear => {
            pixels.fill([0; 3]);
            return true;
        }
        ControlCommand::Fill {
            start,
            count,
            pixel,
        } => {
            pixels
                .iter_mut()
                .skip(usize::from(*start))
                .take(usize::from(*count))
                .for_each(|slot| *slot = *pixel);
        }
        ControlCommand::SetSeqOffset(offset) => *seq_offset = usize::from(*offset),
        ControlCommand::SeqWrite(data) => {
            for chunk in data.chunks_exact(3) {
                let Some(slot) = pixels.get_mut(*seq_offset) else {
                    break;
                };
                slot.copy_from_slice(chunk);
                *seq_offset += 1;
            }
        }
    }
    false
}
