use crate::transcode::OutputBuffer;

/// Two output buffers used alternately
///
/// One slot is filled by the renderer while the other buffer is owned by the
/// transport. A buffer is only ever in one place, so the one being filled can
/// never be the one on the wire.
#[derive(Debug)]
pub struct DoubleBuffer<'a> {
    slots: [Option<OutputBuffer<'a>>; 2],
    filling: usize,
}

impl<'a> DoubleBuffer<'a> {
    pub fn new(first: OutputBuffer<'a>, second: OutputBuffer<'a>) -> Self {
        Self {
            slots: [Some(first), Some(second)],
            filling: 0,
        }
    }

    /// Switch to the other slot
    pub fn flip(&mut self) {
        self.filling ^= 1;
    }

    /// Index of the slot being filled
    pub const fn filling_index(&self) -> usize {
        self.filling
    }

    pub fn filling_mut(&mut self) -> Option<&mut OutputBuffer<'a>> {
        self.slots[self.filling].as_mut()
    }

    /// Move the filled buffer out, for the transport
    pub fn take_filling(&mut self) -> Option<OutputBuffer<'a>> {
        self.slots[self.filling].take()
    }

    /// Put back a buffer the transport released
    ///
    /// It goes into the slot filled next.
    pub fn restore(&mut self, buffer: OutputBuffer<'a>) {
        self.slots[self.filling ^ 1] = Some(buffer);
    }

    /// Number of buffers currently held
    pub fn held(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
