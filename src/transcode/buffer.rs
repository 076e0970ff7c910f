use super::TranscodeError;

/// Append-only view over a transport buffer
///
/// Tracks the run of bytes at the start of the underlying memory that are
/// known to be zero, so bus-reset fills over that run skip the writes.
#[derive(Debug)]
pub struct OutputBuffer<'a> {
    data: &'a mut [u8],
    pos: usize,
    zeroed: usize,
}

impl<'a> OutputBuffer<'a> {
    /// Wrap a buffer with unknown contents
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            pos: 0,
            zeroed: 0,
        }
    }

    /// Wrap a buffer and zero it
    pub fn zeroed(data: &'a mut [u8]) -> Self {
        data.fill(0);
        let zeroed = data.len();
        Self {
            data,
            pos: 0,
            zeroed,
        }
    }

    /// Rewind the write position, contents are kept
    pub fn clear(&mut self) {
        self.pos = 0;
    }

    /// Number of bytes written since the last `clear`
    pub const fn len(&self) -> usize {
        self.pos
    }

    pub const fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub const fn capacity(&self) -> usize {
        self.data.len()
    }

    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Length of the leading run known to be zero
    pub const fn zeroed_prefix(&self) -> usize {
        self.zeroed
    }

    /// Written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    /// Append raw bytes
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), TranscodeError> {
        let end = self.reserve(bytes.len())?;
        self.data[self.pos..end].copy_from_slice(bytes);
        self.track(bytes);
        self.pos = end;
        Ok(())
    }

    /// Append `count` copies of `value`
    pub fn fill(&mut self, value: u8, count: usize) -> Result<(), TranscodeError> {
        let end = self.reserve(count)?;
        if value == 0 && end <= self.zeroed {
            self.pos = end;
            return Ok(());
        }

        self.data[self.pos..end].fill(value);
        if value == 0 {
            if self.pos <= self.zeroed {
                self.zeroed = end;
            }
        } else if self.pos < self.zeroed {
            self.zeroed = self.pos;
        }
        self.pos = end;
        Ok(())
    }

    fn reserve(&self, count: usize) -> Result<usize, TranscodeError> {
        if count > self.remaining() {
            return Err(TranscodeError::Overflow);
        }
        Ok(self.pos + count)
    }

    // Must run before `pos` is advanced past `bytes`.
    fn track(&mut self, bytes: &[u8]) {
        if self.pos > self.zeroed {
            return;
        }
        match bytes.iter().position(|byte| *byte != 0) {
            Some(offset) => self.zeroed = self.pos + offset,
            None => self.zeroed = self.zeroed.max(self.pos + bytes.len()),
        }
    }
}
