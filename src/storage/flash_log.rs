//! Two-bank append log on NOR flash.
//!
//! Each bank starts with a header `{magic, sequence}`; the valid bank with
//! the highest sequence is active. Records are appended to the active bank:
//!
//! ```text
//! | magic u16 | file_id u16 | key u16 | len u16 | data, padded to 4 | commit u32 |
//! ```
//!
//! The commit word is written last, so a record torn by a power loss is
//! skipped. The latest committed record for a key wins. Compaction copies the
//! live records into the spare bank and writes its header last.

use embedded_storage::nor_flash::{NorFlash, NorFlashError};

use super::{LogError, RecordDesc, RecordLog};

/// Longest record payload
pub const MAX_RECORD_LEN: usize = 64;

const WORD: u32 = 4;
const ERASED_WORD: u32 = 0xFFFF_FFFF;

const BANK_MAGIC: u32 = 0x4C58_4D44;
const BANK_HEADER_LEN: u32 = 8;

const RECORD_MAGIC: u16 = 0xBEEF;
const RECORD_HEADER_LEN: u32 = 8;
const COMMIT_MARK: u32 = 0x0000_A5A5;

struct Slot {
    desc: RecordDesc,
    committed: bool,
    next: u32,
}

/// [`RecordLog`] over two equally sized banks of a [`NorFlash`]
pub struct NorFlashLog<F: NorFlash> {
    flash: F,
    base: u32,
    bank_size: u32,
    active: u32,
    sequence: u32,
    head: u32,
}

impl<F: NorFlash> NorFlashLog<F> {
    /// Mount the log stored at `base`, formatting it if no bank is valid
    ///
    /// The log occupies `2 * bank_size` bytes.
    pub fn new(flash: F, base: u32, bank_size: u32) -> Result<Self, LogError> {
        let erase_size = u32::try_from(F::ERASE_SIZE).map_err(|_| LogError::Geometry)?;
        let fits = u64::from(base) + 2 * u64::from(bank_size) <= flash.capacity() as u64;
        if bank_size <= BANK_HEADER_LEN + RECORD_HEADER_LEN + WORD
            || bank_size % erase_size != 0
            || base % erase_size != 0
            || WORD as usize % F::WRITE_SIZE != 0
            || WORD as usize % F::READ_SIZE != 0
            || !fits
        {
            return Err(LogError::Geometry);
        }

        let mut log = Self {
            flash,
            base,
            bank_size,
            active: 0,
            sequence: 0,
            head: 0,
        };
        log.mount()?;
        Ok(log)
    }

    /// Release the flash driver
    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Bytes left in the active bank
    pub fn free_space(&self) -> u32 {
        self.bank_end(self.active) - self.head
    }

    fn mount(&mut self) -> Result<(), LogError> {
        let first = self.read_bank_header(0)?;
        let second = self.read_bank_header(1)?;
        let (bank, sequence) = match (first, second) {
            (Some(a), Some(b)) if b > a => (1, b),
            (Some(a), _) => (0, a),
            (None, Some(b)) => (1, b),
            (None, None) => {
                info!("record log: no valid bank, formatting");
                self.erase_bank(1)?;
                return self.format(0, 1);
            }
        };

        self.active = bank;
        self.sequence = sequence;
        self.head = self.bank_start(bank) + BANK_HEADER_LEN;
        while let Some(slot) = self.record_at(self.head)? {
            self.head = slot.next;
        }

        // Leftovers of a torn header would corrupt the next append
        if self.head + RECORD_HEADER_LEN <= self.bank_end(bank) {
            let mut header = [0u8; RECORD_HEADER_LEN as usize];
            self.read_flash(self.head, &mut header)?;
            if header.iter().any(|byte| *byte != 0xFF) {
                warn!("record log: garbage at {:#x}, bank sealed", self.head);
                self.head = self.bank_end(bank);
            }
        }

        debug!(
            "record log: bank {} seq {} head {:#x}",
            self.active, self.sequence, self.head
        );
        Ok(())
    }

    fn format(&mut self, bank: u32, sequence: u32) -> Result<(), LogError> {
        self.erase_bank(bank)?;
        self.write_bank_header(bank, sequence)?;
        self.active = bank;
        self.sequence = sequence;
        self.head = self.bank_start(bank) + BANK_HEADER_LEN;
        Ok(())
    }

    const fn bank_start(&self, bank: u32) -> u32 {
        self.base + bank * self.bank_size
    }

    const fn bank_end(&self, bank: u32) -> u32 {
        self.bank_start(bank) + self.bank_size
    }

    fn read_bank_header(&mut self, bank: u32) -> Result<Option<u32>, LogError> {
        let mut header = [0u8; BANK_HEADER_LEN as usize];
        self.read_flash(self.bank_start(bank), &mut header)?;
        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let sequence = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if magic != BANK_MAGIC || sequence == ERASED_WORD {
            return Ok(None);
        }
        Ok(Some(sequence))
    }

    fn write_bank_header(&mut self, bank: u32, sequence: u32) -> Result<(), LogError> {
        let mut header = [0u8; BANK_HEADER_LEN as usize];
        header[..4].copy_from_slice(&BANK_MAGIC.to_le_bytes());
        header[4..].copy_from_slice(&sequence.to_le_bytes());
        self.write_flash(self.bank_start(bank), &header)
    }

    fn erase_bank(&mut self, bank: u32) -> Result<(), LogError> {
        let start = self.bank_start(bank);
        self.flash
            .erase(start, start + self.bank_size)
            .map_err(|e| LogError::Flash(e.kind()))
    }

    /// Decode the record starting at `addr` in the active bank
    fn record_at(&mut self, addr: u32) -> Result<Option<Slot>, LogError> {
        let end = self.bank_end(self.active);
        if addr + RECORD_HEADER_LEN > end {
            return Ok(None);
        }

        let mut header = [0u8; RECORD_HEADER_LEN as usize];
        self.read_flash(addr, &mut header)?;
        if u16::from_le_bytes([header[0], header[1]]) != RECORD_MAGIC {
            return Ok(None);
        }
        let file_id = u16::from_le_bytes([header[2], header[3]]);
        let key = u16::from_le_bytes([header[4], header[5]]);
        let len = u16::from_le_bytes([header[6], header[7]]);
        if usize::from(len) > MAX_RECORD_LEN {
            return Ok(None);
        }

        let commit_addr = addr + RECORD_HEADER_LEN + padded(len);
        let next = commit_addr + WORD;
        if next > end {
            return Ok(None);
        }
        let mut commit = [0u8; WORD as usize];
        self.read_flash(commit_addr, &mut commit)?;

        Ok(Some(Slot {
            desc: RecordDesc {
                file_id,
                key,
                len,
                addr,
            },
            committed: u32::from_le_bytes(commit) == COMMIT_MARK,
            next,
        }))
    }

    /// Write a complete record at `addr`, returns the address past it
    fn write_record_at(
        &mut self,
        addr: u32,
        file_id: u16,
        key: u16,
        data: &[u8],
    ) -> Result<RecordDesc, LogError> {
        let len = u16::try_from(data.len()).map_err(|_| LogError::TooLarge)?;
        let mut header = [0u8; RECORD_HEADER_LEN as usize];
        header[0..2].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        header[2..4].copy_from_slice(&file_id.to_le_bytes());
        header[4..6].copy_from_slice(&key.to_le_bytes());
        header[6..8].copy_from_slice(&len.to_le_bytes());
        self.write_flash(addr, &header)?;

        let body = padded(len) as usize;
        if body > 0 {
            let mut scratch = [0xFFu8; MAX_RECORD_LEN];
            scratch[..data.len()].copy_from_slice(data);
            self.write_flash(addr + RECORD_HEADER_LEN, &scratch[..body])?;
        }

        let commit_addr = addr + RECORD_HEADER_LEN + padded(len);
        self.write_flash(commit_addr, &COMMIT_MARK.to_le_bytes())?;

        Ok(RecordDesc {
            file_id,
            key,
            len,
            addr,
        })
    }

    fn first_record(&self) -> u32 {
        self.bank_start(self.active) + BANK_HEADER_LEN
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), LogError> {
        self.flash
            .read(addr, buf)
            .map_err(|e| LogError::Flash(e.kind()))
    }

    fn write_flash(&mut self, addr: u32, data: &[u8]) -> Result<(), LogError> {
        self.flash
            .write(addr, data)
            .map_err(|e| LogError::Flash(e.kind()))
    }
}

impl<F: NorFlash> RecordLog for NorFlashLog<F> {
    fn find(&mut self, file_id: u16, key: u16) -> Result<RecordDesc, LogError> {
        let mut found = None;
        let mut addr = self.first_record();
        while let Some(slot) = self.record_at(addr)? {
            if slot.committed && slot.desc.file_id == file_id && slot.desc.key == key {
                found = Some(slot.desc);
            }
            addr = slot.next;
        }
        found.ok_or(LogError::NotFound)
    }

    fn read(&mut self, desc: &RecordDesc, buf: &mut [u8]) -> Result<usize, LogError> {
        let len = usize::from(desc.len);
        if len > buf.len() {
            return Err(LogError::TooLarge);
        }
        let body = padded(desc.len) as usize;
        let mut scratch = [0u8; MAX_RECORD_LEN];
        if body > 0 {
            self.read_flash(desc.addr + RECORD_HEADER_LEN, &mut scratch[..body])?;
        }
        buf[..len].copy_from_slice(&scratch[..len]);
        Ok(len)
    }

    fn write(&mut self, file_id: u16, key: u16, data: &[u8]) -> Result<RecordDesc, LogError> {
        if data.len() > MAX_RECORD_LEN {
            return Err(LogError::TooLarge);
        }
        #[allow(clippy::cast_possible_truncation)]
        let total = RECORD_HEADER_LEN + padded(data.len() as u16) + WORD;
        if self.head + total > self.bank_end(self.active) {
            return Err(LogError::NoSpace);
        }

        let desc = self.write_record_at(self.head, file_id, key, data)?;
        self.head += total;
        trace!("record log: wrote {}/{} at {:#x}", file_id, key, desc.addr);
        Ok(desc)
    }

    fn update(&mut self, desc: &RecordDesc, data: &[u8]) -> Result<RecordDesc, LogError> {
        self.write(desc.file_id, desc.key, data)
    }

    fn collect_garbage(&mut self) -> Result<(), LogError> {
        let target = self.active ^ 1;
        self.erase_bank(target)?;

        let mut dst = self.bank_start(target) + BANK_HEADER_LEN;
        let mut addr = self.first_record();
        let mut scratch = [0u8; MAX_RECORD_LEN];
        let mut kept = 0usize;
        while let Some(slot) = self.record_at(addr)? {
            addr = slot.next;
            if !slot.committed {
                continue;
            }
            let latest = self.find(slot.desc.file_id, slot.desc.key)?;
            if latest.addr != slot.desc.addr {
                continue;
            }
            let len = self.read(&slot.desc, &mut scratch)?;
            self.write_record_at(dst, slot.desc.file_id, slot.desc.key, &scratch[..len])?;
            dst += slot.next - slot.desc.addr;
            kept += 1;
        }

        let sequence = self.sequence.wrapping_add(1);
        self.write_bank_header(target, sequence)?;
        self.active = target;
        self.sequence = sequence;
        self.head = dst;

        info!("record log: compacted into bank {}, {} records kept", target, kept);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), LogError> {
        self.erase_bank(1)?;
        self.format(0, 1)
    }
}

const fn padded(len: u16) -> u32 {
    (len as u32 + WORD - 1) & !(WORD - 1)
}
