//! Persistent record storage.
//!
//! Records are small byte blobs addressed by a `(file_id, key)` pair. The
//! config store keeps one record per parameter id.

mod flash_log;
mod ram;

use embedded_storage::nor_flash::NorFlashErrorKind;

pub use flash_log::{MAX_RECORD_LEN, NorFlashLog};
pub use ram::RamFlash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    /// No committed record with this key
    NotFound,
    /// Active bank is full, garbage collection may free space
    NoSpace,
    /// Record data longer than [`MAX_RECORD_LEN`] or than the read buffer
    TooLarge,
    /// Bank size is not usable with this flash geometry
    Geometry,
    /// Flash driver failure
    Flash(NorFlashErrorKind),
}

/// Handle to a committed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDesc {
    pub file_id: u16,
    pub key: u16,
    pub len: u16,
    addr: u32,
}

impl RecordDesc {
    /// Flash address of the record header
    pub const fn addr(&self) -> u32 {
        self.addr
    }
}

/// Append-only record log
///
/// `NotFound` and `NoSpace` are regular outcomes callers handle.
pub trait RecordLog {
    /// Locate the latest committed record for a key
    fn find(&mut self, file_id: u16, key: u16) -> Result<RecordDesc, LogError>;

    /// Copy record data into `buf`, returns the number of bytes read
    ///
    /// Fails with [`LogError::TooLarge`] if `buf` cannot hold the record.
    fn read(&mut self, desc: &RecordDesc, buf: &mut [u8]) -> Result<usize, LogError>;

    /// Append a new record
    fn write(&mut self, file_id: u16, key: u16, data: &[u8]) -> Result<RecordDesc, LogError>;

    /// Replace the content of an existing record
    fn update(&mut self, desc: &RecordDesc, data: &[u8]) -> Result<RecordDesc, LogError>;

    /// Reclaim space taken by superseded records
    fn collect_garbage(&mut self) -> Result<(), LogError>;

    /// Drop every record
    fn erase(&mut self) -> Result<(), LogError>;
}
