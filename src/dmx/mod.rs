//! DMX512 frame ingestion.

mod ingest;
pub mod rdm;

pub use ingest::{
    DmxFrame, DmxIngest, DmxSubscriber, FrameOutcome, FrameQueue, SubscriptionError,
};
pub use rdm::{RdmPacket, Uid};

const START_CODE_DIMMER: u8 = 0x00;
const START_CODE_ASCII_TEXT: u8 = 0x17;
const START_CODE_MANUFACTURER: u8 = 0x91;
const START_CODE_RDM: u8 = 0xCC;

/// First byte of a DMX frame, selects how the payload is read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StartCode {
    /// Slot levels
    Dimmer = START_CODE_DIMMER,
    AsciiText = START_CODE_ASCII_TEXT,
    ManufacturerSpecific = START_CODE_MANUFACTURER,
    Rdm = START_CODE_RDM,
}

impl StartCode {
    pub const fn from_raw(value: u8) -> Option<Self> {
        Some(match value {
            START_CODE_DIMMER => Self::Dimmer,
            START_CODE_ASCII_TEXT => Self::AsciiText,
            START_CODE_MANUFACTURER => Self::ManufacturerSpecific,
            START_CODE_RDM => Self::Rdm,
            _ => return None,
        })
    }

    pub const fn as_raw(self) -> u8 {
        self as u8
    }
}
