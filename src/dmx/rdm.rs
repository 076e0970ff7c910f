//! RDM (ANSI E1.20) packet layout and validation.
//!
//! Only parsing and addressing are handled here, no responder logic.

use core::fmt;

use super::StartCode;

/// Sub-start code following [`StartCode::Rdm`]
pub const SUB_START_MESSAGE: u8 = 0x01;
/// Smallest frame: header without parameter data plus checksum
pub const RDM_MIN_FRAME_SIZE: usize = 26;
/// Largest frame: 231 bytes of parameter data
pub const RDM_MAX_FRAME_SIZE: usize = 257;

const CHECKSUM_LEN: usize = 2;
const HEADER_LEN: usize = 24;

mod field {
    use core::ops::Range;

    pub(super) const START_CODE: usize = 0;
    pub(super) const SUB_START_CODE: usize = 1;
    pub(super) const MESSAGE_LENGTH: usize = 2;
    pub(super) const DESTINATION: Range<usize> = 3..9;
    pub(super) const SOURCE: Range<usize> = 9..15;
    pub(super) const TRANSACTION_NUMBER: usize = 15;
    pub(super) const PORT_ID: usize = 16;
    pub(super) const MESSAGE_COUNT: usize = 17;
    pub(super) const SUB_DEVICE: Range<usize> = 18..20;
    pub(super) const COMMAND_CLASS: usize = 20;
    pub(super) const PARAMETER_ID: Range<usize> = 21..23;
    pub(super) const PARAMETER_DATA_LENGTH: usize = 23;
    pub(super) const PARAMETER_DATA: usize = 24;
}

/// RDM device identifier: manufacturer id and device id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid {
    pub manufacturer: u16,
    pub device: u32,
}

impl Uid {
    /// Addresses every device
    pub const BROADCAST: Self = Self::new(0xFFFF, 0xFFFF_FFFF);

    pub const fn new(manufacturer: u16, device: u32) -> Self {
        Self {
            manufacturer,
            device,
        }
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self {
            manufacturer: u16::from_be_bytes([bytes[0], bytes[1]]),
            device: u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
        }
    }

    pub const fn to_bytes(self) -> [u8; 6] {
        let m = self.manufacturer.to_be_bytes();
        let d = self.device.to_be_bytes();
        [m[0], m[1], d[0], d[1], d[2], d[3]]
    }

    pub const fn is_broadcast(self) -> bool {
        self.manufacturer == Self::BROADCAST.manufacturer && self.device == Self::BROADCAST.device
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:08X}", self.manufacturer, self.device)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdmError {
    /// Frame outside `[RDM_MIN_FRAME_SIZE, RDM_MAX_FRAME_SIZE]`
    Length,
    /// Start code or sub-start code mismatch
    StartCode,
    /// Declared message length does not match the frame
    MessageLength,
    Checksum,
    /// Destination is neither this device nor broadcast
    NotAddressed,
}

macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $repr:ty { $($variant:ident = $value:expr,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr($repr)]
        pub enum $name {
            $($variant = $value,)*
        }

        impl $name {
            pub const fn from_raw(value: $repr) -> Option<Self> {
                $(if value == $value {
                    return Some(Self::$variant);
                })*
                None
            }

            pub const fn as_raw(self) -> $repr {
                self as $repr
            }
        }
    };
}

raw_enum! {
    pub enum CommandClass: u8 {
        Get = 0x10,
        GetResponse = 0x11,
        Set = 0x20,
        SetResponse = 0x21,
        Discovery = 0x30,
        DiscoveryResponse = 0x31,
    }
}

raw_enum! {
    pub enum ResponseType: u8 {
        Ack = 0x00,
        AckOverflow = 0x01,
        AckTimer = 0x02,
        NackReason = 0x03,
    }
}

raw_enum! {
    pub enum NackReason: u16 {
        UnknownPid = 0x0000,
        FormatError = 0x0001,
        HardwareFault = 0x0002,
        ProxyReject = 0x0003,
        WriteProtect = 0x0004,
        UnsupportedCommandClass = 0x0005,
        DataOutOfRange = 0x0006,
        BufferFull = 0x0007,
        PacketSizeUnsupported = 0x0008,
        SubDeviceOutOfRange = 0x0009,
        ProxyBufferFull = 0x000A,
    }
}

raw_enum! {
    /// Parameter ids this device knows about
    pub enum Pid: u16 {
        DiscUniqueBranch = 0x0001,
        DiscMute = 0x0002,
        DiscUnMute = 0x0003,
        SupportedParameters = 0x0050,
        ParameterDescription = 0x0051,
        DeviceInfo = 0x0060,
        SoftwareVersionLabel = 0x00C0,
        DmxPersonality = 0x00E0,
        DmxPersonalityDescription = 0x00E1,
        DmxStartAddress = 0x00F0,
        SlotInfo = 0x0120,
        SlotDescription = 0x0121,
        DefaultSlotValue = 0x0122,
        IdentifyDevice = 0x1000,
    }
}

/// 16-bit additive checksum used by RDM
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)))
}

/// Field accessors over an RDM frame, start code included
#[derive(Debug, Clone)]
pub struct RdmPacket<B> {
    buffer: B,
}

impl<B: AsRef<[u8]>> RdmPacket<B> {
    /// Wrap a frame without validating it
    ///
    /// Accessors panic if the frame is shorter than the header.
    pub const fn new_unchecked(buffer: B) -> Self {
        Self { buffer }
    }

    /// Validate a received frame addressed to `device`
    pub fn parse(buffer: B, device: Uid) -> Result<Self, RdmError> {
        let packet = Self::new_unchecked(buffer);
        packet.validate(device)?;
        Ok(packet)
    }

    /// Check framing, checksum and addressing
    pub fn validate(&self, device: Uid) -> Result<(), RdmError> {
        let frame = self.buffer.as_ref();
        if !(RDM_MIN_FRAME_SIZE..=RDM_MAX_FRAME_SIZE).contains(&frame.len()) {
            return Err(RdmError::Length);
        }
        if frame[field::START_CODE] != StartCode::Rdm.as_raw()
            || frame[field::SUB_START_CODE] != SUB_START_MESSAGE
        {
            return Err(RdmError::StartCode);
        }
        if self.message_length() + CHECKSUM_LEN != frame.len() {
            return Err(RdmError::MessageLength);
        }
        if !self.checksum_ok() {
            return Err(RdmError::Checksum);
        }
        let destination = self.destination();
        if destination != device && !destination.is_broadcast() {
            return Err(RdmError::NotAddressed);
        }
        Ok(())
    }

    /// Checksum stored after the message matches its content
    pub fn checksum_ok(&self) -> bool {
        let frame = self.buffer.as_ref();
        let len = self.message_length();
        match frame.get(len..len + CHECKSUM_LEN) {
            Some(stored) => u16::from_be_bytes([stored[0], stored[1]]) == checksum(&frame[..len]),
            None => false,
        }
    }

    /// Declared length of the message, checksum excluded
    pub fn message_length(&self) -> usize {
        usize::from(self.buffer.as_ref()[field::MESSAGE_LENGTH])
    }

    pub fn destination(&self) -> Uid {
        self.uid(field::DESTINATION.start)
    }

    pub fn source(&self) -> Uid {
        self.uid(field::SOURCE.start)
    }

    pub fn transaction_number(&self) -> u8 {
        self.buffer.as_ref()[field::TRANSACTION_NUMBER]
    }

    /// Port id in requests
    pub fn port_id(&self) -> u8 {
        self.buffer.as_ref()[field::PORT_ID]
    }

    /// Same byte as the port id, in responses
    pub fn response_type(&self) -> Option<ResponseType> {
        ResponseType::from_raw(self.port_id())
    }

    pub fn message_count(&self) -> u8 {
        self.buffer.as_ref()[field::MESSAGE_COUNT]
    }

    pub fn sub_device(&self) -> u16 {
        self.be_u16(field::SUB_DEVICE.start)
    }

    pub fn command_class_raw(&self) -> u8 {
        self.buffer.as_ref()[field::COMMAND_CLASS]
    }

    pub fn command_class(&self) -> Option<CommandClass> {
        CommandClass::from_raw(self.command_class_raw())
    }

    pub fn parameter_id(&self) -> u16 {
        self.be_u16(field::PARAMETER_ID.start)
    }

    pub fn pid(&self) -> Option<Pid> {
        Pid::from_raw(self.parameter_id())
    }

    pub fn parameter_data_length(&self) -> usize {
        usize::from(self.buffer.as_ref()[field::PARAMETER_DATA_LENGTH])
    }

    /// Parameter data, clipped to the declared message length
    pub fn parameter_data(&self) -> &[u8] {
        let frame = self.buffer.as_ref();
        let end = (field::PARAMETER_DATA + self.parameter_data_length())
            .min(self.message_length())
            .min(frame.len());
        frame.get(field::PARAMETER_DATA..end).unwrap_or(&[])
    }

    pub fn checksum(&self) -> u16 {
        self.be_u16(self.message_length())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_ref()
    }

    pub fn into_inner(self) -> B {
        self.buffer
    }

    fn uid(&self, at: usize) -> Uid {
        let frame = self.buffer.as_ref();
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&frame[at..at + 6]);
        Uid::from_bytes(bytes)
    }

    fn be_u16(&self, at: usize) -> u16 {
        let frame = self.buffer.as_ref();
        u16::from_be_bytes([frame[at], frame[at + 1]])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> RdmPacket<B> {
    /// Write start codes and an empty message; the buffer must hold at least
    /// `RDM_MIN_FRAME_SIZE` bytes.
    pub fn init(&mut self) {
        let frame = self.buffer.as_mut();
        frame[..RDM_MIN_FRAME_SIZE].fill(0);
        frame[field::START_CODE] = StartCode::Rdm.as_raw();
        frame[field::SUB_START_CODE] = SUB_START_MESSAGE;
        #[allow(clippy::cast_possible_truncation)]
        {
            frame[field::MESSAGE_LENGTH] = HEADER_LEN as u8;
        }
    }

    pub fn set_destination(&mut self, uid: Uid) {
        self.buffer.as_mut()[field::DESTINATION].copy_from_slice(&uid.to_bytes());
    }

    pub fn set_source(&mut self, uid: Uid) {
        self.buffer.as_mut()[field::SOURCE].copy_from_slice(&uid.to_bytes());
    }

    pub fn set_transaction_number(&mut self, value: u8) {
        self.buffer.as_mut()[field::TRANSACTION_NUMBER] = value;
    }

    pub fn set_port_id(&mut self, value: u8) {
        self.buffer.as_mut()[field::PORT_ID] = value;
    }

    pub fn set_response_type(&mut self, value: ResponseType) {
        self.set_port_id(value.as_raw());
    }

    pub fn set_message_count(&mut self, value: u8) {
        self.buffer.as_mut()[field::MESSAGE_COUNT] = value;
    }

    pub fn set_sub_device(&mut self, value: u16) {
        self.buffer.as_mut()[field::SUB_DEVICE].copy_from_slice(&value.to_be_bytes());
    }

    pub fn set_command_class(&mut self, value: CommandClass) {
        self.buffer.as_mut()[field::COMMAND_CLASS] = value.as_raw();
    }

    pub fn set_parameter_id(&mut self, value: u16) {
        self.buffer.as_mut()[field::PARAMETER_ID].copy_from_slice(&value.to_be_bytes());
    }

    /// Copy parameter data and update both length fields
    ///
    /// Returns the total frame length including the checksum.
    pub fn set_parameter_data(&mut self, data: &[u8]) -> Result<usize, RdmError> {
        let message_length = HEADER_LEN + data.len();
        let frame_length = message_length + CHECKSUM_LEN;
        let frame = self.buffer.as_mut();
        if frame_length > RDM_MAX_FRAME_SIZE || frame_length > frame.len() {
            return Err(RdmError::Length);
        }
        frame[field::PARAMETER_DATA..message_length].copy_from_slice(data);
        #[allow(clippy::cast_possible_truncation)]
        {
            frame[field::PARAMETER_DATA_LENGTH] = data.len() as u8;
            frame[field::MESSAGE_LENGTH] = message_length as u8;
        }
        Ok(frame_length)
    }

    /// Compute and store the checksum after the message
    pub fn fill_checksum(&mut self) {
        let len = self.message_length();
        let frame = self.buffer.as_mut();
        let sum = checksum(&frame[..len]);
        frame[len..len + CHECKSUM_LEN].copy_from_slice(&sum.to_be_bytes());
    }
}
