use core::marker::PhantomData;

use super::{ConfigError, ParamId};
use crate::config::MAX_PARAM_LEN;

const VERSION_LEN: usize = 2;

/// Fixed-size value that can be stored as a parameter
pub trait ParamValue: Sized + Copy {
    /// Encoded size
    const SIZE: usize;

    /// Write the value into `out`, which is exactly `SIZE` bytes long
    fn encode(&self, out: &mut [u8]);

    /// Parse a value, `None` if the bytes do not form a valid value
    fn decode(data: &[u8]) -> Option<Self>;
}

/// Typed handle on a parameter with its schema version
///
/// Stored payload is `version` (u16, little endian) followed by the encoded
/// value, zero padded to a multiple of four bytes.
#[derive(Debug)]
pub struct Param<T: ParamValue> {
    pub id: ParamId,
    pub version: u16,
    _value: PhantomData<T>,
}

impl<T: ParamValue> Clone for Param<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ParamValue> Copy for Param<T> {}

impl<T: ParamValue> Param<T> {
    pub const fn new(id: ParamId, version: u16) -> Self {
        assert!(payload_len(T::SIZE) <= MAX_PARAM_LEN);
        Self {
            id,
            version,
            _value: PhantomData,
        }
    }

    /// Size of the stored payload
    pub const fn payload_len(&self) -> usize {
        payload_len(T::SIZE)
    }

    /// Encode `value` into `out`, returns the payload length
    pub fn encode(&self, value: &T, out: &mut [u8]) -> Result<usize, ConfigError> {
        let len = self.payload_len();
        let out = out.get_mut(..len).ok_or(ConfigError::TooLarge)?;
        out.fill(0);
        out[..VERSION_LEN].copy_from_slice(&self.version.to_le_bytes());
        value.encode(&mut out[VERSION_LEN..VERSION_LEN + T::SIZE]);
        Ok(len)
    }

    /// Decode a stored payload
    pub fn decode(&self, data: &[u8]) -> Result<T, ConfigError> {
        let (version, value) = data
            .split_at_checked(VERSION_LEN)
            .ok_or(ConfigError::InvalidValue)?;
        if u16::from_le_bytes([version[0], version[1]]) != self.version {
            return Err(ConfigError::VersionMismatch);
        }
        value
            .get(..T::SIZE)
            .and_then(T::decode)
            .ok_or(ConfigError::InvalidValue)
    }
}

const fn payload_len(size: usize) -> usize {
    (VERSION_LEN + size).next_multiple_of(4)
}
