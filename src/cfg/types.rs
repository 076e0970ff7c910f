use super::{ConfigError, ParamValue};
use crate::color::ColorMode;
use crate::config::{
    DEFAULT_REFRESH_MSEC, DMX_UNIVERSE_SIZE, MAX_LEDS_PER_CHANNEL, MAX_REFRESH_MSEC,
    MAX_SUBSCRIBED_DMX_CHANNELS, MIN_REFRESH_MSEC,
};

/// Which part of the DMX universe this device listens to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmxConfig {
    /// First slot, 1-based. Zero disables the subscription.
    pub channel_offset: u16,
    pub n_channels: u16,
    pub personality: u8,
}

impl DmxConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let start = usize::from(self.channel_offset);
        let len = usize::from(self.n_channels);
        if (start == 0 && len > 0)
            || start + len > DMX_UNIVERSE_SIZE
            || len > MAX_SUBSCRIBED_DMX_CHANNELS
        {
            return Err(ConfigError::InvalidValue);
        }
        Ok(())
    }
}

impl ParamValue for DmxConfig {
    const SIZE: usize = 5;

    fn encode(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.channel_offset.to_le_bytes());
        out[2..4].copy_from_slice(&self.n_channels.to_le_bytes());
        out[4] = self.personality;
    }

    fn decode(data: &[u8]) -> Option<Self> {
        let &[o0, o1, n0, n1, personality] = data else {
            return None;
        };
        Some(Self {
            channel_offset: u16::from_le_bytes([o0, o1]),
            n_channels: u16::from_le_bytes([n0, n1]),
            personality,
        })
    }
}

/// Per channel rendering parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    pub n_leds: u16,
    pub refresh_msec: u16,
    pub color_mode: ColorMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl RenderConfig {
    /// Whole strip, default refresh, RGB
    #[allow(clippy::cast_possible_truncation)]
    pub const DEFAULT: Self = Self {
        n_leds: MAX_LEDS_PER_CHANNEL as u16,
        refresh_msec: DEFAULT_REFRESH_MSEC,
        color_mode: ColorMode::Rgb,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        if usize::from(self.n_leds) > MAX_LEDS_PER_CHANNEL
            || !(MIN_REFRESH_MSEC..=MAX_REFRESH_MSEC).contains(&self.refresh_msec)
        {
            return Err(ConfigError::InvalidValue);
        }
        Ok(())
    }
}

impl ParamValue for RenderConfig {
    const SIZE: usize = 5;

    fn encode(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.n_leds.to_le_bytes());
        out[2..4].copy_from_slice(&self.refresh_msec.to_le_bytes());
        out[4] = self.color_mode.as_raw();
    }

    fn decode(data: &[u8]) -> Option<Self> {
        let &[n0, n1, r0, r1, mode] = data else {
            return None;
        };
        Some(Self {
            n_leds: u16::from_le_bytes([n0, n1]),
            refresh_msec: u16::from_le_bytes([r0, r1]),
            color_mode: ColorMode::from_raw(mode)?,
        })
    }
}
