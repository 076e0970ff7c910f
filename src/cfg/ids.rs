use crate::config::MAX_LED_CHANNELS;

const PARAM_ID_DMX_CONFIG: u16 = 0x0001;
const PARAM_ID_LED0_RENDER: u16 = 0x0010;
const PARAM_ID_LED1_RENDER: u16 = 0x0011;
const PARAM_ID_LED2_RENDER: u16 = 0x0012;
const PARAM_ID_LED3_RENDER: u16 = 0x0013;

/// Number of known parameters
pub const N_PARAMS: usize = 5;

// Dirty and subscription sets are 32-bit masks.
const _: () = assert!(N_PARAMS <= 32);
const _: () = assert!(MAX_LED_CHANNELS <= 4);

/// Stable identifier of a stored parameter, also the record key in the log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ParamId {
    DmxConfig = PARAM_ID_DMX_CONFIG,
    Led0Render = PARAM_ID_LED0_RENDER,
    Led1Render = PARAM_ID_LED1_RENDER,
    Led2Render = PARAM_ID_LED2_RENDER,
    Led3Render = PARAM_ID_LED3_RENDER,
}

/// Every parameter, in index order
pub const ALL_PARAMS: [ParamId; N_PARAMS] = [
    ParamId::DmxConfig,
    ParamId::Led0Render,
    ParamId::Led1Render,
    ParamId::Led2Render,
    ParamId::Led3Render,
];

impl ParamId {
    pub const fn from_raw(value: u16) -> Option<Self> {
        Some(match value {
            PARAM_ID_DMX_CONFIG => Self::DmxConfig,
            PARAM_ID_LED0_RENDER => Self::Led0Render,
            PARAM_ID_LED1_RENDER => Self::Led1Render,
            PARAM_ID_LED2_RENDER => Self::Led2Render,
            PARAM_ID_LED3_RENDER => Self::Led3Render,
            _ => return None,
        })
    }

    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Dense index into per-parameter tables
    pub const fn index(self) -> usize {
        match self {
            Self::DmxConfig => 0,
            Self::Led0Render => 1,
            Self::Led1Render => 2,
            Self::Led2Render => 3,
            Self::Led3Render => 4,
        }
    }

    /// Bit of this parameter in a dirty set
    pub const fn mask(self) -> u32 {
        1 << self.index()
    }

    /// Render config id of an LED channel
    pub const fn led_render(channel: usize) -> Option<Self> {
        Some(match channel {
            0 => Self::Led0Render,
            1 => Self::Led1Render,
            2 => Self::Led2Render,
            3 => Self::Led3Render,
            _ => return None,
        })
    }
}
