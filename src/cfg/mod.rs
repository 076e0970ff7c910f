//! Persistent, typed configuration.

mod ids;
mod param;
mod store;
mod types;

pub use ids::{ALL_PARAMS, N_PARAMS, ParamId};
pub use param::{Param, ParamValue};
pub use store::{ConfigStore, ConfigSubscriber, StoreSettings};
pub use types::{DmxConfig, RenderConfig};

use crate::config::MAX_LED_CHANNELS;
use crate::storage::LogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Never written
    NotFound,
    /// Stored with another schema version
    VersionMismatch,
    /// Payload does not decode or fails validation
    InvalidValue,
    /// Payload larger than a cache entry
    TooLarge,
    /// No room for another subscriber
    SubscribersFull,
    Log(LogError),
}

impl From<LogError> for ConfigError {
    fn from(err: LogError) -> Self {
        Self::Log(err)
    }
}

pub const DMX_CONFIG: Param<DmxConfig> = Param::new(ParamId::DmxConfig, 1);

pub const LED_RENDER: [Param<RenderConfig>; MAX_LED_CHANNELS] = [
    Param::new(ParamId::Led0Render, 1),
    Param::new(ParamId::Led1Render, 1),
    Param::new(ParamId::Led2Render, 1),
    Param::new(ParamId::Led3Render, 1),
];
