#![no_std]

#[macro_use]
mod fmt;

pub mod cfg;
pub mod color;
pub mod config;
pub mod dmx;
pub mod program;
pub mod render;
pub mod storage;
pub mod sync;
pub mod transcode;
pub mod worker;

pub use cfg::{
    ConfigError, ConfigStore, ConfigSubscriber, DmxConfig, ParamId, RenderConfig, StoreSettings,
};
pub use dmx::{DmxFrame, DmxIngest, DmxSubscriber, FrameQueue, Uid};
pub use program::{DefaultProgram, LedChan, ProgramSource, UserProgram};
pub use render::{ChannelSettings, ChannelShared, LedTransport, RenderChannel, RenderError};
pub use transcode::{OutputBuffer, Spi8Mhz, Spi8MhzAlt};
pub use worker::{Action, Worker, WorkerQueue};

pub use color::{ColorMode, Curve, Hsl, Hsv, Rgb};
pub use embassy_time::{Duration, Instant};
