//! Compile-time limits and default timings.

use embassy_time::Duration;

/// Number of independent LED output channels.
pub const MAX_LED_CHANNELS: usize = 4;

/// Maximum number of pixels a single channel can drive.
pub const MAX_LEDS_PER_CHANNEL: usize = 64;

/// Refresh period used when no render config has been stored yet.
pub const DEFAULT_REFRESH_MSEC: u16 = 20;

/// Shortest accepted refresh period.
pub const MIN_REFRESH_MSEC: u16 = 10;

/// Longest accepted refresh period.
pub const MAX_REFRESH_MSEC: u16 = 1000;

/// Largest DMX window a channel may subscribe to.
pub const MAX_SUBSCRIBED_DMX_CHANNELS: usize = 32;

/// Number of addressable slots in a DMX512 universe.
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// Largest frame the serial transport hands over (start code included).
pub const DMX_MAX_FRAME_SIZE: usize = 520;

/// Frames buffered between the serial transport and ingestion.
pub const DMX_MAX_QUEUED_FRAMES: usize = 8;

/// Largest stored parameter payload (version tag included).
pub const MAX_PARAM_LEN: usize = 16;

/// Config subscribers per parameter id.
pub const MAX_PARAM_SUBSCRIBERS: usize = 4;

/// DMX subscribers attached to ingestion.
pub const MAX_DMX_SUBSCRIBERS: usize = MAX_LED_CHANNELS + 2;

/// Pending actions for the low-priority worker.
pub const WORKER_QUEUE_SIZE: usize = 8;

/// Pending pixel control commands per channel.
pub const CONTROL_QUEUE_SIZE: usize = 4;

/// Largest pixel control command payload.
pub const MAX_CONTROL_LEN: usize = 64;

/// Delay between the first dirty mark and the persistence pass.
pub const PERSIST_COALESCE_DELAY: Duration = Duration::from_millis(100);

/// Delay before retrying persistence after log compaction.
pub const PERSIST_RETRY_BACKOFF: Duration = Duration::from_millis(2000);
