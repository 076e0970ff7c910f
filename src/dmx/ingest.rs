use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use super::rdm::RdmPacket;
use super::{StartCode, Uid};
use crate::cfg::{
    ConfigError, ConfigStore, ConfigSubscriber, DMX_CONFIG, DmxConfig, ParamId,
};
use crate::config::{
    DMX_MAX_FRAME_SIZE, DMX_MAX_QUEUED_FRAMES, DMX_UNIVERSE_SIZE, MAX_DMX_SUBSCRIBERS,
    MAX_SUBSCRIBED_DMX_CHANNELS,
};
use crate::storage::RecordLog;

/// One frame as received by the serial transport, start code included
pub type DmxFrame = Vec<u8, DMX_MAX_FRAME_SIZE>;

/// Queue between the serial transport and [`DmxIngest::run`]
///
/// The transport side uses `try_send` and drops frames when it is full.
pub type FrameQueue<M> = Channel<M, DmxFrame, DMX_MAX_QUEUED_FRAMES>;

/// Receives subscribed slot levels and config changes
///
/// `slots` is `None` when only the configuration changed. The slice is only
/// valid during the call.
pub trait DmxSubscriber: Sync {
    fn on_dmx(&self, slots: Option<&[u8]>, config: &DmxConfig);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Window outside the universe, too long, or starting at slot 0
    InvalidWindow,
    /// Subscriber list is full
    Full,
}

/// What happened to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Subscribed slots were fanned out
    Delivered,
    /// Dimmer frame without data for the subscribed window
    Ignored,
    /// Valid RDM message for this device
    Rdm,
    Discarded,
}

/// Classifies incoming frames and hands subscribed slots to subscribers
pub struct DmxIngest<'a, M: RawMutex> {
    uid: Uid,
    config: Mutex<M, Cell<DmxConfig>>,
    subscribers: Mutex<M, RefCell<Vec<&'a dyn DmxSubscriber, MAX_DMX_SUBSCRIBERS>>>,
}

impl<'a, M: RawMutex> DmxIngest<'a, M> {
    pub const fn new(uid: Uid) -> Self {
        Self {
            uid,
            config: Mutex::new(Cell::new(DmxConfig {
                channel_offset: 0,
                n_channels: 0,
                personality: 0,
            })),
            subscribers: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    pub const fn uid(&self) -> Uid {
        self.uid
    }

    /// Append a subscriber; fan-out follows registration order
    pub fn subscribe(&self, subscriber: &'a dyn DmxSubscriber) -> Result<(), SubscriptionError> {
        self.subscribers.lock(|subscribers| {
            subscribers
                .borrow_mut()
                .push(subscriber)
                .map_err(|_| SubscriptionError::Full)
        })
    }

    /// Select the window of 1-based slots to deliver
    ///
    /// `start == 0` with `len == 0` disables delivery.
    pub fn set_subscription(&self, start: usize, len: usize) -> Result<(), SubscriptionError> {
        if (start == 0 && len > 0)
            || start + len > DMX_UNIVERSE_SIZE
            || len > MAX_SUBSCRIBED_DMX_CHANNELS
        {
            return Err(SubscriptionError::InvalidWindow);
        }

        #[allow(clippy::cast_possible_truncation)]
        self.config.lock(|config| {
            config.set(DmxConfig {
                channel_offset: start as u16,
                n_channels: len as u16,
                ..config.get()
            });
        });
        Ok(())
    }

    /// Shadow copy of the channel config in use
    pub fn config(&self) -> DmxConfig {
        self.config.lock(Cell::get)
    }

    /// Load the stored channel config, storing a disabled one if missing
    pub async fn load_config<L: RecordLog>(
        &self,
        store: &ConfigStore<'_, M, L>,
    ) -> Result<DmxConfig, ConfigError> {
        let config = store.get_or_init(DMX_CONFIG, DmxConfig::default()).await?;
        self.apply_config(config);
        Ok(self.config())
    }

    /// Adopt a new channel config and tell subscribers about it
    pub fn apply_config(&self, config: DmxConfig) {
        let start = usize::from(config.channel_offset);
        let len = usize::from(config.n_channels);
        if self.set_subscription(start, len).is_err() {
            warn!("dmx: invalid window {}+{}, delivery disabled", start, len);
            let _ = self.set_subscription(0, 0);
        }
        self.config.lock(|shadow| {
            shadow.set(DmxConfig {
                personality: config.personality,
                ..shadow.get()
            });
        });

        let config = self.config();
        debug!(
            "dmx: window {}+{}, personality {}",
            config.channel_offset, config.n_channels, config.personality
        );
        self.fan_out(None, &config);
    }

    /// Classify one frame and deliver its slots
    pub fn handle_frame(&self, frame: &[u8]) -> FrameOutcome {
        let Some(&start_code) = frame.first() else {
            return FrameOutcome::Discarded;
        };

        match StartCode::from_raw(start_code) {
            Some(StartCode::Dimmer) => self.handle_dimmer(frame),
            Some(StartCode::Rdm) => self.handle_rdm(frame),
            Some(StartCode::AsciiText | StartCode::ManufacturerSpecific) | None => {
                trace!("dmx: start code {:#04x} ignored", start_code);
                FrameOutcome::Discarded
            }
        }
    }

    /// Ingestion task body
    pub async fn run(&self, frames: &FrameQueue<M>) {
        info!("dmx: ingestion started, uid {}", self.uid);
        loop {
            let frame = frames.receive().await;
            self.handle_frame(&frame);
        }
    }

    fn handle_dimmer(&self, frame: &[u8]) -> FrameOutcome {
        let config = self.config();
        let offset = usize::from(config.channel_offset);
        let count = usize::from(config.n_channels);
        if offset == 0 || frame.len() < offset + count {
            return FrameOutcome::Ignored;
        }

        self.fan_out(Some(&frame[offset..offset + count]), &config);
        FrameOutcome::Delivered
    }

    fn handle_rdm(&self, frame: &[u8]) -> FrameOutcome {
        match RdmPacket::parse(frame, self.uid) {
            Ok(packet) => {
                debug!(
                    "rdm: cc {:#04x} pid {:#06x} from {}",
                    packet.command_class_raw(),
                    packet.parameter_id(),
                    packet.source()
                );
                FrameOutcome::Rdm
            }
            Err(err) => {
                debug!("rdm: dropped frame: {:?}", err);
                FrameOutcome::Discarded
            }
        }
    }

    fn fan_out(&self, slots: Option<&[u8]>, config: &DmxConfig) {
        self.subscribers.lock(|subscribers| {
            for subscriber in subscribers.borrow().iter() {
                subscriber.on_dmx(slots, config);
            }
        });
    }
}

impl<M: RawMutex> ConfigSubscriber for DmxIngest<'_, M>
where
    Self: Sync,
{
    fn on_config_change(&self, id: ParamId, payload: &[u8]) {
        if id != ParamId::DmxConfig {
            return;
        }
        match DMX_CONFIG.decode(payload) {
            Ok(config) => self.apply_config(config),
            Err(err) => warn!("dmx: unreadable config: {:?}", err),
        }
    }
}
