use core::cell::RefCell;
use core::convert::Infallible;
use core::marker::PhantomData;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer, with_timeout};

use super::control::{ControlCommand, ControlError};
use super::double_buffer::DoubleBuffer;
use super::pixels::{PixelRenderer, RenderProps};
use super::scheduler::CycleScheduler;
use super::transport::{LedTransport, SendComplete};
use crate::cfg::{
    ConfigError, ConfigStore, ConfigSubscriber, DmxConfig, LED_RENDER, ParamId, RenderConfig,
};
use crate::color::{BLACK, ColorMode, Curve};
use crate::config::{CONTROL_QUEUE_SIZE, MAX_LEDS_PER_CHANNEL, MAX_SUBSCRIBED_DMX_CHANNELS};
use crate::dmx::DmxSubscriber;
use crate::program::ProgramSource;
use crate::storage::RecordLog;
use crate::sync::Mailbox;
use crate::transcode::{Encoding, Transcode, TranscodeError, Transcoder};
use crate::worker::{Action, WorkerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    Transcode(TranscodeError),
    /// The transport rejected a buffer or a send
    Transport,
    /// The transport kept a buffer it should have released
    BufferLost,
    Config(ConfigError),
}

impl From<TranscodeError> for RenderError {
    fn from(err: TranscodeError) -> Self {
        Self::Transcode(err)
    }
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Per channel knobs
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelSettings {
    /// Saturation curve for HSV and HSL pixels
    pub curve: Curve,
    /// Upper bound for the transmission-complete wait, the refresh period
    /// when unset
    pub send_timeout: Option<Duration>,
}

#[derive(Debug)]
struct SharedState {
    config: RenderConfig,
    dmx_config: DmxConfig,
    dmx_vals: [u8; MAX_SUBSCRIBED_DMX_CHANNELS],
    dmx_len: usize,
    reset: bool,
}

/// State of a channel touched from outside its render task
///
/// Receives render config changes from the store and slot values from DMX
/// ingestion, and queues control commands until the next cycle.
pub struct ChannelShared<M: RawMutex> {
    channel: u8,
    state: Mutex<M, RefCell<SharedState>>,
    controls: Mailbox<ControlCommand, CONTROL_QUEUE_SIZE>,
    resume: Signal<M, ()>,
    complete: SendComplete,
}

impl<M: RawMutex> ChannelShared<M> {
    pub const fn new(channel: u8) -> Self {
        Self {
            channel,
            state: Mutex::new(RefCell::new(SharedState {
                config: RenderConfig::DEFAULT,
                dmx_config: DmxConfig {
                    channel_offset: 0,
                    n_channels: 0,
                    personality: 0,
                },
                dmx_vals: [0; MAX_SUBSCRIBED_DMX_CHANNELS],
                dmx_len: 0,
                reset: true,
            })),
            controls: Mailbox::new(),
            resume: Signal::new(),
            complete: SendComplete::new(),
        }
    }

    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// Let the render task start
    pub fn resume(&self) {
        self.resume.signal(());
    }

    /// Blank the strip and re-run the program's `init` next cycle
    pub fn reset(&self) {
        self.with_state(|state| state.reset = true);
    }

    pub fn resume_all(channels: &[&Self]) {
        for channel in channels {
            channel.resume();
        }
    }

    pub fn reset_all(channels: &[&Self]) {
        for channel in channels {
            channel.reset();
        }
    }

    /// Queue a raw control command for the next cycle
    pub fn control(&self, bytes: &[u8]) -> Result<(), ControlError> {
        let command = ControlCommand::parse(bytes).inspect_err(|_| {
            warn!("led{}: malformed control write ({} bytes)", self.channel, bytes.len());
        })?;
        self.controls
            .post(command)
            .map_err(|_| ControlError::QueueFull)
    }

    /// Render config in use
    pub fn config(&self) -> RenderConfig {
        self.with_state(|state| state.config)
    }

    /// Flag raised by the transport after each transfer
    pub const fn completion(&self) -> &SendComplete {
        &self.complete
    }

    /// Copy everything the next render pass needs
    pub fn snapshot(&self) -> RenderProps {
        let mut props = self.with_state(|state| {
            let mut props = RenderProps::new(state.config);
            props.dmx_config = state.dmx_config;
            props.dmx_vals = state.dmx_vals;
            props.dmx_len = state.dmx_len;
            props.reset = core::mem::take(&mut state.reset);
            props
        });
        self.controls.drain_into(&mut props.commands);
        props
    }

    fn set_config(&self, config: RenderConfig) {
        self.with_state(|state| state.config = config);
    }

    fn set_color_mode(&self, mode: ColorMode) {
        self.with_state(|state| state.config.color_mode = mode);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> R {
        self.state.lock(|state| f(&mut *state.borrow_mut()))
    }
}

impl<M: RawMutex> ConfigSubscriber for ChannelShared<M>
where
    Self: Sync,
{
    fn on_config_change(&self, id: ParamId, payload: &[u8]) {
        let Some(param) = LED_RENDER.get(usize::from(self.channel)) else {
            return;
        };
        if id != param.id {
            return;
        }
        let config = match param.decode(payload) {
            Ok(config) => config,
            Err(err) => {
                warn!("led{}: unreadable render config: {:?}", self.channel, err);
                return;
            }
        };
        if config.validate().is_err() {
            warn!("led{}: render config out of range, ignored: {:?}", self.channel, config);
            return;
        }

        self.with_state(|state| {
            if state.config.n_leds != config.n_leds || state.config.color_mode != config.color_mode
            {
                state.reset = true;
            }
            state.config = config;
        });
        debug!(
            "led{}: {} leds every {} ms, {}",
            self.channel,
            config.n_leds,
            config.refresh_msec,
            config.color_mode.as_str()
        );
    }
}

impl<M: RawMutex> DmxSubscriber for ChannelShared<M>
where
    Self: Sync,
{
    fn on_dmx(&self, slots: Option<&[u8]>, config: &DmxConfig) {
        self.with_state(|state| {
            state.dmx_config = *config;
            match slots {
                Some(slots) => {
                    let len = slots.len().min(MAX_SUBSCRIBED_DMX_CHANNELS);
                    state.dmx_vals[..len].copy_from_slice(&slots[..len]);
                    state.dmx_len = len;
                }
                None => {
                    state.dmx_vals = [0; MAX_SUBSCRIBED_DMX_CHANNELS];
                    state.dmx_len = 0;
                }
            }
        });
    }
}

/// Render task of one LED channel
pub struct RenderChannel<'a, M: RawMutex, T: LedTransport<'a>, E: Encoding> {
    shared: &'a ChannelShared<M>,
    actions: &'a WorkerQueue<M>,
    transport: T,
    buffers: DoubleBuffer<'a>,
    renderer: PixelRenderer<'a>,
    scheduler: CycleScheduler,
    send_timeout: Option<Duration>,
    pending_mode: Option<ColorMode>,
    _encoding: PhantomData<E>,
}

impl<'a, M: RawMutex, T: LedTransport<'a>, E: Encoding> RenderChannel<'a, M, T, E> {
    /// Both buffers must fit a frame of `MAX_LEDS_PER_CHANNEL` pixels
    pub fn new(
        shared: &'a ChannelShared<M>,
        actions: &'a WorkerQueue<M>,
        mut transport: T,
        buffers: DoubleBuffer<'a>,
        source: &'a dyn ProgramSource,
        settings: ChannelSettings,
    ) -> Self {
        transport.bind_completion(&shared.complete);
        let period = refresh_period(&RenderConfig::DEFAULT);
        Self {
            shared,
            actions,
            transport,
            buffers,
            renderer: PixelRenderer::new(shared.channel, settings.curve, source),
            scheduler: CycleScheduler::new(period),
            send_timeout: settings.send_timeout,
            pending_mode: None,
            _encoding: PhantomData,
        }
    }

    /// Task body: wait for the resume signal, start, then render forever
    pub async fn run<L: RecordLog>(
        &mut self,
        store: &ConfigStore<'_, M, L>,
    ) -> Result<Infallible, RenderError> {
        self.shared.resume.wait().await;
        if let Err(err) = self.start(store).await {
            error!("led{}: start failed: {:?}", self.shared.channel, err);
            return Err(err);
        }

        loop {
            match self.cycle().await {
                Ok(deadline) => Timer::at(deadline).await,
                Err(err) => {
                    error!("led{}: render stopped: {:?}", self.shared.channel, err);
                    return Err(err);
                }
            }
        }
    }

    /// Load the render config and queue an all-black frame
    pub async fn start<L: RecordLog>(
        &mut self,
        store: &ConfigStore<'_, M, L>,
    ) -> Result<(), RenderError> {
        let channel = self.shared.channel;
        let param = *LED_RENDER
            .get(usize::from(channel))
            .ok_or(ConfigError::NotFound)?;
        let mut config = store.get_or_init(param, RenderConfig::DEFAULT).await?;
        if config.validate().is_err() {
            warn!("led{}: stored render config out of range, using default", channel);
            config = RenderConfig::DEFAULT;
            store.set(param, &config).await?;
        }
        self.shared.set_config(config);
        self.scheduler.set_period(refresh_period(&config));
        info!(
            "led{}: started, {} leds every {} ms",
            channel, config.n_leds, config.refresh_msec
        );

        let buffer = self.buffers.filling_mut().ok_or(RenderError::BufferLost)?;
        buffer.clear();
        let mut out = Transcoder::<E>::new(buffer);
        out.write_bus_reset()?;
        for _ in 0..MAX_LEDS_PER_CHANNEL {
            out.write(BLACK)?;
        }
        out.write_bus_reset()?;
        self.hand_over()
    }

    /// Run one cycle, returns the deadline of the next one
    pub async fn cycle(&mut self) -> Result<Instant, RenderError> {
        let timing = self.scheduler.tick(Instant::now());

        self.shared.complete.reset();
        self.transport.send().map_err(|err| {
            error!("led{}: send failed: {:?}", self.shared.channel, err);
            RenderError::Transport
        })?;
        self.buffers.flip();

        let props = self.shared.snapshot();
        let period = refresh_period(&props.config);
        self.scheduler.set_period(period);

        let buffer = self.buffers.filling_mut().ok_or(RenderError::BufferLost)?;
        buffer.clear();
        if let Some(mode) = self.renderer.render(&props, &mut Transcoder::<E>::new(buffer))? {
            self.shared.set_color_mode(mode);
            self.pending_mode = Some(mode);
        }
        self.submit_color_mode();

        let timeout = self.send_timeout.unwrap_or(period);
        if with_timeout(timeout, self.shared.complete.wait()).await.is_err() {
            warn!("led{}: transfer not done after {} ms", self.shared.channel, timeout.as_millis());
        }

        self.hand_over()?;
        Ok(timing.next_deadline)
    }

    /// Buffers currently owned by the channel, the rest is with the transport
    pub fn buffers_held(&self) -> usize {
        self.buffers.held()
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    // Move the filled buffer into the transport and keep what it released.
    fn hand_over(&mut self) -> Result<(), RenderError> {
        let buffer = self.buffers.take_filling().ok_or(RenderError::BufferLost)?;
        let released = self.transport.set_buffer(buffer).map_err(|err| {
            error!("led{}: buffer rejected: {:?}", self.shared.channel, err);
            RenderError::Transport
        })?;
        if let Some(released) = released {
            self.buffers.restore(released);
        }
        Ok(())
    }

    fn submit_color_mode(&mut self) {
        let Some(mode) = self.pending_mode else {
            return;
        };
        let action = Action::SetColorMode {
            channel: self.shared.channel,
            mode,
        };
        match self.actions.try_send(action) {
            Ok(()) => self.pending_mode = None,
            Err(_) => warn!("led{}: worker queue full, retrying", self.shared.channel),
        }
    }
}

fn refresh_period(config: &RenderConfig) -> Duration {
    Duration::from_millis(u64::from(config.refresh_msec))
}
