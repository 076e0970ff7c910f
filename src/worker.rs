//! Low-priority worker applying configuration changes.
//!
//! Render tasks and the programming channel must not wait on the config
//! lock, so they queue an [`Action`] instead and this task carries it out.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use crate::cfg::{
    ConfigError, ConfigStore, DMX_CONFIG, DmxConfig, LED_RENDER, Param, ParamId, RenderConfig,
};
use crate::color::ColorMode;
use crate::config::{MAX_PARAM_LEN, WORKER_QUEUE_SIZE};
use crate::storage::RecordLog;

/// Queued configuration change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Raw parameter write from the programming channel
    SetParam {
        id: ParamId,
        payload: Vec<u8, MAX_PARAM_LEN>,
    },
    SetDmxConfig(DmxConfig),
    SetRenderConfig {
        channel: u8,
        config: RenderConfig,
    },
    /// Color mode picked by a render program
    SetColorMode {
        channel: u8,
        mode: ColorMode,
    },
    /// Drop every stored parameter
    EraseConfig,
}

pub type WorkerQueue<M> = Channel<M, Action, WORKER_QUEUE_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    UnknownChannel,
    /// Value does not decode or fails validation
    Rejected,
    Config(ConfigError),
}

impl From<ConfigError> for ActionError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue | ConfigError::VersionMismatch => Self::Rejected,
            err => Self::Config(err),
        }
    }
}

pub struct Worker<'a, 's, M: RawMutex, L: RecordLog> {
    store: &'a ConfigStore<'s, M, L>,
    actions: &'a WorkerQueue<M>,
}

impl<'a, 's, M: RawMutex, L: RecordLog> Worker<'a, 's, M, L> {
    pub const fn new(store: &'a ConfigStore<'s, M, L>, actions: &'a WorkerQueue<M>) -> Self {
        Self { store, actions }
    }

    /// Task body
    pub async fn run(&self) {
        info!("worker: started");
        loop {
            let action = self.actions.receive().await;
            if let Err(err) = self.process(action).await {
                warn!("worker: action failed: {:?}", err);
            }
        }
    }

    pub async fn process(&self, action: Action) -> Result<(), ActionError> {
        match action {
            Action::SetParam { id, payload } => {
                validate_payload(id, &payload)?;
                self.store.set_raw(id, &payload).await?;
                debug!("worker: {:?} written", id);
            }
            Action::SetDmxConfig(config) => {
                config.validate()?;
                self.store.set(DMX_CONFIG, &config).await?;
            }
            Action::SetRenderConfig { channel, config } => {
                config.validate()?;
                let param = render_param(channel)?;
                self.store.set(param, &config).await?;
            }
            Action::SetColorMode { channel, mode } => {
                let param = render_param(channel)?;
                let config = self.store.get_or_init(param, RenderConfig::DEFAULT).await?;
                self.store
                    .set(param, &RenderConfig {
                        color_mode: mode,
                        ..config
                    })
                    .await?;
                debug!("worker: led{} color mode {}", channel, mode.as_str());
            }
            Action::EraseConfig => self.store.erase().await?,
        }
        Ok(())
    }
}

fn render_param(channel: u8) -> Result<Param<RenderConfig>, ActionError> {
    LED_RENDER
        .get(usize::from(channel))
        .copied()
        .ok_or(ActionError::UnknownChannel)
}

// Raw writes get the same checks as typed ones.
fn validate_payload(id: ParamId, payload: &[u8]) -> Result<(), ActionError> {
    match id {
        ParamId::DmxConfig => DMX_CONFIG.decode(payload)?.validate()?,
        ParamId::Led0Render
        | ParamId::Led1Render
        | ParamId::Led2Render
        | ParamId::Led3Render => {
            let param = LED_RENDER[id.index() - ParamId::Led0Render.index()];
            param.decode(payload)?.validate()?;
        }
    }
    Ok(())
}
