use heapless::Vec;

use super::control::{self, ControlCommand};
use crate::cfg::{DmxConfig, RenderConfig};
use crate::color::{BLACK, ColorMode, Curve};
use crate::config::{CONTROL_QUEUE_SIZE, MAX_LEDS_PER_CHANNEL, MAX_SUBSCRIBED_DMX_CHANNELS};
use crate::program::{LedChan, ProgramSource, UserProgram};
use crate::transcode::{Transcode, TranscodeError};

/// Everything one render pass reads, copied at the start of the cycle
#[derive(Debug, Clone)]
pub struct RenderProps {
    pub config: RenderConfig,
    pub dmx_config: DmxConfig,
    pub dmx_vals: [u8; MAX_SUBSCRIBED_DMX_CHANNELS],
    pub dmx_len: usize,
    /// Re-run the program's `init` and blank the unused tail of the strip
    pub reset: bool,
    pub commands: Vec<ControlCommand, CONTROL_QUEUE_SIZE>,
}

impl RenderProps {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            dmx_config: DmxConfig::default(),
            dmx_vals: [0; MAX_SUBSCRIBED_DMX_CHANNELS],
            dmx_len: 0,
            reset: false,
            commands: Vec::new(),
        }
    }

    pub fn dmx_slots(&self) -> &[u8] {
        &self.dmx_vals[..self.dmx_len.min(MAX_SUBSCRIBED_DMX_CHANNELS)]
    }
}

/// Per channel pixel store and the pass turning it into a bus frame
pub struct PixelRenderer<'a> {
    pixels: [[u8; 3]; MAX_LEDS_PER_CHANNEL],
    seq_offset: usize,
    channel: u8,
    curve: Curve,
    source: &'a dyn ProgramSource,
}

impl<'a> PixelRenderer<'a> {
    pub fn new(channel: u8, curve: Curve, source: &'a dyn ProgramSource) -> Self {
        Self {
            pixels: [[0; 3]; MAX_LEDS_PER_CHANNEL],
            seq_offset: 0,
            channel,
            curve,
            source,
        }
    }

    pub fn pixels(&self) -> &[[u8; 3]] {
        &self.pixels
    }

    /// Render one frame: bus reset, pixels, bus reset
    ///
    /// Returns the color mode the program switched to, if it changed it.
    /// Pixels keep the current cycle's mode either way.
    pub fn render<T: Transcode>(
        &mut self,
        props: &RenderProps,
        out: &mut T,
    ) -> Result<Option<ColorMode>, TranscodeError> {
        let mut reset = props.reset;
        for command in &props.commands {
            reset |= control::apply(command, &mut self.pixels, &mut self.seq_offset);
        }

        out.write_bus_reset()?;

        let mode = props.config.color_mode;
        let n_leds = usize::from(props.config.n_leds).min(MAX_LEDS_PER_CHANNEL);
        let mut chan = LedChan {
            pixels: &mut self.pixels,
            dmx_vals: props.dmx_slots(),
            id: self.channel,
            color_mode: mode,
            refresh_msec: props.config.refresh_msec,
            n_leds: props.config.n_leds,
        };
        if reset || n_leds > 0 {
            let result = self.source.with_program(&mut |program: &dyn UserProgram| {
                if reset {
                    program.init(&mut chan);
                } else {
                    program.refresh(&mut chan);
                }
            });
            if result.is_err() {
                trace!("led{}: no program loaded", self.channel);
            }
        }
        let requested = (chan.color_mode != mode).then_some(chan.color_mode);
        if let Some(requested) = requested {
            debug!(
                "led{}: program set color mode {} -> {}",
                self.channel,
                mode.as_str(),
                requested.as_str()
            );
        }

        for pixel in &self.pixels[..n_leds] {
            out.write(mode.to_rgb(*pixel, self.curve))?;
        }
        if reset {
            for _ in n_leds..MAX_LEDS_PER_CHANNEL {
                out.write(BLACK)?;
            }
        }

        out.write_bus_reset()?;
        Ok(requested)
    }
}
