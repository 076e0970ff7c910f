use core::fmt::Debug;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::transcode::OutputBuffer;

/// Transmission-complete flag
///
/// Raised by the transport, usually from its DMA or SPI interrupt, and
/// awaited by the render task.
pub struct SendComplete {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl SendComplete {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Mark the last transfer as finished. Safe from interrupt context.
    pub fn signal(&self) {
        self.signal.signal(());
    }

    pub async fn wait(&self) {
        self.signal.wait().await;
    }

    pub fn reset(&self) {
        self.signal.reset();
    }

    pub fn is_signaled(&self) -> bool {
        self.signal.signaled()
    }
}

impl Default for SendComplete {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware that shifts encoded frames out to an LED strip
///
/// The transport owns at most one buffer at a time. Buffers move in through
/// [`set_buffer`](LedTransport::set_buffer) and move back out of the same
/// call once the transport no longer reads them.
pub trait LedTransport<'a> {
    type Error: Debug;

    /// Attach the flag to raise when a transfer finishes
    fn bind_completion(&mut self, complete: &'a SendComplete);

    /// Make `buffer` the next one to send, returning the one it replaces
    fn set_buffer(
        &mut self,
        buffer: OutputBuffer<'a>,
    ) -> Result<Option<OutputBuffer<'a>>, Self::Error>;

    /// Start sending the current buffer without waiting for completion
    fn send(&mut self) -> Result<(), Self::Error>;
}
