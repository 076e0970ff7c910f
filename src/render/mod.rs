//! Per channel render loop.
//!
//! Every cycle the channel kicks off the transfer of the frame rendered last
//! time, renders the next frame into the other buffer, waits for the transfer
//! to finish, and hands the new frame over for the next cycle.

mod channel;
mod control;
mod double_buffer;
mod pixels;
mod scheduler;
mod transport;

pub use channel::{ChannelSettings, ChannelShared, RenderChannel, RenderError};
pub use control::{ControlCommand, ControlError};
pub use double_buffer::DoubleBuffer;
pub use pixels::{PixelRenderer, RenderProps};
pub use scheduler::{CycleScheduler, CycleTiming};
pub use transport::{LedTransport, SendComplete};
