//! Hardware transport contract consumed by an NMEA 2000 base library.
//!
//! The base library drives the bus through four calls and only ever looks at a
//! success flag: a `false` from `send_frame` means "drop and retry later", a
//! `None` from `receive_frame` means "nothing to process right now". Error
//! details stay inside the implementation (logged, never returned).
use crate::protocol::transport::can_frame::CanFrame;

/// Capability interface implemented by each CAN backend.
pub trait FrameTransport {
    /// Acquire and start the underlying bus. Idempotent.
    fn open(&mut self) -> bool;

    /// Queue an extended frame. Payloads longer than eight bytes are truncated.
    ///
    /// `wait_sent` selects between blocking until queue space is available and a
    /// non-blocking attempt that fails fast.
    fn send_frame(&mut self, id: u32, data: &[u8], wait_sent: bool) -> bool;

    /// Fetch the next extended frame, if any.
    fn receive_frame(&mut self) -> Option<CanFrame>;

    /// Hook called by the base library when it sets up its own frame buffers.
    fn init_frame_buffers(&mut self) {}
}
