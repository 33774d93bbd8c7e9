//! Asynchronous CAN bus contract used by korri-style protocol stacks
//! (address claiming, fast-packet senders). Any [`FrameTransport`] can be
//! plugged in through [`PollingCanBus`].
//!
//! [`FrameTransport`]: super::frame_transport::FrameTransport
//! [`PollingCanBus`]: crate::protocol::transport::polling::PollingCanBus
use crate::protocol::transport::can_frame::CanFrame;
use core::future::Future;

/// Contract to send and receive CAN frames asynchronously.
pub trait CanBus {
    type Error: core::fmt::Debug;
    /// Emit a frame on the bus.
    fn send<'a>(
        &'a mut self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Resolve with the next extended frame received.
    fn recv<'a>(&'a mut self) -> impl Future<Output = Result<CanFrame, Self::Error>> + 'a;
}
