//! Bridge from the synchronous [`FrameTransport`] contract to the asynchronous
//! [`CanBus`] contract.
//!
//! Sends block until the frame is queued; receives poll the transport and sleep
//! between empty polls so the executor can run other tasks.
use crate::error::PollingError;
use crate::protocol::transport::{
    can_frame::CanFrame,
    traits::{can_bus::CanBus, frame_transport::FrameTransport, korri_timer::KorriTimer},
};

/// Default delay between two empty receive polls (ms).
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 1;

/// `CanBus` implementation over any `FrameTransport`.
pub struct PollingCanBus<T: FrameTransport, Tm: KorriTimer> {
    transport: T,
    timer: Tm,
    poll_interval_ms: u32,
}

impl<T: FrameTransport, Tm: KorriTimer> PollingCanBus<T, Tm> {
    /// Open the transport and wrap it.
    pub fn new(mut transport: T, timer: Tm) -> Result<Self, PollingError> {
        if !transport.open() {
            return Err(PollingError::OpenFailed);
        }
        Ok(Self {
            transport,
            timer,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        })
    }

    /// Override the delay between empty polls (at least 1 ms).
    #[must_use]
    pub fn with_poll_interval(mut self, millis: u32) -> Self {
        self.poll_interval_ms = millis.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: FrameTransport, Tm: KorriTimer> CanBus for PollingCanBus<T, Tm> {
    type Error = PollingError;

    async fn send(&mut self, frame: &CanFrame) -> Result<(), Self::Error> {
        if self.transport.send_frame(frame.id.0, frame.payload(), true) {
            Ok(())
        } else {
            Err(PollingError::SendRejected)
        }
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        loop {
            if let Some(frame) = self.transport.receive_frame() {
                return Ok(frame);
            }
            self.timer.delay_ms(self.poll_interval_ms).await;
        }
    }
}
