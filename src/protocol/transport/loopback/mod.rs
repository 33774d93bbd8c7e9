//! In-memory [`FrameTransport`] where every sent frame is received back by the
//! same transport. Lets protocol code run on the host without any peripheral.
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};

use crate::protocol::transport::{can_frame::CanFrame, traits::frame_transport::FrameTransport};

/// Self-receiving transport holding up to `N` frames.
pub struct LoopbackTransport<const N: usize> {
    queue: Channel<NoopRawMutex, CanFrame, N>,
    open: bool,
}

impl<const N: usize> LoopbackTransport<N> {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Frames waiting to be received.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<const N: usize> Default for LoopbackTransport<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameTransport for LoopbackTransport<N> {
    fn open(&mut self) -> bool {
        self.open = true;
        true
    }

    /// Non-blocking whatever `wait_sent` says: a full queue rejects the frame.
    fn send_frame(&mut self, id: u32, data: &[u8], _wait_sent: bool) -> bool {
        if !self.open {
            return false;
        }
        let frame = CanFrame::new(id, data);
        match self.queue.try_send(frame) {
            Ok(()) => true,
            Err(_) => {
                debug!("loopback queue full, dropping frame {:#x}", id);
                false
            }
        }
    }

    fn receive_frame(&mut self) -> Option<CanFrame> {
        if !self.open {
            return None;
        }
        self.queue.try_receive().ok()
    }

    /// Discard every queued frame.
    fn init_frame_buffers(&mut self) {
        while self.queue.try_receive().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Nothing moves before `open`.
    fn test_closed_transport_rejects() {
        let mut transport = LoopbackTransport::<4>::new();
        assert!(!transport.send_frame(0x18FEDF00, &[1], false));
        assert!(transport.receive_frame().is_none());
    }

    #[test]
    /// Sent frames come back in order, truncated to eight bytes.
    fn test_frames_loop_back() {
        let mut transport = LoopbackTransport::<4>::new();
        assert!(transport.open());
        assert!(transport.send_frame(0x18FEDF00, &[1, 2], true));
        assert!(transport.send_frame(0x0DEA2342, &[0; 12], false));

        let first = transport.receive_frame().expect("first frame");
        assert_eq!(first.id.0, 0x18FEDF00);
        assert_eq!(first.payload(), &[1, 2]);

        let second = transport.receive_frame().expect("second frame");
        assert_eq!(second.len, 8);
        assert!(transport.receive_frame().is_none());
    }

    #[test]
    /// A full queue rejects the frame; `init_frame_buffers` empties it.
    fn test_capacity_and_reset() {
        let mut transport = LoopbackTransport::<1>::new();
        transport.open();
        assert!(transport.send_frame(0x1, &[], false));
        assert!(!transport.send_frame(0x2, &[], false));
        assert_eq!(transport.pending(), 1);
        transport.init_frame_buffers();
        assert_eq!(transport.pending(), 0);
    }
}
