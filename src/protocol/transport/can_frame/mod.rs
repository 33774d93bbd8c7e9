//! In-memory representation of an SAE J1939 / NMEA 2000 CAN frame.
use crate::infra::twai::TwaiFrame;
use crate::protocol::transport::{can_id::CanId, MAX_CAN_DATA_LEN};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw NMEA 2000 frame as read from the CAN bus.
pub struct CanFrame {
    /// Full 29-bit CAN identifier stored inside a `u32`.
    pub id: CanId,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Build a frame, keeping at most eight payload bytes.
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_CAN_DATA_LEN);
        let mut data = [0u8; MAX_CAN_DATA_LEN];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: CanId::new(id),
            data,
            len,
        }
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(MAX_CAN_DATA_LEN)]
    }

    /// Convert a peripheral frame. Standard (11-bit) frames have no NMEA 2000
    /// meaning and yield `None`.
    pub fn from_twai(frame: &TwaiFrame) -> Option<Self> {
        frame
            .is_extended()
            .then(|| Self::new(frame.identifier(), frame.payload()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Payloads longer than a classic frame are cut to eight bytes.
    fn test_new_clamps_payload() {
        let frame = CanFrame::new(0x18FEDF00, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(frame.len, 8);
        assert_eq!(frame.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    /// Only extended peripheral frames convert.
    fn test_from_twai() {
        let extended = TwaiFrame::new_extended(0x0DF01023, &[0xAB, 0xCD]);
        let frame = CanFrame::from_twai(&extended).expect("extended frame converts");
        assert_eq!(frame.id, CanId(0x0DF01023));
        assert_eq!(frame.payload(), &[0xAB, 0xCD]);

        let standard = TwaiFrame::new_standard(0x123, &[1]).expect("valid standard frame");
        assert!(CanFrame::from_twai(&standard).is_none());
    }
}
