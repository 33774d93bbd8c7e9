//! NMEA 2000 transport seam: CAN frame representations, 29-bit identifier
//! decomposition, and the transport traits a protocol stack consumes.
//!
//! ## Frame constants
//!
//! NMEA 2000 runs exclusively on extended (29-bit) identifiers at 250 kbit/s
//! with classic CAN payloads of at most eight bytes.

pub mod can_frame;
pub mod can_id;
pub mod loopback;
pub mod polling;
pub mod traits;

/// Maximum classic CAN payload, in bytes.
pub const MAX_CAN_DATA_LEN: usize = 8;

/// Mask of the significant bits of an extended identifier.
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Destination implied by PDU2 (broadcast) messages.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// First PDU format value of the PDU2 (broadcast) range.
pub const PDU2_FORMAT_MIN: u8 = 240;

/// Bits counted for an extended frame on top of its payload when estimating
/// bus throughput (arbitration, control, CRC, ACK and end-of-frame fields,
/// without stuff bits).
pub const CAN_FRAME_HEADER_BITS: u32 = 52;

/// Approximate number of bits a frame occupies on the wire.
pub const fn frame_bits(len: usize) -> u32 {
    CAN_FRAME_HEADER_BITS + (len as u32) * 8
}
