//! Decomposition of the 29-bit CAN identifiers used by NMEA 2000
//! (SAE J1939 layout).
//!
//! ```text
//!  28..26    25   24   23..16   15..8   7..0
//! priority   R    DP     PF       PS     SA
//! ```
use crate::protocol::transport::{BROADCAST_ADDRESS, EXTENDED_ID_MASK, PDU2_FORMAT_MIN};

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, PGN, destination, and source.
pub struct CanId(pub u32);

impl CanId {
    /// Wrap a raw identifier, dropping bits above bit 28.
    pub const fn new(raw: u32) -> Self {
        Self(raw & EXTENDED_ID_MASK)
    }

    /// Returns the priority (3 bits, value 0-7) encoded in the CAN ID.
    pub const fn priority(&self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }

    /// Data page bit.
    pub const fn data_page(&self) -> u8 {
        ((self.0 >> 24) & 0x01) as u8
    }

    /// PDU format byte (PF).
    pub const fn pdu_format(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// PDU specific byte (PS): destination in PDU1, group extension in PDU2.
    pub const fn pdu_specific(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// PF ≥ 240: broadcast message with an implicit destination.
    pub const fn is_broadcast(&self) -> bool {
        self.pdu_format() >= PDU2_FORMAT_MIN
    }

    /// Extracts the PGN, handling the PDU1/PDU2 distinction.
    pub const fn pgn(&self) -> u32 {
        let base = ((self.data_page() as u32) << 16) | ((self.pdu_format() as u32) << 8);
        if self.is_broadcast() {
            // PDU2: the PS byte extends the PGN.
            base | self.pdu_specific() as u32
        } else {
            // PDU1: PS stores the explicit destination.
            base
        }
    }

    /// Destination address: PS for PDU1, [`BROADCAST_ADDRESS`] for PDU2.
    pub const fn destination(&self) -> u8 {
        if self.is_broadcast() {
            BROADCAST_ADDRESS
        } else {
            self.pdu_specific()
        }
    }

    /// Eight-bit source address (logical node identifier on the N2K network).
    pub const fn source_address(&self) -> u8 {
        self.0 as u8
    }

    /// All routing fields at once.
    pub const fn routing_fields(&self) -> RoutingFields {
        RoutingFields {
            priority: self.priority(),
            pgn: self.pgn(),
            source: self.source_address(),
            destination: self.destination(),
        }
    }
}

impl From<u32> for CanId {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}

//==================================================================================ROUTING
/// Routing tuple carried by an NMEA 2000 identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoutingFields {
    pub priority: u8,
    pub pgn: u32,
    pub source: u8,
    pub destination: u8,
}

/// Split a raw identifier into (priority, PGN, source, destination).
///
/// Pure and total; the adapter only uses it for frame tracing.
pub const fn extract_routing_fields(id: u32) -> RoutingFields {
    CanId::new(id).routing_fields()
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
