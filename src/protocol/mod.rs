//! NMEA 2000 view of the bus: 29-bit identifiers, frames and the transport
//! contracts consumed by a base library.
pub mod transport;
