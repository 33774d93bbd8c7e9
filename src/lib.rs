//! `korri-twai`: NMEA 2000 CAN adapter for the ESP32 TWAI controller, in a
//! `no_std` environment. The crate exposes the peripheral layer (driver seam,
//! exclusive ownership registry), the adapter with its alert and statistics
//! tasks, and the transport contracts an NMEA 2000 stack plugs into.
#![no_std]
//==================================================================================
// Must come first so the logging macros are visible to every other module.
pub(crate) mod fmt;
//==================================================================================
/// CAN adapter over the TWAI controller and its background tasks.
pub mod adapter;
/// Driver, adapter and transport errors.
pub mod error;
/// Peripheral layer: TWAI driver seam and controller ownership.
pub mod infra;
/// NMEA 2000 side: CAN identifiers, frames and transport contracts.
pub mod protocol;
//==================================================================================
