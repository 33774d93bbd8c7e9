//! Seam between the adapter and the vendor TWAI (ESP32 CAN) peripheral driver.
//!
//! [`TwaiDriver`] mirrors the ESP-IDF `twai_*` API: install/uninstall,
//! start/stop, queue access with timeouts, status query, alert handling and
//! bus-off recovery. The controller is a single global resource, so every
//! method takes `&self` and the driver handle can be shared between the adapter
//! and its alert monitor.
use core::future::Future;

use embassy_time::Duration;

use crate::error::DriverError;
use crate::protocol::transport::{EXTENDED_ID_MASK, MAX_CAN_DATA_LEN};

pub mod alerts;
pub mod config;
#[cfg(feature = "esp-idf")]
pub mod esp_idf;
pub mod simulated;

pub use alerts::Alerts;
pub use config::{FilterConfig, IntrFlags, Mode, TimingConfig, TwaiConfig};

//==================================================================================TIMEOUT
/// How long a queue operation may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Fail straight away when the queue is empty/full.
    #[default]
    Immediate,
    /// Block until the operation can complete.
    Forever,
    /// Block for at most the given duration.
    After(Duration),
}

impl Timeout {
    /// The wait in scheduler ticks at `tick_rate_hz`, where `forever` is the
    /// scheduler's "block indefinitely" value. A finite wait is at least one
    /// tick and saturates just below `forever`.
    pub fn ticks(self, tick_rate_hz: u32, forever: u64) -> u64 {
        match self {
            Timeout::Immediate => 0,
            Timeout::Forever => forever,
            Timeout::After(duration) => {
                let ticks = duration.as_millis().saturating_mul(tick_rate_hz as u64) / 1000;
                ticks.clamp(1, forever.saturating_sub(1).max(1))
            }
        }
    }
}

//==================================================================================STATUS
/// Controller state as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// Installed but not participating in bus activity.
    Stopped,
    /// Transmitting and receiving.
    Running,
    /// Error counters exceeded the bus-off limit.
    BusOff,
    /// Bus-off recovery in progress.
    Recovering,
}

/// Snapshot of the driver status registers and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusInfo {
    pub state: DriverState,
    /// Frames waiting in the transmit queue.
    pub msgs_to_tx: u32,
    /// Frames waiting in the receive queue.
    pub msgs_to_rx: u32,
    pub tx_error_counter: u32,
    pub rx_error_counter: u32,
    pub tx_failed_count: u32,
    pub rx_missed_count: u32,
    pub rx_overrun_count: u32,
    pub arb_lost_count: u32,
    pub bus_error_count: u32,
}

impl StatusInfo {
    /// Zeroed status in the given state.
    pub const fn new(state: DriverState) -> Self {
        Self {
            state,
            msgs_to_tx: 0,
            msgs_to_rx: 0,
            tx_error_counter: 0,
            rx_error_counter: 0,
            tx_failed_count: 0,
            rx_missed_count: 0,
            rx_overrun_count: 0,
            arb_lost_count: 0,
            bus_error_count: 0,
        }
    }
}

//==================================================================================TWAI_FRAME
/// Frame as exchanged with the peripheral queues (`twai_message_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwaiFrame {
    id: u32,
    extended: bool,
    remote: bool,
    dlc_non_compliant: bool,
    len: u8,
    data: [u8; MAX_CAN_DATA_LEN],
}

impl TwaiFrame {
    /// Extended (29-bit) data frame. Identifier bits above 28 are dropped.
    ///
    /// Payloads longer than eight bytes are truncated to eight and the frame is
    /// flagged as length non-compliant instead of being rejected.
    pub fn new_extended(id: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_CAN_DATA_LEN);
        let mut data = [0u8; MAX_CAN_DATA_LEN];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: id & EXTENDED_ID_MASK,
            extended: true,
            remote: false,
            dlc_non_compliant: payload.len() > MAX_CAN_DATA_LEN,
            len: len as u8,
            data,
        }
    }

    /// Standard (11-bit) data frame. Returns `None` for an out-of-range
    /// identifier or a payload longer than eight bytes.
    pub fn new_standard(id: u16, payload: &[u8]) -> Option<Self> {
        if id > 0x7FF || payload.len() > MAX_CAN_DATA_LEN {
            return None;
        }
        let mut data = [0u8; MAX_CAN_DATA_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            id: id as u32,
            extended: false,
            remote: false,
            dlc_non_compliant: false,
            len: payload.len() as u8,
            data,
        })
    }

    /// Raw identifier (11 or 29 significant bits).
    pub fn identifier(&self) -> u32 {
        self.id
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// The caller asked for more than eight data bytes.
    pub fn dlc_non_compliant(&self) -> bool {
        self.dlc_non_compliant
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload bytes, `len()` long.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// The full eight-byte data field.
    pub fn raw_data(&self) -> &[u8; MAX_CAN_DATA_LEN] {
        &self.data
    }
}

impl embedded_can::Frame for TwaiFrame {
    fn new(id: impl Into<embedded_can::Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_CAN_DATA_LEN {
            return None;
        }
        match id.into() {
            embedded_can::Id::Standard(id) => Self::new_standard(id.as_raw(), data),
            embedded_can::Id::Extended(id) => Some(Self::new_extended(id.as_raw(), data)),
        }
    }

    fn new_remote(id: impl Into<embedded_can::Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_CAN_DATA_LEN {
            return None;
        }
        let (id, extended) = match id.into() {
            embedded_can::Id::Standard(id) => (id.as_raw() as u32, false),
            embedded_can::Id::Extended(id) => (id.as_raw(), true),
        };
        Some(Self {
            id,
            extended,
            remote: true,
            dlc_non_compliant: false,
            len: dlc as u8,
            data: [0; MAX_CAN_DATA_LEN],
        })
    }

    fn is_extended(&self) -> bool {
        self.extended
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> embedded_can::Id {
        if self.extended {
            match embedded_can::ExtendedId::new(self.id) {
                Some(id) => embedded_can::Id::Extended(id),
                None => embedded_can::Id::Extended(embedded_can::ExtendedId::MAX),
            }
        } else {
            match embedded_can::StandardId::new(self.id as u16) {
                Some(id) => embedded_can::Id::Standard(id),
                None => embedded_can::Id::Standard(embedded_can::StandardId::MAX),
            }
        }
    }

    fn dlc(&self) -> usize {
        self.len as usize
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            self.payload()
        }
    }
}

//==================================================================================TWAI_DRIVER
/// Operations the adapter needs from the peripheral driver.
pub trait TwaiDriver {
    /// Install the driver with the given configuration (queues, timing,
    /// filter, alerts). Leaves the controller stopped.
    fn install(&self, config: &TwaiConfig) -> Result<(), DriverError>;
    /// Free the driver. The controller must be stopped or bus-off.
    fn uninstall(&self) -> Result<(), DriverError>;
    /// Enter the running state.
    fn start(&self) -> Result<(), DriverError>;
    /// Leave the running state; pending transmissions are dropped.
    fn stop(&self) -> Result<(), DriverError>;
    /// Queue a frame for transmission.
    fn transmit(&self, frame: &TwaiFrame, timeout: Timeout) -> Result<(), DriverError>;
    /// Take the next frame from the receive queue.
    fn receive(&self, timeout: Timeout) -> Result<TwaiFrame, DriverError>;
    /// Current controller status.
    fn status(&self) -> Result<StatusInfo, DriverError>;
    /// Replace the enabled alert set; returns (and clears) the alerts raised so far.
    fn reconfigure_alerts(&self, alerts: Alerts) -> Result<Alerts, DriverError>;
    /// Begin bus-off recovery (128 occurrences of 11 recessive bits).
    fn initiate_recovery(&self) -> Result<(), DriverError>;
    /// Wait until at least one enabled alert is raised, then return and clear them.
    fn read_alerts<'a>(&'a self) -> impl Future<Output = Result<Alerts, DriverError>> + 'a;
}
