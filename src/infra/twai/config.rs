//! Peripheral configuration handed to [`TwaiDriver::install`](super::TwaiDriver::install).
//!
//! All values are fixed, known-good constants; nothing here computes timing
//! registers. The helpers on [`TimingConfig`] only check a constant against a
//! clock.
use super::alerts::Alerts;

/// Default transmit pin (GPIO number).
pub const DEFAULT_TX_PIN: u8 = 16;
/// Default receive pin (GPIO number).
pub const DEFAULT_RX_PIN: u8 = 4;
/// Default depth of both driver queues.
pub const DEFAULT_QUEUE_LEN: u32 = 32;
/// Largest queue depth accepted by the builders.
pub const MAX_QUEUE_LEN: u32 = 50;
/// TWAI source clock on the ESP32 family (APB).
pub const TWAI_CLOCK_HZ: u32 = 80_000_000;

/// Controller operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Transmits, receives and acknowledges.
    #[default]
    Normal,
    /// Transmits without requiring acknowledgement (self test).
    NoAck,
    /// Receives only, never influences the bus.
    ListenOnly,
}

/// Bit-timing register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    /// Baud rate prescaler.
    pub brp: u32,
    /// Time segment 1, in time quanta.
    pub tseg_1: u8,
    /// Time segment 2, in time quanta.
    pub tseg_2: u8,
    /// Synchronization jump width, in time quanta.
    pub sjw: u8,
    /// Sample each bit three times.
    pub triple_sampling: bool,
}

impl TimingConfig {
    /// NMEA 2000 / SAE J1939-21: 250 kbit/s with the sample point at 87.5 %
    /// (as close as possible without going past), SJW = 1.
    pub const NMEA2000: Self = Self {
        brp: 20,
        tseg_1: 13,
        tseg_2: 2,
        sjw: 1,
        triple_sampling: true,
    };

    /// Vendor 250 kbit/s preset (sample point 80 %).
    pub const B250K: Self = Self {
        brp: 16,
        tseg_1: 15,
        tseg_2: 4,
        sjw: 3,
        triple_sampling: false,
    };

    /// Time quanta per bit (sync segment included).
    pub const fn quanta_per_bit(&self) -> u32 {
        1 + self.tseg_1 as u32 + self.tseg_2 as u32
    }

    /// Resulting bit rate for a given source clock.
    pub const fn bitrate(&self, clock_hz: u32) -> u32 {
        clock_hz / self.brp / self.quanta_per_bit()
    }

    /// Sample point position in per mille of the bit time.
    pub const fn sample_point_permille(&self) -> u32 {
        (1 + self.tseg_1 as u32) * 1000 / self.quanta_per_bit()
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::NMEA2000
    }
}

/// Acceptance filter (single filter mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterConfig {
    pub acceptance_code: u32,
    pub acceptance_mask: u32,
    pub single_filter: bool,
}

impl FilterConfig {
    /// Let every frame through.
    pub const ACCEPT_ALL: Self = Self {
        acceptance_code: 0,
        acceptance_mask: 0xFFFF_FFFF,
        single_filter: true,
    };
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::ACCEPT_ALL
    }
}

/// Interrupt allocation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IntrFlags {
    /// Interrupt priority level (1..=3 for C handlers).
    pub level: u8,
    /// Handler placed in IRAM so it keeps running while flash cache is disabled.
    pub iram: bool,
}

impl Default for IntrFlags {
    fn default() -> Self {
        Self {
            level: 3,
            iram: cfg!(feature = "isr-in-iram"),
        }
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwaiConfig {
    pub tx_pin: u8,
    pub rx_pin: u8,
    pub mode: Mode,
    pub tx_queue_len: u32,
    pub rx_queue_len: u32,
    /// Alerts enabled at install time.
    pub alerts: Alerts,
    pub intr_flags: IntrFlags,
    pub timing: TimingConfig,
    pub filter: FilterConfig,
}

impl TwaiConfig {
    pub fn new() -> Self {
        Self {
            tx_pin: DEFAULT_TX_PIN,
            rx_pin: DEFAULT_RX_PIN,
            mode: Mode::Normal,
            tx_queue_len: DEFAULT_QUEUE_LEN,
            rx_queue_len: DEFAULT_QUEUE_LEN,
            alerts: Alerts::ALERTS_TO_WATCH,
            intr_flags: IntrFlags::default(),
            timing: TimingConfig::NMEA2000,
            filter: FilterConfig::ACCEPT_ALL,
        }
    }

    #[must_use]
    pub fn pins(mut self, tx_pin: u8, rx_pin: u8) -> Self {
        self.tx_pin = tx_pin;
        self.rx_pin = rx_pin;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Queue depth, clamped to `1..=MAX_QUEUE_LEN`.
    #[must_use]
    pub fn tx_queue_len(mut self, len: u32) -> Self {
        self.tx_queue_len = len.clamp(1, MAX_QUEUE_LEN);
        self
    }

    /// Queue depth, clamped to `1..=MAX_QUEUE_LEN`.
    #[must_use]
    pub fn rx_queue_len(mut self, len: u32) -> Self {
        self.rx_queue_len = len.clamp(1, MAX_QUEUE_LEN);
        self
    }

    #[must_use]
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn intr_flags(mut self, flags: IntrFlags) -> Self {
        self.intr_flags = flags;
        self
    }
}

impl Default for TwaiConfig {
    fn default() -> Self {
        Self::new()
    }
}
