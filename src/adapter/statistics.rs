//! Bus throughput statistics.
//!
//! The adapter counts bits and frames in each direction; once per second the
//! [`StatisticsRunner`] folds the raw counts into per-second rates with an
//! exponential smoothing filter biased towards the last second:
//!
//! ```text
//! rate = rate * 0.05 + count * 0.95
//! count = 0
//! ```
//!
//! Counters and rates share one critical-section mutex so an increment from
//! the send/receive path can never interleave with a decay step.
use core::cell::Cell;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    signal::Signal,
};
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::protocol::transport::{frame_bits, traits::korri_timer::KorriTimer};

/// Decay period (ms).
pub const STATISTICS_PERIOD_MS: u32 = 1000;
/// Weight of the last period's count.
pub const RATE_WEIGHT_NEW: f64 = 0.95;
/// Weight of the previous rate.
pub const RATE_WEIGHT_OLD: f64 = 0.05;

/// One smoothing step, truncated to an integer rate.
pub fn smooth(rate: u32, count: u32) -> u32 {
    (rate as f64 * RATE_WEIGHT_OLD + count as f64 * RATE_WEIGHT_NEW) as u32
}

/// Smoothed per-second rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThroughputRates {
    pub rx_bits_per_second: u32,
    pub rx_packets_per_second: u32,
    pub tx_bits_per_second: u32,
    pub tx_packets_per_second: u32,
}

/// Raw counts accumulated since the last decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThroughputCounts {
    pub rx_bits: u32,
    pub rx_packets: u32,
    pub tx_bits: u32,
    pub tx_packets: u32,
}

#[derive(Clone, Copy)]
struct StatsState {
    counts: ThroughputCounts,
    rates: ThroughputRates,
}

impl StatsState {
    const fn new() -> Self {
        Self {
            counts: ThroughputCounts {
                rx_bits: 0,
                rx_packets: 0,
                tx_bits: 0,
                tx_packets: 0,
            },
            rates: ThroughputRates {
                rx_bits_per_second: 0,
                rx_packets_per_second: 0,
                tx_bits_per_second: 0,
                tx_packets_per_second: 0,
            },
        }
    }
}

//==================================================================================BUS_STATISTICS
/// Counters shared between the caller's send/receive path and the decay runner.
pub struct BusStatistics {
    state: Mutex<CriticalSectionRawMutex, Cell<StatsState>>,
}

impl BusStatistics {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(StatsState::new())),
        }
    }

    fn update(&self, f: impl FnOnce(&mut StatsState)) {
        self.state.lock(|cell| {
            let mut state = cell.get();
            f(&mut state);
            cell.set(state);
        });
    }

    /// Account for a received frame of `len` payload bytes.
    pub fn record_rx(&self, len: usize) {
        self.update(|state| {
            state.counts.rx_bits = state.counts.rx_bits.saturating_add(frame_bits(len));
            state.counts.rx_packets = state.counts.rx_packets.saturating_add(1);
        });
    }

    /// Account for a queued frame of `len` payload bytes.
    pub fn record_tx(&self, len: usize) {
        self.update(|state| {
            state.counts.tx_bits = state.counts.tx_bits.saturating_add(frame_bits(len));
            state.counts.tx_packets = state.counts.tx_packets.saturating_add(1);
        });
    }

    /// Fold the raw counts into the rates and reset them.
    pub fn decay(&self) {
        self.update(|state| {
            let counts = core::mem::take(&mut state.counts);
            let rates = &mut state.rates;
            rates.rx_packets_per_second = smooth(rates.rx_packets_per_second, counts.rx_packets);
            rates.rx_bits_per_second = smooth(rates.rx_bits_per_second, counts.rx_bits);
            rates.tx_packets_per_second = smooth(rates.tx_packets_per_second, counts.tx_packets);
            rates.tx_bits_per_second = smooth(rates.tx_bits_per_second, counts.tx_bits);
        });
    }

    pub fn rates(&self) -> ThroughputRates {
        self.state.lock(|cell| cell.get().rates)
    }

    pub fn counts(&self) -> ThroughputCounts {
        self.state.lock(|cell| cell.get().counts)
    }
}

impl Default for BusStatistics {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================RUNNER
/// Periodic decay task. Returns once the owning adapter is closed.
pub struct StatisticsRunner<'d, T: KorriTimer> {
    statistics: &'d BusStatistics,
    stop: &'d Signal<CriticalSectionRawMutex, ()>,
    timer: T,
}

impl<'d, T: KorriTimer> StatisticsRunner<'d, T> {
    pub(crate) fn new(
        statistics: &'d BusStatistics,
        stop: &'d Signal<CriticalSectionRawMutex, ()>,
        timer: T,
    ) -> Self {
        Self {
            statistics,
            stop,
            timer,
        }
    }

    pub async fn run(&mut self) {
        loop {
            let stopped = {
                let tick = self.timer.delay_ms(STATISTICS_PERIOD_MS);
                let stop = self.stop.wait();
                pin_mut!(tick);
                pin_mut!(stop);
                matches!(select(tick, stop).await, Either::Right(_))
            };
            if stopped {
                debug!("statistics runner stopped");
                return;
            }
            self.statistics.decay();
        }
    }
}

//==================================================================================TESTS
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// One decay step follows `r * 0.05 + c * 0.95` and clears the counter.
    fn test_decay_formula() {
        let stats = BusStatistics::new();
        for _ in 0..1000 {
            stats.record_rx(8);
        }
        stats.decay();
        let rates = stats.rates();
        assert_eq!(rates.rx_packets_per_second, 950);
        assert_eq!(rates.rx_bits_per_second, smooth(0, 1000 * 116));
        assert_eq!(stats.counts(), ThroughputCounts::default());

        stats.decay();
        assert_eq!(stats.rates().rx_packets_per_second, 47);
    }

    #[test]
    /// The filter matches the closed form for a spread of inputs.
    fn test_smooth_matches_closed_form() {
        for rate in [0u32, 1, 19, 950, 65_535, 4_000_000] {
            for count in [0u32, 1, 7, 20, 1000, 250_000, u32::MAX] {
                let expected = (rate as f64 * 0.05 + count as f64 * 0.95) as u32;
                assert_eq!(smooth(rate, count), expected);
            }
        }
        assert_eq!(smooth(1000, 0), 50);
        assert_eq!(smooth(0, 1000), 950);
    }

    #[test]
    /// Frames are counted with the 52-bit header overhead.
    fn test_frame_bit_accounting() {
        let stats = BusStatistics::new();
        stats.record_tx(0);
        stats.record_tx(8);
        let counts = stats.counts();
        assert_eq!(counts.tx_packets, 2);
        assert_eq!(counts.tx_bits, 52 + 116);
        assert_eq!(counts.rx_packets, 0);
    }
}
