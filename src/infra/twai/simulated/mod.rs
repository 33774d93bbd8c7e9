//! In-memory TWAI peripheral.
//!
//! Reproduces the parts of the vendor driver the adapter relies on: the
//! install/start/stop state machine, bounded transmit and receive queues,
//! the alert watch-list and bus-off recovery. Test code plays the role of the
//! bus through [`SimulatedTwai::inject`], [`SimulatedTwai::take_transmitted`],
//! [`SimulatedTwai::force_bus_off`] and [`SimulatedTwai::complete_recovery`].
//!
//! Queue operations never block: a full transmit queue or an empty receive
//! queue reports [`DriverError::Timeout`] whatever the requested [`Timeout`].
use core::cell::RefCell;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    channel::Channel,
    signal::Signal,
};

use super::{Alerts, DriverState, Mode, StatusInfo, Timeout, TwaiConfig, TwaiDriver, TwaiFrame};
use crate::error::DriverError;
use crate::infra::twai::config::MAX_QUEUE_LEN;

/// Storage reserved for each simulated queue.
pub const SIM_QUEUE_CAPACITY: usize = MAX_QUEUE_LEN as usize;

struct SimState {
    installed: bool,
    state: DriverState,
    config: Option<TwaiConfig>,
    enabled_alerts: Alerts,
    pending_alerts: Alerts,
    install_failure: Option<DriverError>,
    transmit_failure: Option<(DriverError, DriverState)>,
    install_count: u32,
    start_count: u32,
    recovery_count: u32,
    rejected_recovery_count: u32,
    tx_error_counter: u32,
    rx_missed_count: u32,
}

impl SimState {
    const fn new() -> Self {
        Self {
            installed: false,
            state: DriverState::Stopped,
            config: None,
            enabled_alerts: Alerts::NONE,
            pending_alerts: Alerts::NONE,
            install_failure: None,
            transmit_failure: None,
            install_count: 0,
            start_count: 0,
            recovery_count: 0,
            rejected_recovery_count: 0,
            tx_error_counter: 0,
            rx_missed_count: 0,
        }
    }

    fn raise(&mut self, alerts: Alerts) -> bool {
        let enabled = alerts & self.enabled_alerts;
        self.pending_alerts |= enabled;
        !enabled.is_empty()
    }
}

/// Simulated peripheral. `const`-constructible so it can live in a `static`.
pub struct SimulatedTwai {
    state: Mutex<CriticalSectionRawMutex, RefCell<SimState>>,
    tx_queue: Channel<CriticalSectionRawMutex, TwaiFrame, SIM_QUEUE_CAPACITY>,
    rx_queue: Channel<CriticalSectionRawMutex, TwaiFrame, SIM_QUEUE_CAPACITY>,
    alert_signal: Signal<CriticalSectionRawMutex, ()>,
}

impl SimulatedTwai {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SimState::new())),
            tx_queue: Channel::new(),
            rx_queue: Channel::new(),
            alert_signal: Signal::new(),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    fn drain(queue: &Channel<CriticalSectionRawMutex, TwaiFrame, SIM_QUEUE_CAPACITY>) {
        while queue.try_receive().is_ok() {}
    }

    //==============================================================================BUS_SIDE
    /// Deliver a frame from the bus into the receive queue.
    ///
    /// Returns `false` when the controller is not running or the queue is full;
    /// a full queue counts as a missed frame and raises `RX_QUEUE_FULL`.
    pub fn inject(&self, frame: TwaiFrame) -> bool {
        let accepted = self.with_state(|state| {
            if !state.installed || state.state != DriverState::Running {
                return None;
            }
            let depth = state.config.map_or(0, |c| c.rx_queue_len) as usize;
            if self.rx_queue.len() >= depth || self.rx_queue.try_send(frame).is_err() {
                state.rx_missed_count += 1;
                Some((false, state.raise(Alerts::RX_QUEUE_FULL)))
            } else {
                Some((true, state.raise(Alerts::RX_DATA)))
            }
        });
        match accepted {
            Some((queued, wake)) => {
                if wake {
                    self.alert_signal.signal(());
                }
                queued
            }
            None => false,
        }
    }

    /// Pop the oldest frame waiting for transmission, as if it went on the wire.
    pub fn take_transmitted(&self) -> Option<TwaiFrame> {
        let frame = self.tx_queue.try_receive().ok()?;
        let mut raised = Alerts::TX_SUCCESS;
        if self.tx_queue.is_empty() {
            raised |= Alerts::TX_IDLE;
        }
        if self.with_state(|state| state.raise(raised)) {
            self.alert_signal.signal(());
        }
        Some(frame)
    }

    /// Raise arbitrary alerts; only those in the enabled watch-list are kept.
    pub fn raise_alerts(&self, alerts: Alerts) {
        if self.with_state(|state| state.raise(alerts)) {
            self.alert_signal.signal(());
        }
    }

    /// Push the controller into bus-off: pending transmissions are lost.
    pub fn force_bus_off(&self) {
        let wake = self.with_state(|state| {
            if !state.installed {
                return false;
            }
            state.state = DriverState::BusOff;
            state.tx_error_counter = 256;
            state.raise(Alerts::BUS_OFF)
        });
        Self::drain(&self.tx_queue);
        if wake {
            self.alert_signal.signal(());
        }
    }

    /// Finish an initiated recovery: the controller returns to the stopped
    /// state and `BUS_RECOVERED` is raised. Returns `false` if no recovery was
    /// in progress.
    pub fn complete_recovery(&self) -> bool {
        let outcome = self.with_state(|state| {
            if state.state != DriverState::Recovering {
                return None;
            }
            state.state = DriverState::Stopped;
            state.tx_error_counter = 0;
            Some(state.raise(Alerts::BUS_RECOVERED))
        });
        match outcome {
            Some(wake) => {
                if wake {
                    self.alert_signal.signal(());
                }
                true
            }
            None => false,
        }
    }

    /// Make the next `install` fail with `error`.
    pub fn fail_next_install(&self, error: DriverError) {
        self.with_state(|state| state.install_failure = Some(error));
    }

    /// Make the next `transmit` find the controller in `state` and fail with
    /// `error`, as when the bus drops between a status check and the transmit.
    pub fn fail_next_transmit(&self, error: DriverError, next_state: DriverState) {
        self.with_state(|state| state.transmit_failure = Some((error, next_state)));
    }

    //==============================================================================INSPECTION
    pub fn is_installed(&self) -> bool {
        self.with_state(|state| state.installed)
    }

    pub fn state(&self) -> DriverState {
        self.with_state(|state| state.state)
    }

    /// Configuration passed to the last successful `install`.
    pub fn installed_config(&self) -> Option<TwaiConfig> {
        self.with_state(|state| state.config)
    }

    pub fn enabled_alerts(&self) -> Alerts {
        self.with_state(|state| state.enabled_alerts)
    }

    pub fn install_count(&self) -> u32 {
        self.with_state(|state| state.install_count)
    }

    pub fn start_count(&self) -> u32 {
        self.with_state(|state| state.start_count)
    }

    pub fn recovery_count(&self) -> u32 {
        self.with_state(|state| state.recovery_count)
    }

    /// `initiate_recovery` calls refused because the controller was not bus-off.
    pub fn rejected_recovery_count(&self) -> u32 {
        self.with_state(|state| state.rejected_recovery_count)
    }

    /// Frames waiting in the transmit queue.
    pub fn pending_transmit(&self) -> usize {
        self.tx_queue.len()
    }
}

impl Default for SimulatedTwai {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================DRIVER_IMPL
impl TwaiDriver for SimulatedTwai {
    fn install(&self, config: &TwaiConfig) -> Result<(), DriverError> {
        self.with_state(|state| {
            if state.installed {
                return Err(DriverError::InvalidState);
            }
            if let Some(error) = state.install_failure.take() {
                return Err(error);
            }
            state.installed = true;
            state.state = DriverState::Stopped;
            state.config = Some(*config);
            state.enabled_alerts = config.alerts;
            state.pending_alerts = Alerts::NONE;
            state.tx_error_counter = 0;
            state.install_count += 1;
            Ok(())
        })?;
        Self::drain(&self.tx_queue);
        Self::drain(&self.rx_queue);
        Ok(())
    }

    fn uninstall(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.installed {
                return Err(DriverError::InvalidState);
            }
            if matches!(state.state, DriverState::Running | DriverState::Recovering) {
                return Err(DriverError::InvalidState);
            }
            state.installed = false;
            state.state = DriverState::Stopped;
            state.enabled_alerts = Alerts::NONE;
            state.pending_alerts = Alerts::NONE;
            Ok(())
        })?;
        Self::drain(&self.tx_queue);
        Self::drain(&self.rx_queue);
        // Wake a pending `read_alerts` so it can observe the uninstall.
        self.alert_signal.signal(());
        Ok(())
    }

    fn start(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.installed || state.state != DriverState::Stopped {
                return Err(DriverError::InvalidState);
            }
            state.state = DriverState::Running;
            state.start_count += 1;
            Ok(())
        })
    }

    fn stop(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.installed || state.state != DriverState::Running {
                return Err(DriverError::InvalidState);
            }
            state.state = DriverState::Stopped;
            Ok(())
        })?;
        Self::drain(&self.tx_queue);
        Ok(())
    }

    fn transmit(&self, frame: &TwaiFrame, _timeout: Timeout) -> Result<(), DriverError> {
        let depth = self.with_state(|state| {
            if !state.installed || state.state != DriverState::Running {
                return Err(DriverError::InvalidState);
            }
            if let Some((error, next)) = state.transmit_failure.take() {
                state.state = next;
                return Err(error);
            }
            match state.config {
                Some(config) if config.mode == Mode::ListenOnly => Err(DriverError::NotSupported),
                Some(config) => Ok(config.tx_queue_len as usize),
                None => Err(DriverError::InvalidState),
            }
        })?;
        if self.tx_queue.len() >= depth {
            return Err(DriverError::Timeout);
        }
        self.tx_queue
            .try_send(*frame)
            .map_err(|_| DriverError::Timeout)
    }

    fn receive(&self, _timeout: Timeout) -> Result<TwaiFrame, DriverError> {
        if !self.is_installed() {
            return Err(DriverError::InvalidState);
        }
        self.rx_queue.try_receive().map_err(|_| DriverError::Timeout)
    }

    fn status(&self) -> Result<StatusInfo, DriverError> {
        let mut status = self.with_state(|state| {
            if !state.installed {
                return Err(DriverError::InvalidState);
            }
            let mut status = StatusInfo::new(state.state);
            status.tx_error_counter = state.tx_error_counter;
            status.rx_missed_count = state.rx_missed_count;
            Ok(status)
        })?;
        status.msgs_to_tx = self.tx_queue.len() as u32;
        status.msgs_to_rx = self.rx_queue.len() as u32;
        Ok(status)
    }

    fn reconfigure_alerts(&self, alerts: Alerts) -> Result<Alerts, DriverError> {
        self.with_state(|state| {
            if !state.installed {
                return Err(DriverError::InvalidState);
            }
            let previous = state.pending_alerts;
            state.enabled_alerts = alerts;
            state.pending_alerts = Alerts::NONE;
            Ok(previous)
        })
    }

    fn initiate_recovery(&self) -> Result<(), DriverError> {
        self.with_state(|state| {
            if !state.installed || state.state != DriverState::BusOff {
                state.rejected_recovery_count += 1;
                return Err(DriverError::InvalidState);
            }
            state.state = DriverState::Recovering;
            state.recovery_count += 1;
            Ok(())
        })
    }

    async fn read_alerts(&self) -> Result<Alerts, DriverError> {
        loop {
            let taken = self.with_state(|state| {
                if !state.installed {
                    return Err(DriverError::InvalidState);
                }
                let pending = state.pending_alerts;
                state.pending_alerts = Alerts::NONE;
                Ok(pending)
            })?;
            if !taken.is_empty() {
                return Ok(taken);
            }
            self.alert_signal.wait().await;
        }
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
