//! NMEA 2000 hardware adapter over the TWAI controller.
//!
//! [`TwaiAdapter`] implements [`FrameTransport`] for an NMEA 2000 base library:
//! it owns the controller for as long as it is open, converts frames between
//! the library's view (29-bit id + payload) and the driver's, and keeps the
//! bus usable by restarting or recovering the controller when a send finds it
//! stopped or bus-off.
//!
//! Background work runs in two tasks built from the adapter and spawned by the
//! firmware:
//! - [`AlertMonitor`]: alert callback, error logging, bus-off recovery.
//! - [`StatisticsRunner`] (feature `statistics`): once-per-second rate decay.
//!
//! Both tasks share a [`TwaiResources`] block with the adapter. It is usually a
//! `static`, the same way the firmware pre-allocates its other task channels:
//!
//! ```ignore
//! static TWAI: EspIdfTwai = EspIdfTwai::new();
//! static RESOURCES: TwaiResources = TwaiResources::new();
//!
//! let mut adapter = TwaiAdapter::new(&TWAI, &RESOURCES, AdapterConfig::new());
//! spawner.spawn(alert_task(adapter.alert_monitor()))?;
//! adapter.open();
//! ```
use core::cell::Cell;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    signal::Signal,
};

use crate::error::{AdapterError, DriverError};
use crate::infra::registry::{PeripheralRegistry, PeripheralToken, TWAI_REGISTRY};
use crate::infra::twai::{
    Alerts, DriverState, StatusInfo, Timeout, TimingConfig, TwaiConfig, TwaiDriver, TwaiFrame,
};
use crate::protocol::transport::{
    can_frame::CanFrame,
    can_id::{extract_routing_fields, RoutingFields},
    traits::frame_transport::FrameTransport,
};

pub mod alert_monitor;
#[cfg(feature = "statistics")]
pub mod statistics;

pub use alert_monitor::AlertMonitor;
#[cfg(feature = "statistics")]
pub use statistics::{BusStatistics, StatisticsRunner, ThroughputRates};
#[cfg(feature = "statistics")]
use crate::protocol::transport::traits::korri_timer::KorriTimer;

/// User hook invoked by the alert monitor with the raised alerts and whether
/// any of them is an error condition.
pub type AlertCallback = fn(Alerts, bool);

/// Receive never waits by default: the base library polls.
pub const DEFAULT_RX_WAIT: Timeout = Timeout::Immediate;

//==================================================================================CONFIG
/// Adapter-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterConfig {
    /// Driver configuration used at install time.
    pub twai: TwaiConfig,
    /// How long `receive_frame` waits for a frame.
    pub rx_wait: Timeout,
    /// Log a line per frame sent or received.
    pub trace_frames: bool,
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self {
            twai: TwaiConfig::new(),
            rx_wait: DEFAULT_RX_WAIT,
            trace_frames: false,
        }
    }

    #[must_use]
    pub fn pins(mut self, tx_pin: u8, rx_pin: u8) -> Self {
        self.twai = self.twai.pins(tx_pin, rx_pin);
        self
    }

    /// Transmit and receive queue depths (clamped to 1..=50).
    #[must_use]
    pub fn queue_len(mut self, tx: u32, rx: u32) -> Self {
        self.twai = self.twai.tx_queue_len(tx).rx_queue_len(rx);
        self
    }

    #[must_use]
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.twai = self.twai.timing(timing);
        self
    }

    #[must_use]
    pub fn twai(mut self, twai: TwaiConfig) -> Self {
        self.twai = twai;
        self
    }

    #[must_use]
    pub fn rx_wait(mut self, rx_wait: Timeout) -> Self {
        self.rx_wait = rx_wait;
        self
    }

    #[must_use]
    pub fn trace_frames(mut self, enabled: bool) -> Self {
        self.trace_frames = enabled;
        self
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================RESOURCES
/// State shared between an adapter and its background tasks.
pub struct TwaiResources {
    /// Released once the driver is installed and started.
    pub(crate) start_gate: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) monitor_stop: Signal<CriticalSectionRawMutex, ()>,
    alert_callback: Mutex<CriticalSectionRawMutex, Cell<Option<AlertCallback>>>,
    #[cfg(feature = "statistics")]
    statistics: BusStatistics,
    #[cfg(feature = "statistics")]
    statistics_stop: Signal<CriticalSectionRawMutex, ()>,
}

impl TwaiResources {
    pub const fn new() -> Self {
        Self {
            start_gate: Signal::new(),
            monitor_stop: Signal::new(),
            alert_callback: Mutex::new(Cell::new(None)),
            #[cfg(feature = "statistics")]
            statistics: BusStatistics::new(),
            #[cfg(feature = "statistics")]
            statistics_stop: Signal::new(),
        }
    }

    pub fn alert_callback(&self) -> Option<AlertCallback> {
        self.alert_callback.lock(Cell::get)
    }

    fn set_alert_callback(&self, callback: Option<AlertCallback>) {
        self.alert_callback.lock(|slot| slot.set(callback));
    }

    #[cfg(feature = "statistics")]
    pub fn statistics(&self) -> &BusStatistics {
        &self.statistics
    }

    /// Clear stale stop requests and release the alert monitor.
    fn arm(&self) {
        self.monitor_stop.reset();
        #[cfg(feature = "statistics")]
        self.statistics_stop.reset();
        self.start_gate.signal(());
    }

    /// Ask every background task to return.
    fn disarm(&self) {
        self.start_gate.reset();
        self.monitor_stop.signal(());
        #[cfg(feature = "statistics")]
        self.statistics_stop.signal(());
    }
}

impl Default for TwaiResources {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================ADAPTER
/// CAN adapter bound to one TWAI driver.
pub struct TwaiAdapter<'d, D: TwaiDriver> {
    driver: &'d D,
    resources: &'d TwaiResources,
    registry: &'d PeripheralRegistry,
    config: AdapterConfig,
    token: Option<PeripheralToken<'d>>,
}

impl<'d, D: TwaiDriver> TwaiAdapter<'d, D> {
    /// Adapter competing for the process-wide [`TWAI_REGISTRY`].
    pub fn new(driver: &'d D, resources: &'d TwaiResources, config: AdapterConfig) -> Self {
        Self::with_registry(driver, resources, &TWAI_REGISTRY, config)
    }

    /// Adapter competing for a caller-provided registry.
    pub fn with_registry(
        driver: &'d D,
        resources: &'d TwaiResources,
        registry: &'d PeripheralRegistry,
        config: AdapterConfig,
    ) -> Self {
        Self {
            driver,
            resources,
            registry,
            config,
            token: None,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.token.is_some()
    }

    /// Claim the controller, install and start the driver.
    ///
    /// Calling it again on an open adapter is a no-op. On failure the claim is
    /// released so a later attempt (from this or another adapter) can succeed.
    pub fn try_open(&mut self) -> Result<(), AdapterError> {
        if self.is_open() {
            return Ok(());
        }
        let registry = self.registry;
        let token = registry.try_claim().ok_or(AdapterError::PeripheralInUse)?;

        self.install()?;
        if let Err(err) = self.driver.start() {
            if let Err(cleanup) = self.driver.uninstall() {
                warn!("uninstall after failed start also failed: {:?}", cleanup);
            }
            return Err(AdapterError::Start(err));
        }

        self.resources.arm();
        self.token = Some(token);
        info!(
            "TWAI driver started on tx pin {} / rx pin {}",
            self.config.twai.tx_pin, self.config.twai.rx_pin
        );
        Ok(())
    }

    /// Queue an extended frame.
    ///
    /// With `wait_sent` the call blocks until the driver has queue space,
    /// otherwise it fails straight away on a full queue. A driver found stopped
    /// or bus-off is restarted or sent into recovery and the frame is dropped.
    pub fn try_send_frame(
        &mut self,
        id: u32,
        data: &[u8],
        wait_sent: bool,
    ) -> Result<(), AdapterError> {
        if !self.is_open() {
            return Err(AdapterError::NotOpen);
        }
        let status = self.driver.status().map_err(AdapterError::Transmit)?;
        if status.state != DriverState::Running {
            self.revive(status.state);
            return Err(AdapterError::NotRunning {
                state: status.state,
            });
        }

        let frame = TwaiFrame::new_extended(id, data);
        if frame.dlc_non_compliant() {
            warn!("payload of {} bytes truncated to 8", data.len());
        }
        let timeout = if wait_sent {
            Timeout::Forever
        } else {
            Timeout::Immediate
        };

        match self.driver.transmit(&frame, timeout) {
            Ok(()) => {
                self.trace_frame("tx", &frame);
                #[cfg(feature = "statistics")]
                self.resources.statistics.record_tx(frame.len());
                Ok(())
            }
            Err(DriverError::InvalidState) => {
                if let Ok(status) = self.driver.status() {
                    self.revive(status.state);
                }
                Err(AdapterError::Transmit(DriverError::InvalidState))
            }
            Err(err) => Err(AdapterError::Transmit(err)),
        }
    }

    /// Take the next extended frame from the receive queue.
    ///
    /// Waits according to [`AdapterConfig::rx_wait`]. Standard frames are
    /// consumed and reported as [`AdapterError::StandardFrame`].
    pub fn try_receive_frame(&mut self) -> Result<CanFrame, AdapterError> {
        if !self.is_open() {
            return Err(AdapterError::NotOpen);
        }
        let frame = self
            .driver
            .receive(self.config.rx_wait)
            .map_err(|err| match err {
                DriverError::Timeout => AdapterError::NoFrame,
                err => AdapterError::Receive(err),
            })?;
        let can_frame = CanFrame::from_twai(&frame).ok_or(AdapterError::StandardFrame)?;
        self.trace_frame("rx", &frame);
        #[cfg(feature = "statistics")]
        self.resources.statistics.record_rx(frame.len());
        Ok(can_frame)
    }

    /// Stop and uninstall the driver, stop background tasks, release the claim.
    ///
    /// The driver cannot be uninstalled while a bus-off recovery is running. In
    /// that case the adapter stays open, keeps its claim and reports
    /// [`AdapterError::Uninstall`]; close again once the recovery has completed.
    pub fn try_close(&mut self) -> Result<(), AdapterError> {
        if !self.is_open() {
            return Ok(());
        }
        if let Err(err) = self.driver.stop() {
            debug!("driver stop on close: {:?}", err);
        }
        self.driver.uninstall().map_err(AdapterError::Uninstall)?;
        self.resources.disarm();
        self.token = None;
        info!("TWAI driver uninstalled");
        Ok(())
    }

    /// [`try_close`](Self::try_close), logging a refused uninstall.
    pub fn close(&mut self) {
        if let Err(err) = self.try_close() {
            warn!("TWAI adapter left open: {:?}", err);
        }
    }

    /// Driver status snapshot.
    pub fn status(&self) -> Result<StatusInfo, AdapterError> {
        if !self.is_open() {
            return Err(AdapterError::NotOpen);
        }
        self.driver.status().map_err(AdapterError::Receive)
    }

    /// Install or clear the alert callback. Takes effect on the next alert.
    pub fn set_alerts_callback(&self, callback: Option<AlertCallback>) {
        self.resources.set_alert_callback(callback);
    }

    pub fn set_frame_trace(&mut self, enabled: bool) {
        self.config.trace_frames = enabled;
    }

    /// Routing fields of a 29-bit identifier.
    pub fn extract_routing_fields(id: u32) -> RoutingFields {
        extract_routing_fields(id)
    }

    /// Alert task bound to this adapter's driver and resources.
    pub fn alert_monitor(&self) -> AlertMonitor<'d, D> {
        AlertMonitor::new(self.driver, self.resources)
    }

    #[cfg(feature = "statistics")]
    /// Statistics task bound to this adapter's counters.
    pub fn statistics_runner<T: KorriTimer>(&self, timer: T) -> StatisticsRunner<'d, T> {
        let resources = self.resources;
        StatisticsRunner::new(&resources.statistics, &resources.statistics_stop, timer)
    }

    #[cfg(feature = "statistics")]
    /// Smoothed throughput of the last seconds.
    pub fn statistics(&self) -> ThroughputRates {
        self.resources.statistics.rates()
    }

    /// Install the driver. A driver still installed here was left behind by an
    /// adapter dropped during bus recovery; since the claim is ours it is
    /// uninstalled and installed again.
    fn install(&self) -> Result<(), AdapterError> {
        match self.driver.install(&self.config.twai) {
            Err(DriverError::InvalidState) => {
                warn!("TWAI driver left installed, reinstalling");
                if let Err(err) = self.driver.stop() {
                    debug!("driver stop before reinstall: {:?}", err);
                }
                self.driver.uninstall().map_err(AdapterError::Install)?;
                self.driver
                    .install(&self.config.twai)
                    .map_err(AdapterError::Install)
            }
            result => result.map_err(AdapterError::Install),
        }
    }

    fn revive(&self, state: DriverState) {
        match state {
            DriverState::Stopped => match self.driver.start() {
                Ok(()) => info!("TWAI driver was stopped, restarted"),
                Err(err) => warn!("failed to restart TWAI driver: {:?}", err),
            },
            DriverState::BusOff => match self.driver.initiate_recovery() {
                Ok(()) => info!("TWAI driver was bus-off, recovery initiated"),
                Err(err) => warn!("failed to initiate bus recovery: {:?}", err),
            },
            DriverState::Recovering | DriverState::Running => {}
        }
    }

    fn trace_frame(&self, direction: &'static str, frame: &TwaiFrame) {
        if !self.config.trace_frames {
            return;
        }
        let fields = extract_routing_fields(frame.identifier());
        info!(
            "{} prio={} pgn={} src={} dst={} len={}",
            direction,
            fields.priority,
            fields.pgn,
            fields.source,
            fields.destination,
            frame.len()
        );
    }
}

impl<D: TwaiDriver> Drop for TwaiAdapter<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.try_close() {
            // The claim goes with the adapter; the next `open` uninstalls the
            // leftover driver once its recovery is over.
            self.resources.disarm();
            error!("TWAI adapter dropped with the driver installed: {:?}", err);
        }
    }
}

//==================================================================================FRAME_TRANSPORT
impl<D: TwaiDriver> FrameTransport for TwaiAdapter<'_, D> {
    fn open(&mut self) -> bool {
        match self.try_open() {
            Ok(()) => true,
            Err(AdapterError::PeripheralInUse) => {
                warn!("TWAI controller already owned by another adapter");
                false
            }
            Err(err) => {
                error!("failed to open TWAI adapter: {:?}", err);
                false
            }
        }
    }

    fn send_frame(&mut self, id: u32, data: &[u8], wait_sent: bool) -> bool {
        match self.try_send_frame(id, data, wait_sent) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to queue frame {:#x} for transmission: {:?}", id, err);
                false
            }
        }
    }

    fn receive_frame(&mut self) -> Option<CanFrame> {
        match self.try_receive_frame() {
            Ok(frame) => Some(frame),
            Err(AdapterError::NoFrame) => None,
            Err(AdapterError::StandardFrame) => {
                trace!("standard frame discarded");
                None
            }
            Err(err) => {
                error!("failed to receive frame: {:?}", err);
                None
            }
        }
    }
}
