//! Alert monitor: waits for controller alerts, forwards them to the user
//! callback and drives the bus-off recovery cycle.
//!
//! ```text
//! BUS_OFF        -> watch BUS_RECOVERED only, initiate recovery
//! BUS_RECOVERED  -> restart the driver, watch the full alert set again
//! ```
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::adapter::TwaiResources;
use crate::error::DriverError;
use crate::infra::twai::{Alerts, DriverState, TwaiDriver};

/// Long-running alert task. Build it with
/// [`TwaiAdapter::alert_monitor`](crate::adapter::TwaiAdapter::alert_monitor)
/// and spawn `run()` on the executor.
pub struct AlertMonitor<'d, D: TwaiDriver> {
    driver: &'d D,
    resources: &'d TwaiResources,
}

impl<'d, D: TwaiDriver> AlertMonitor<'d, D> {
    pub(crate) fn new(driver: &'d D, resources: &'d TwaiResources) -> Self {
        Self { driver, resources }
    }

    /// Wait for the adapter to open, then handle alerts until it closes.
    pub async fn run(&mut self) {
        let opened = {
            let gate = self.resources.start_gate.wait();
            let stop = self.resources.monitor_stop.wait();
            pin_mut!(gate);
            pin_mut!(stop);
            matches!(select(gate, stop).await, Either::Left(_))
        };
        if !opened {
            debug!("alert monitor stopped before the driver started");
            return;
        }
        info!("alert monitor running");

        loop {
            let outcome = {
                let alerts = self.driver.read_alerts();
                let stop = self.resources.monitor_stop.wait();
                pin_mut!(alerts);
                pin_mut!(stop);
                match select(alerts, stop).await {
                    Either::Left((result, _)) => Some(result),
                    Either::Right(_) => None,
                }
            };

            match outcome {
                None => {
                    debug!("alert monitor stopped");
                    return;
                }
                Some(Ok(alerts)) => self.handle_alerts(alerts),
                Some(Err(DriverError::InvalidState)) => {
                    warn!("driver no longer installed, alert monitor exiting");
                    return;
                }
                Some(Err(err)) => warn!("reading TWAI alerts failed: {:?}", err),
            }
        }
    }

    fn handle_alerts(&self, alerts: Alerts) {
        if let Some(callback) = self.resources.alert_callback() {
            callback(alerts, alerts.is_error());
        }

        if alerts.contains(Alerts::ABOVE_ERR_WARN) {
            error!("one of the error counters exceeded the error warning limit");
        }
        if alerts.contains(Alerts::ERR_PASS) {
            error!("TWAI controller has become error passive");
        }
        if alerts.contains(Alerts::RX_FIFO_OVERRUN) {
            error!("RX FIFO overrun, frames were lost");
        }
        if alerts.contains(Alerts::BUS_OFF) {
            error!("bus-off condition occurred, initiating recovery");
            if let Err(err) = self.driver.reconfigure_alerts(Alerts::BUS_RECOVERED) {
                error!("failed to watch for bus recovery: {:?}", err);
            }
            match self.driver.status() {
                // A send may already have started it.
                Ok(status) if status.state == DriverState::Recovering => {
                    debug!("bus recovery already in progress");
                }
                _ => {
                    if let Err(err) = self.driver.initiate_recovery() {
                        error!("failed to initiate bus recovery: {:?}", err);
                    }
                }
            }
        }
        if alerts.contains(Alerts::BUS_RECOVERED) {
            info!("bus recovered, restarting driver");
            match self.driver.start() {
                Ok(()) => info!("TWAI driver restarted"),
                Err(err) => error!("failed to restart TWAI driver: {:?}", err),
            }
            if let Err(err) = self.driver.reconfigure_alerts(Alerts::ALERTS_TO_WATCH) {
                error!("failed to restore the alert watch list: {:?}", err);
            }
        }
    }
}
