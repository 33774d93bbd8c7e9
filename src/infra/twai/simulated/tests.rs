//! Unit tests for the simulated peripheral state machine.
use super::*;

fn running_driver() -> SimulatedTwai {
    let driver = SimulatedTwai::new();
    driver.install(&TwaiConfig::new()).expect("install");
    driver.start().expect("start");
    driver
}

#[test]
/// Install leaves the controller stopped; start moves it to running.
fn test_install_then_start() {
    let driver = SimulatedTwai::new();
    driver.install(&TwaiConfig::new()).unwrap();
    assert_eq!(driver.state(), DriverState::Stopped);
    assert_eq!(driver.enabled_alerts(), Alerts::ALERTS_TO_WATCH);
    driver.start().unwrap();
    assert_eq!(driver.status().unwrap().state, DriverState::Running);
    assert_eq!(driver.install(&TwaiConfig::new()), Err(DriverError::InvalidState));
}

#[test]
/// Transmit is refused unless the controller runs, and bounded by the queue depth.
fn test_transmit_bounds() {
    let driver = SimulatedTwai::new();
    driver.install(&TwaiConfig::new().tx_queue_len(2)).unwrap();
    let frame = TwaiFrame::new_extended(0x18FEDF00, &[1, 2, 3]);
    assert_eq!(
        driver.transmit(&frame, Timeout::Immediate),
        Err(DriverError::InvalidState)
    );

    driver.start().unwrap();
    driver.transmit(&frame, Timeout::Immediate).unwrap();
    driver.transmit(&frame, Timeout::Forever).unwrap();
    assert_eq!(
        driver.transmit(&frame, Timeout::Immediate),
        Err(DriverError::Timeout)
    );
    assert_eq!(driver.status().unwrap().msgs_to_tx, 2);

    assert_eq!(driver.take_transmitted(), Some(frame));
    assert_eq!(driver.pending_transmit(), 1);
}

#[test]
/// Listen-only controllers cannot transmit.
fn test_listen_only_rejects_transmit() {
    let driver = SimulatedTwai::new();
    driver
        .install(&TwaiConfig::new().mode(Mode::ListenOnly))
        .unwrap();
    driver.start().unwrap();
    let frame = TwaiFrame::new_extended(0x100, &[]);
    assert_eq!(
        driver.transmit(&frame, Timeout::Immediate),
        Err(DriverError::NotSupported)
    );
}

#[test]
/// Injected frames come back out of `receive`; an empty queue times out.
fn test_receive_queue() {
    let driver = running_driver();
    assert_eq!(driver.receive(Timeout::Immediate), Err(DriverError::Timeout));

    let frame = TwaiFrame::new_extended(0x0DF01023, &[0xAA; 8]);
    assert!(driver.inject(frame));
    assert_eq!(driver.receive(Timeout::Immediate), Ok(frame));
}

#[test]
/// A full receive queue drops the frame and counts it as missed.
fn test_receive_overflow_counts_missed() {
    let driver = SimulatedTwai::new();
    driver.install(&TwaiConfig::new().rx_queue_len(1)).unwrap();
    driver.start().unwrap();
    let frame = TwaiFrame::new_extended(0x1, &[1]);
    assert!(driver.inject(frame));
    assert!(!driver.inject(frame));
    assert_eq!(driver.status().unwrap().rx_missed_count, 1);
}

#[test]
/// Bus-off → recovery → stopped, then start resumes traffic.
fn test_bus_off_recovery_cycle() {
    let driver = running_driver();
    assert!(!driver.complete_recovery());

    driver.force_bus_off();
    assert_eq!(driver.state(), DriverState::BusOff);
    assert_eq!(driver.start(), Err(DriverError::InvalidState));

    driver.initiate_recovery().unwrap();
    assert_eq!(driver.state(), DriverState::Recovering);
    assert_eq!(driver.uninstall(), Err(DriverError::InvalidState));

    assert!(driver.complete_recovery());
    assert_eq!(driver.state(), DriverState::Stopped);
    driver.start().unwrap();
    assert_eq!(driver.recovery_count(), 1);
    assert_eq!(driver.start_count(), 2);
}

#[test]
/// Reconfiguring alerts returns and clears what was pending.
fn test_reconfigure_alerts_clears_pending() {
    let driver = running_driver();
    driver.raise_alerts(Alerts::ERR_PASS | Alerts::BUS_RECOVERED);
    let previous = driver.reconfigure_alerts(Alerts::BUS_RECOVERED).unwrap();
    // BUS_RECOVERED was not on the watch-list when raised.
    assert_eq!(previous, Alerts::ERR_PASS);
    assert_eq!(driver.enabled_alerts(), Alerts::BUS_RECOVERED);
}

#[test]
/// Install failures can be scripted once.
fn test_scripted_install_failure() {
    let driver = SimulatedTwai::new();
    driver.fail_next_install(DriverError::NoMem);
    assert_eq!(driver.install(&TwaiConfig::new()), Err(DriverError::NoMem));
    assert!(!driver.is_installed());
    driver.install(&TwaiConfig::new()).unwrap();
    assert_eq!(driver.install_count(), 1);
}

#[test]
/// A scripted transmit failure moves the controller and fires once.
fn test_scripted_transmit_failure() {
    let driver = running_driver();
    let frame = TwaiFrame::new_extended(0x18FEDF00, &[1]);
    driver.fail_next_transmit(DriverError::InvalidState, DriverState::BusOff);
    assert_eq!(
        driver.transmit(&frame, Timeout::Immediate),
        Err(DriverError::InvalidState)
    );
    assert_eq!(driver.state(), DriverState::BusOff);
    assert_eq!(driver.pending_transmit(), 0);

    driver.initiate_recovery().unwrap();
    assert_eq!(driver.initiate_recovery(), Err(DriverError::InvalidState));
    assert_eq!(driver.rejected_recovery_count(), 1);
    assert!(driver.complete_recovery());
    driver.start().unwrap();
    driver.transmit(&frame, Timeout::Immediate).unwrap();
}

#[tokio::test]
/// `read_alerts` returns only watched alerts and clears them.
async fn test_read_alerts_returns_watched_only() {
    let driver = running_driver();
    driver.raise_alerts(Alerts::BUS_ERROR | Alerts::ABOVE_ERR_WARN);
    let alerts = driver.read_alerts().await.unwrap();
    assert_eq!(alerts, Alerts::ABOVE_ERR_WARN);
}

#[tokio::test]
/// Uninstalling wakes a pending alert reader with an error.
async fn test_read_alerts_after_uninstall() {
    let driver = running_driver();
    driver.stop().unwrap();
    driver.uninstall().unwrap();
    assert_eq!(driver.read_alerts().await, Err(DriverError::InvalidState));
}
