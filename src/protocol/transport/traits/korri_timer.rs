//! Asynchronous delay abstraction. Drives the statistics decay period and the
//! receive polling of [`PollingCanBus`](crate::protocol::transport::polling::PollingCanBus)
//! without tying the crate to a particular time driver.

/// Timer trait abstraction; firmware implements it on top of its executor
/// (`embassy_time::Timer::after`, `tokio::time::sleep`, ...).
pub trait KorriTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a;
}
