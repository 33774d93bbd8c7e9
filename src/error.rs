//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (peripheral driver, adapter
//! lifecycle, transport bridging).
use crate::infra::twai::DriverState;
use thiserror_no_std::Error;

//==================================================================================DRIVER_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures reported by the TWAI peripheral driver.
pub enum DriverError {
    /// The operation did not complete before its timeout elapsed
    /// (empty receive queue, full transmit queue, no alert pending).
    #[error("Timed out")]
    Timeout,
    /// The driver is not installed, or not in the state the call requires.
    #[error("Driver in invalid state")]
    InvalidState,
    /// An argument was rejected by the driver.
    #[error("Invalid argument")]
    InvalidArg,
    /// Not enough memory to install the driver.
    #[error("Out of memory")]
    NoMem,
    /// Operation unavailable in the configured mode (e.g. transmit in listen-only).
    #[error("Not supported in the current mode")]
    NotSupported,
    /// Transmit queue disabled and another frame is currently on the wire.
    #[error("Transmission unavailable")]
    Fail,
    /// Any other vendor error code.
    #[error("Driver error code {0}")]
    Other(i32),
}

//==================================================================================ADAPTER_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised by [`TwaiAdapter`](crate::adapter::TwaiAdapter) operations.
///
/// Callers going through the boolean `FrameTransport` contract never see these;
/// they are logged and folded into `false`/`None`.
pub enum AdapterError {
    /// Another adapter instance already owns the peripheral.
    #[error("CAN peripheral already in use")]
    PeripheralInUse,
    /// Send/receive attempted before a successful `open`.
    #[error("Adapter is not open")]
    NotOpen,
    /// Driver installation failed during `open`.
    #[error("Driver install failed: {0}")]
    Install(DriverError),
    /// Driver start failed during `open`.
    #[error("Driver start failed: {0}")]
    Start(DriverError),
    /// The driver refused to uninstall (bus recovery still in progress); the
    /// adapter keeps its claim on the controller.
    #[error("Driver uninstall failed: {0}")]
    Uninstall(DriverError),
    /// The driver is not running (stopped, bus-off or recovering).
    #[error("Driver is not running: {state:?}")]
    NotRunning { state: DriverState },
    /// The frame could not be queued for transmission.
    #[error("Transmit failed: {0}")]
    Transmit(DriverError),
    /// Receive queue access failed for a reason other than a timeout.
    #[error("Receive failed: {0}")]
    Receive(DriverError),
    /// No frame arrived within the configured wait.
    #[error("No frame available")]
    NoFrame,
    /// A standard (11-bit) frame was received and discarded.
    #[error("Standard frame discarded")]
    StandardFrame,
}

//==================================================================================POLLING_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors produced by [`PollingCanBus`](crate::protocol::transport::polling::PollingCanBus).
pub enum PollingError {
    /// The wrapped transport refused the frame.
    #[error("Transport rejected the frame")]
    SendRejected,
    /// The wrapped transport could not be opened.
    #[error("Transport could not be opened")]
    OpenFailed,
}
