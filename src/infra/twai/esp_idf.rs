//! [`TwaiDriver`] backed by the ESP-IDF `twai_*` C API.
//!
//! The TWAI driver inside ESP-IDF is a singleton, so `EspIdfTwai` carries no
//! state; ownership of the controller is tracked by
//! [`TWAI_REGISTRY`](crate::infra::registry::TWAI_REGISTRY).
//!
//! `read_alerts` polls `twai_read_alerts` with a short timeout and yields
//! between polls. Run the alert monitor on its own thread (e.g. with
//! `esp_idf_hal::task::block_on` inside a `std::thread` created with
//! [`ALERT_TASK_STACK_SIZE`] / [`ALERT_TASK_PRIORITY`]) so the blocking part of
//! each poll never stalls frame traffic.
use core::future::poll_fn;
use core::task::Poll;

use esp_idf_sys as sys;

use super::{
    Alerts, DriverState, IntrFlags, Mode, StatusInfo, Timeout, TwaiConfig, TwaiDriver, TwaiFrame,
};
use crate::error::DriverError;
use crate::protocol::transport::MAX_CAN_DATA_LEN;

/// FreeRTOS priority recommended for the alert monitor thread.
pub const ALERT_TASK_PRIORITY: u8 = 10;
/// Stack size recommended for the alert monitor thread.
pub const ALERT_TASK_STACK_SIZE: usize = 2048;
/// Ticks spent blocked in `twai_read_alerts` per poll.
const ALERT_POLL_TICKS: sys::TickType_t = 10;

/// Zero-sized handle on the ESP-IDF TWAI driver.
#[derive(Debug, Default)]
pub struct EspIdfTwai {
    _private: (),
}

impl EspIdfTwai {
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

//==================================================================================CONVERSIONS
fn check(code: sys::esp_err_t) -> Result<(), DriverError> {
    let code = code as i32;
    if code == sys::ESP_OK as i32 {
        Ok(())
    } else if code == sys::ESP_ERR_TIMEOUT as i32 {
        Err(DriverError::Timeout)
    } else if code == sys::ESP_ERR_INVALID_STATE as i32 {
        Err(DriverError::InvalidState)
    } else if code == sys::ESP_ERR_INVALID_ARG as i32 {
        Err(DriverError::InvalidArg)
    } else if code == sys::ESP_ERR_NO_MEM as i32 {
        Err(DriverError::NoMem)
    } else if code == sys::ESP_ERR_NOT_SUPPORTED as i32 {
        Err(DriverError::NotSupported)
    } else if code == sys::ESP_FAIL as i32 {
        Err(DriverError::Fail)
    } else {
        Err(DriverError::Other(code))
    }
}

fn to_ticks(timeout: Timeout) -> sys::TickType_t {
    timeout.ticks(sys::configTICK_RATE_HZ, sys::TickType_t::MAX as u64) as sys::TickType_t
}

fn native_mode(mode: Mode) -> sys::twai_mode_t {
    match mode {
        Mode::Normal => sys::twai_mode_t_TWAI_MODE_NORMAL,
        Mode::NoAck => sys::twai_mode_t_TWAI_MODE_NO_ACK,
        Mode::ListenOnly => sys::twai_mode_t_TWAI_MODE_LISTEN_ONLY,
    }
}

fn native_intr_flags(flags: IntrFlags) -> i32 {
    let level = match flags.level {
        1 => sys::ESP_INTR_FLAG_LEVEL1,
        2 => sys::ESP_INTR_FLAG_LEVEL2,
        _ => sys::ESP_INTR_FLAG_LEVEL3,
    };
    let iram = if flags.iram { sys::ESP_INTR_FLAG_IRAM } else { 0 };
    (level | iram) as i32
}

fn native_state(state: sys::twai_state_t) -> DriverState {
    #[allow(non_upper_case_globals)]
    match state {
        sys::twai_state_t_TWAI_STATE_RUNNING => DriverState::Running,
        sys::twai_state_t_TWAI_STATE_BUS_OFF => DriverState::BusOff,
        sys::twai_state_t_TWAI_STATE_RECOVERING => DriverState::Recovering,
        _ => DriverState::Stopped,
    }
}

async fn yield_now() {
    let mut yielded = false;
    poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

//==================================================================================DRIVER_IMPL
impl TwaiDriver for EspIdfTwai {
    #[allow(clippy::needless_update)]
    fn install(&self, config: &TwaiConfig) -> Result<(), DriverError> {
        let general_config = sys::twai_general_config_t {
            mode: native_mode(config.mode),
            tx_io: config.tx_pin as _,
            rx_io: config.rx_pin as _,
            clkout_io: -1,
            bus_off_io: -1,
            tx_queue_len: config.tx_queue_len,
            rx_queue_len: config.rx_queue_len,
            alerts_enabled: config.alerts.bits(),
            clkout_divider: 0,
            intr_flags: native_intr_flags(config.intr_flags) as _,
            ..Default::default()
        };
        let timing_config = sys::twai_timing_config_t {
            brp: config.timing.brp,
            tseg_1: config.timing.tseg_1,
            tseg_2: config.timing.tseg_2,
            sjw: config.timing.sjw,
            triple_sampling: config.timing.triple_sampling,
            ..Default::default()
        };
        let filter_config = sys::twai_filter_config_t {
            acceptance_code: config.filter.acceptance_code,
            acceptance_mask: config.filter.acceptance_mask,
            single_filter: config.filter.single_filter,
        };

        check(unsafe {
            sys::twai_driver_install(&general_config, &timing_config, &filter_config)
        })
    }

    fn uninstall(&self) -> Result<(), DriverError> {
        check(unsafe { sys::twai_driver_uninstall() })
    }

    fn start(&self) -> Result<(), DriverError> {
        check(unsafe { sys::twai_start() })
    }

    fn stop(&self) -> Result<(), DriverError> {
        check(unsafe { sys::twai_stop() })
    }

    fn transmit(&self, frame: &TwaiFrame, timeout: Timeout) -> Result<(), DriverError> {
        let mut message = sys::twai_message_t::default();
        // SAFETY: plain bitfield setters on a zero-initialised union.
        unsafe {
            let flags = &mut message.__bindgen_anon_1.__bindgen_anon_1;
            flags.set_extd(frame.is_extended() as u32);
            flags.set_dlc_non_comp(frame.dlc_non_compliant() as u32);
        }
        message.identifier = frame.identifier();
        message.data_length_code = frame.len() as u8;
        message.data = *frame.raw_data();

        check(unsafe { sys::twai_transmit(&message, to_ticks(timeout)) })
    }

    fn receive(&self, timeout: Timeout) -> Result<TwaiFrame, DriverError> {
        let mut message = sys::twai_message_t::default();
        check(unsafe { sys::twai_receive(&mut message, to_ticks(timeout)) })?;

        // SAFETY: the driver filled the union through the bitfield view.
        let extended = unsafe { message.__bindgen_anon_1.__bindgen_anon_1.extd() } != 0;
        let len = (message.data_length_code as usize).min(MAX_CAN_DATA_LEN);
        let payload = &message.data[..len];

        if extended {
            Ok(TwaiFrame::new_extended(message.identifier, payload))
        } else {
            TwaiFrame::new_standard(message.identifier as u16, payload).ok_or(DriverError::InvalidArg)
        }
    }

    fn status(&self) -> Result<StatusInfo, DriverError> {
        let mut info = sys::twai_status_info_t::default();
        check(unsafe { sys::twai_get_status_info(&mut info) })?;

        let mut status = StatusInfo::new(native_state(info.state));
        status.msgs_to_tx = info.msgs_to_tx;
        status.msgs_to_rx = info.msgs_to_rx;
        status.tx_error_counter = info.tx_error_counter;
        status.rx_error_counter = info.rx_error_counter;
        status.tx_failed_count = info.tx_failed_count;
        status.rx_missed_count = info.rx_missed_count;
        status.rx_overrun_count = info.rx_overrun_count;
        status.arb_lost_count = info.arb_lost_count;
        status.bus_error_count = info.bus_error_count;
        Ok(status)
    }

    fn reconfigure_alerts(&self, alerts: Alerts) -> Result<Alerts, DriverError> {
        let mut previous = 0u32;
        check(unsafe { sys::twai_reconfigure_alerts(alerts.bits(), &mut previous) })?;
        Ok(Alerts::from_bits(previous))
    }

    fn initiate_recovery(&self) -> Result<(), DriverError> {
        check(unsafe { sys::twai_initiate_recovery() })
    }

    async fn read_alerts(&self) -> Result<Alerts, DriverError> {
        loop {
            let mut raw = 0u32;
            match check(unsafe { sys::twai_read_alerts(&mut raw, ALERT_POLL_TICKS) }) {
                Ok(()) => return Ok(Alerts::from_bits(raw)),
                Err(DriverError::Timeout) => yield_now().await,
                Err(error) => return Err(error),
            }
        }
    }
}
