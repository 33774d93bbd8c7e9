//! Exclusive ownership of the CAN controller.
//!
//! The ESP32 exposes a single TWAI controller and its driver is a global
//! resource. Instead of a bare global flag, owners hold a [`PeripheralToken`]
//! obtained from a [`PeripheralRegistry`]; dropping the token hands the
//! controller back.
use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

/// Registry guarding the board's TWAI controller.
pub static TWAI_REGISTRY: PeripheralRegistry = PeripheralRegistry::new();

//==================================================================================REGISTRY
/// Single-owner claim over one peripheral.
pub struct PeripheralRegistry {
    in_use: Mutex<CriticalSectionRawMutex, Cell<bool>>,
}

impl PeripheralRegistry {
    pub const fn new() -> Self {
        Self {
            in_use: Mutex::new(Cell::new(false)),
        }
    }

    /// Claim the peripheral. Returns `None` while another token is alive.
    pub fn try_claim(&self) -> Option<PeripheralToken<'_>> {
        let claimed = self.in_use.lock(|in_use| {
            if in_use.get() {
                false
            } else {
                in_use.set(true);
                true
            }
        });
        claimed.then_some(PeripheralToken { registry: self })
    }

    /// Whether a token is currently alive.
    pub fn is_claimed(&self) -> bool {
        self.in_use.lock(|in_use| in_use.get())
    }

    fn release(&self) {
        self.in_use.lock(|in_use| in_use.set(false));
    }
}

impl Default for PeripheralRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================TOKEN
/// Proof of ownership; releases the claim on drop.
#[must_use = "dropping the token releases the peripheral immediately"]
pub struct PeripheralToken<'r> {
    registry: &'r PeripheralRegistry,
}

impl core::fmt::Debug for PeripheralToken<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PeripheralToken")
    }
}

impl Drop for PeripheralToken<'_> {
    fn drop(&mut self) {
        self.registry.release();
    }
}
