//! TWAI alert bitmask.
//!
//! Bit values match the ESP-IDF `TWAI_ALERT_*` constants so a mask read from the
//! peripheral can be wrapped without translation.

/// Set of TWAI alert flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alerts(u32);

impl Alerts {
    /// No more messages queued for transmission.
    pub const TX_IDLE: Self = Self(0x0000_0001);
    /// The previous transmission was successful.
    pub const TX_SUCCESS: Self = Self(0x0000_0002);
    /// A frame has been received and added to the RX queue.
    pub const RX_DATA: Self = Self(0x0000_0004);
    /// Both error counters dropped below the error warning limit.
    pub const BELOW_ERR_WARN: Self = Self(0x0000_0008);
    /// The controller became error active.
    pub const ERR_ACTIVE: Self = Self(0x0000_0010);
    /// The controller is undergoing bus recovery.
    pub const RECOVERY_IN_PROGRESS: Self = Self(0x0000_0020);
    /// The controller completed bus recovery.
    pub const BUS_RECOVERED: Self = Self(0x0000_0040);
    /// The previous transmission lost arbitration.
    pub const ARB_LOST: Self = Self(0x0000_0080);
    /// One of the error counters exceeded the error warning limit.
    pub const ABOVE_ERR_WARN: Self = Self(0x0000_0100);
    /// A bit, stuff, CRC, form or ACK error occurred on the bus.
    pub const BUS_ERROR: Self = Self(0x0000_0200);
    /// The previous (single shot) transmission failed.
    pub const TX_FAILED: Self = Self(0x0000_0400);
    /// The RX queue is full, a frame was lost.
    pub const RX_QUEUE_FULL: Self = Self(0x0000_0800);
    /// The controller became error passive.
    pub const ERR_PASS: Self = Self(0x0000_1000);
    /// Bus-off: the controller can no longer influence the bus.
    pub const BUS_OFF: Self = Self(0x0000_2000);
    /// An RX FIFO overrun occurred.
    pub const RX_FIFO_OVERRUN: Self = Self(0x0000_4000);
    /// A transmission was cancelled and retried (errata workaround).
    pub const TX_RETRIED: Self = Self(0x0000_8000);
    /// The controller was reset.
    pub const PERIPH_RESET: Self = Self(0x0001_0000);
    /// Every alert.
    pub const ALL: Self = Self(0x0001_FFFF);
    /// Empty set.
    pub const NONE: Self = Self(0);

    /// Bus-health conditions reported to the callback as errors.
    pub const ERROR_ALERTS: Self = Self(
        Self::ABOVE_ERR_WARN.0 | Self::ERR_PASS.0 | Self::BUS_OFF.0 | Self::RX_FIFO_OVERRUN.0,
    );
    /// Traffic events.
    pub const DATA_EVENTS: Self = Self(Self::TX_IDLE.0 | Self::TX_SUCCESS.0 | Self::RX_DATA.0);
    /// Watch-list installed at `open` and restored after bus recovery.
    pub const ALERTS_TO_WATCH: Self = Self(Self::ERROR_ALERTS.0 | Self::DATA_EVENTS.0);

    /// Wrap a raw mask. Bits outside [`Alerts::ALL`] are dropped.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every flag of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one flag of `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// True when the set carries one of the [`Alerts::ERROR_ALERTS`].
    pub const fn is_error(self) -> bool {
        self.intersects(Self::ERROR_ALERTS)
    }
}

impl core::ops::BitOr for Alerts {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for Alerts {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl core::ops::BitAnd for Alerts {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl From<Alerts> for u32 {
    fn from(val: Alerts) -> Self {
        val.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// The watch-list partitions cleanly into error and data categories.
    fn test_watch_list_partition() {
        assert_eq!(Alerts::ALERTS_TO_WATCH.bits(), 0x0000_7107);
        assert!(!Alerts::ERROR_ALERTS.intersects(Alerts::DATA_EVENTS));
        assert!(Alerts::ALERTS_TO_WATCH.contains(Alerts::BUS_OFF));
        assert!(!Alerts::ALERTS_TO_WATCH.contains(Alerts::BUS_RECOVERED));
    }

    #[test]
    /// Error classification only looks at the error subset.
    fn test_is_error() {
        assert!(Alerts::ERR_PASS.is_error());
        assert!((Alerts::RX_DATA | Alerts::BUS_OFF).is_error());
        assert!(!(Alerts::TX_SUCCESS | Alerts::BUS_RECOVERED).is_error());
        assert!(!Alerts::NONE.is_error());
    }

    #[test]
    /// Unknown bits (e.g. the ESP-IDF "and log" flag) are stripped.
    fn test_from_bits_masks_unknown() {
        assert_eq!(Alerts::from_bits(0x0002_2000), Alerts::BUS_OFF);
    }
}
