//! # Core Types
//!
//! Strongly-typed identifiers and state enums shared across the stack.

use core::fmt;
use core::time::Duration;

// =============================================================================
// ADDRESS TYPES
// =============================================================================

/// Bus address of a DMA-visible buffer
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct DmaAddr(pub u64);

impl DmaAddr {
    /// Null address
    pub const NULL: Self = Self(0);

    /// Create a new DMA address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Get raw address value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Upper 32 bits
    #[inline]
    pub const fn hi(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Lower 32 bits
    #[inline]
    pub const fn lo(self) -> u32 {
        self.0 as u32
    }

    /// Offset this address by `bytes`
    #[inline]
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }

    /// Check alignment
    #[inline]
    pub const fn is_aligned(self, align: u64) -> bool {
        self.0 & (align - 1) == 0
    }
}

impl fmt::Debug for DmaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmaAddr({:#x})", self.0)
    }
}

/// Round `value` up to a multiple of `align` (power of two)
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Event queue / channel index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ChannelId(pub u16);

impl ChannelId {
    /// Index into per-channel tables
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ethernet MAC address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// All-zero address
    pub const ZERO: Self = Self([0; 6]);

    /// Build from the first six bytes of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(raw))
    }

    /// Unicast and non-zero
    pub fn is_valid_ether(&self) -> bool {
        self.0[0] & 0x01 == 0 && *self != Self::ZERO
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Monotonic timestamp supplied by the host clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// From nanoseconds
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Nanoseconds since host epoch
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if the clock went backwards
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

// =============================================================================
// DEVICE STATE
// =============================================================================

/// Coarse device state driven by probe and reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetState {
    /// Not probed yet
    #[default]
    Uninitialized,
    /// Probe completed, net device not opened
    Probed,
    /// Net device registered and running
    NetUp,
    /// Net device registered but stopped
    NetDown,
    /// Reset in progress
    Resetting,
    /// Unusable until a full re-probe
    Disabled,
}

impl ResetState {
    /// Terminal state
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

/// Reset scope requested by the recovery path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    /// Reset without visible disruption
    Invisible,
    /// Try recovery, otherwise full reset
    RecoverOrAll,
    /// Reset the whole function (MAC, PHY, datapath)
    All,
    /// Reset the whole adapter
    World,
    /// Try recovery, otherwise disable
    RecoverOrDisable,
    /// Datapath only
    Datapath,
    /// Take the device down and keep it down
    Disable,
    /// Transmit watchdog fired
    TxWatchdog,
    /// Management controller failure
    McFailure,
    /// Firmware request timed out
    McdiTimeout,
}

/// Outcome of a reset request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Device was reset and reopened
    Completed,
    /// Reset type not performed, device intentionally left closed
    LeftDown,
}

/// Interrupt delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptMode {
    /// MSI-X vectors per channel
    #[default]
    Msix,
    /// Single MSI vector
    Msi,
    /// Legacy line interrupt
    Legacy,
    /// No interrupts, busy polling
    Polled,
}

/// PCI function personality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarConfig {
    /// Standard EF100 network device
    #[default]
    Ef100,
    /// vDPA device
    Vdpa,
    /// No device bound
    None,
}

/// Link state reported by the port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkState {
    /// Link is up
    pub up: bool,
    /// Full duplex
    pub full_duplex: bool,
    /// Speed in Mbps
    pub speed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dma_addr_split() {
        let addr = DmaAddr::new(0x1234_5678_9abc_de00);
        assert_eq!(addr.hi(), 0x1234_5678);
        assert_eq!(addr.lo(), 0x9abc_de00);
        assert!(addr.is_aligned(256));
        assert!(!addr.offset(4).is_aligned(256));
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1032, 256), 1280);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(0, 256), 0);
    }

    #[test]
    fn test_mac_address() {
        let mac = MacAddress::from_slice(&[0x00, 0x0f, 0x53, 0x01, 0x02, 0x03, 0xff]);
        let mac = mac.unwrap();
        assert!(mac.is_valid_ether());
        assert!(!MacAddress::ZERO.is_valid_ether());
        assert!(!MacAddress([0x01, 0, 0, 0, 0, 1]).is_valid_ether());
        assert!(MacAddress::from_slice(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_timestamp_since() {
        let a = Timestamp::from_nanos(1_000);
        let b = Timestamp::from_nanos(3_500);
        assert_eq!(b.since(a), Duration::from_nanos(2_500));
        assert_eq!(a.since(b), Duration::ZERO);
    }
}
