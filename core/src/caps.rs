//! # Device Capabilities
//!
//! Firmware-reported datapath capability words and the numeric limits
//! learned during probe. Populated once, read-only afterwards.

use bitflags::bitflags;
use spin::Once;

use crate::error::{Error, Result};

// =============================================================================
// CAPABILITY FLAG WORDS
// =============================================================================

bitflags! {
    /// First datapath capability word (GET_CAPABILITIES FLAGS1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags1: u64 {
        /// vPort reconfiguration
        const VPORT_RECONFIGURE = 1 << 3;
        /// TX striping
        const TX_STRIPING = 1 << 4;
        /// vAdaptor query
        const VADAPTOR_QUERY = 1 << 5;
        /// EVB port VLAN restriction
        const EVB_PORT_VLAN_RESTRICT = 1 << 6;
        /// Driver attach in preboot
        const DRV_ATTACH_PREBOOT = 1 << 7;
        /// Forced RX event merging
        const RX_FORCE_EVENT_MERGING = 1 << 8;
        /// SET_MAC with extended fields
        const SET_MAC_ENHANCED = 1 << 9;
        /// Additional RSS hashing modes
        const ADDITIONAL_RSS_MODES = 1 << 13;
        /// Limited RSS table
        const RX_RSS_LIMITED = 1 << 16;
        /// RX frames keep their FCS
        const RX_INCLUDE_FCS = 1 << 18;
        /// TX VLAN insertion
        const TX_VLAN_INSERTION = 1 << 19;
        /// RX VLAN stripping
        const RX_VLAN_STRIPPING = 1 << 20;
        /// TSO
        const TX_TSO = 1 << 21;
        /// Zero-length RX prefix
        const RX_PREFIX_LEN_0 = 1 << 22;
        /// 14-byte RX prefix
        const RX_PREFIX_LEN_14 = 1 << 23;
        /// RX timestamps
        const RX_TIMESTAMP = 1 << 24;
        /// RX batching
        const RX_BATCHING = 1 << 25;
        /// Multicast filter chaining
        const MCAST_FILTER_CHAINING = 1 << 26;
        /// PM and RXDP counters
        const PM_AND_RXDP_COUNTERS = 1 << 27;
        /// RX scatter disable
        const RX_DISABLE_SCATTER = 1 << 28;
        /// TX multicast UDP loopback
        const TX_MCAST_UDP_LOOPBACK = 1 << 29;
        /// Edge virtual bridging
        const EVB = 1 << 30;
        /// VXLAN/NVGRE offloads
        const VXLAN_NVGRE = 1 << 31;
    }
}

bitflags! {
    /// Second datapath capability word (GET_CAPABILITIES FLAGS2)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags2: u64 {
        /// TSO v2
        const TX_TSO_V2 = 1 << 0;
        /// TSO v2 with encapsulation
        const TX_TSO_V2_ENCAP = 1 << 1;
        /// Event queue timer control
        const EVQ_TIMER_CTRL = 1 << 2;
        /// Event cut-through
        const EVENT_CUT_THROUGH = 1 << 3;
        /// RX cut-through
        const RX_CUT_THROUGH = 1 << 4;
        /// 40G TX size bins in MAC stats
        const MAC_STATS_40G_TX_SIZE_BINS = 1 << 6;
        /// INIT_EVQ v2
        const INIT_EVQ_V2 = 1 << 7;
        /// TX timestamping
        const TX_TIMESTAMP = 1 << 9;
        /// MCDI background mode
        const MCDI_BACKGROUND = 1 << 13;
        /// MCDI doorbell return
        const MCDI_DB_RETURN = 1 << 14;
        /// CTPIO
        const CTPIO = 1 << 15;
        /// Filter action flag
        const FILTER_ACTION_FLAG = 1 << 19;
        /// Filter action mark
        const FILTER_ACTION_MARK = 1 << 20;
        /// VI spreading
        const VI_SPREADING = 1 << 25;
        /// Bundle update
        const BUNDLE_UPDATE = 1 << 29;
        /// TSO v3 (EF100 native TSO)
        const TX_TSO_V3 = 1 << 30;
        /// Dynamic sensors
        const DYNAMIC_SENSORS = 1 << 31;
    }
}

/// Selects which capability word a flag test reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapsWord {
    /// FLAGS1
    Flags1,
    /// FLAGS2
    Flags2,
}

// =============================================================================
// TSO LIMITS
// =============================================================================

/// TSO limits taken from design parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsoLimits {
    /// Maximum header length in bytes
    pub max_hdr_len: u16,
    /// Maximum payload length in bytes
    pub max_payload_len: u32,
    /// Maximum payload segments
    pub max_payload_num_segs: u16,
    /// Maximum frames per TSO burst
    pub max_frames: u16,
}

impl TsoLimits {
    /// Protocol defaults used before design parameters are read
    pub const DEFAULT: Self = Self {
        max_hdr_len: 192,
        max_payload_len: 0x3fff,
        max_payload_num_segs: 64,
        max_frames: 8192,
    };
}

impl Default for TsoLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// CAPABILITY STATE
// =============================================================================

/// Everything probe learns about the datapath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityState {
    /// First flag word
    pub flags1: Flags1,
    /// Second flag word
    pub flags2: Flags2,
    /// VI window stride in bytes
    pub vi_stride: u32,
    /// Number of MAC statistics the firmware DMAs
    pub mac_stats_num: u16,
    /// TSO limits
    pub tso: TsoLimits,
}

impl CapabilityState {
    /// Test a raw bit in one of the flag words
    pub fn check(&self, flag: u32, word: CapsWord) -> bool {
        if flag >= 64 {
            return false;
        }
        let bits = match word {
            CapsWord::Flags1 => self.flags1.bits(),
            CapsWord::Flags2 => self.flags2.bits(),
        };
        bits & (1u64 << flag) != 0
    }
}

/// Write-once holder for [`CapabilityState`]
#[derive(Debug)]
pub struct CapabilityCell {
    inner: Once<CapabilityState>,
}

impl CapabilityCell {
    /// Create an empty cell
    pub const fn new() -> Self {
        Self { inner: Once::new() }
    }

    /// Publish the capability state, fails if already published
    pub fn commit(&self, state: CapabilityState) -> Result<&CapabilityState> {
        if self.inner.is_completed() {
            return Err(Error::InvalidState);
        }
        Ok(self.inner.call_once(|| state))
    }

    /// Published capabilities, if probe got that far
    pub fn get(&self) -> Option<&CapabilityState> {
        self.inner.get()
    }
}

impl Default for CapabilityCell {
    fn default() -> Self {
        Self::new()
    }
}
