//! # Port Statistics
//!
//! Descriptor table of the statistics this function reports, and the
//! accumulated values derived from the firmware's MAC statistics DMA.
//!
//! Values are reported relative to the snapshot taken on the first pull,
//! so counters start from zero when the driver binds.

use alloc::vec::Vec;

use arrayvec::ArrayVec;

use efx_mcdi::protocol::mac_stats::*;

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Where a statistic comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatSource {
    /// Qword index in the MAC statistics DMA buffer
    Dma(usize),
    /// Maintained by the driver
    Software,
}

/// One statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatDesc {
    /// Name reported to ethtool
    pub name: &'static str,
    /// Value source
    pub source: StatSource,
}

macro_rules! ef100_stats {
    ($($name:ident = $source:expr),* $(,)?) => {
        paste::paste! {
            /// Index of each statistic in [`EF100_STAT_DESC`]
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            #[repr(usize)]
            #[allow(missing_docs)]
            pub enum StatId {
                $([<$name:camel>],)*
            }

            /// Statistic descriptors, indexed by [`StatId`]
            pub const EF100_STAT_DESC: &[StatDesc] = &[
                $(StatDesc { name: stringify!($name), source: $source },)*
            ];
        }
    };
}

const fn dma(index: usize) -> StatSource {
    StatSource::Dma(index)
}

const SW: StatSource = StatSource::Software;

ef100_stats! {
    port_tx_bytes = dma(MC_CMD_MAC_TX_BYTES),
    port_tx_packets = dma(MC_CMD_MAC_TX_PKTS),
    port_tx_pause = dma(MC_CMD_MAC_TX_PAUSE_PKTS),
    port_tx_unicast = dma(MC_CMD_MAC_TX_UNICAST_PKTS),
    port_tx_multicast = dma(MC_CMD_MAC_TX_MULTICAST_PKTS),
    port_tx_broadcast = dma(MC_CMD_MAC_TX_BROADCAST_PKTS),
    port_tx_lt64 = dma(MC_CMD_MAC_TX_LT64_PKTS),
    port_tx_64 = dma(MC_CMD_MAC_TX_64_PKTS),
    port_tx_65_to_127 = dma(MC_CMD_MAC_TX_65_TO_127_PKTS),
    port_tx_128_to_255 = dma(MC_CMD_MAC_TX_128_TO_255_PKTS),
    port_tx_256_to_511 = dma(MC_CMD_MAC_TX_256_TO_511_PKTS),
    port_tx_512_to_1023 = dma(MC_CMD_MAC_TX_512_TO_1023_PKTS),
    port_tx_1024_to_15xx = dma(MC_CMD_MAC_TX_1024_TO_15XX_PKTS),
    port_tx_15xx_to_jumbo = dma(MC_CMD_MAC_TX_15XX_TO_JUMBO_PKTS),
    port_rx_bytes = dma(MC_CMD_MAC_RX_BYTES),
    port_rx_packets = dma(MC_CMD_MAC_RX_PKTS),
    port_rx_good = dma(MC_CMD_MAC_RX_GOOD_PKTS),
    port_rx_bad = dma(MC_CMD_MAC_RX_BAD_FCS_PKTS),
    port_rx_pause = dma(MC_CMD_MAC_RX_PAUSE_PKTS),
    port_rx_unicast = dma(MC_CMD_MAC_RX_UNICAST_PKTS),
    port_rx_multicast = dma(MC_CMD_MAC_RX_MULTICAST_PKTS),
    port_rx_broadcast = dma(MC_CMD_MAC_RX_BROADCAST_PKTS),
    port_rx_lt64 = dma(MC_CMD_MAC_RX_UNDERSIZE_PKTS),
    port_rx_64 = dma(MC_CMD_MAC_RX_64_PKTS),
    port_rx_65_to_127 = dma(MC_CMD_MAC_RX_65_TO_127_PKTS),
    port_rx_128_to_255 = dma(MC_CMD_MAC_RX_128_TO_255_PKTS),
    port_rx_256_to_511 = dma(MC_CMD_MAC_RX_256_TO_511_PKTS),
    port_rx_512_to_1023 = dma(MC_CMD_MAC_RX_512_TO_1023_PKTS),
    port_rx_1024_to_15xx = dma(MC_CMD_MAC_RX_1024_TO_15XX_PKTS),
    port_rx_15xx_to_jumbo = dma(MC_CMD_MAC_RX_15XX_TO_JUMBO_PKTS),
    port_rx_gtjumbo = dma(MC_CMD_MAC_RX_GTJUMBO_PKTS),
    port_rx_bad_gtjumbo = dma(MC_CMD_MAC_RX_JABBER_PKTS),
    port_rx_align_error = dma(MC_CMD_MAC_RX_ALIGN_ERROR_PKTS),
    port_rx_length_error = dma(MC_CMD_MAC_RX_LENGTH_ERROR_PKTS),
    port_rx_overflow = dma(MC_CMD_MAC_RX_OVERFLOW_PKTS),
    port_rx_nodesc_drops = dma(MC_CMD_MAC_RX_NODESC_DROPS),
    rx_nodesc_trunc = SW,
    rx_noskb_drops = SW,
}

/// Number of statistics
pub const EF100_STAT_COUNT: usize = EF100_STAT_DESC.len();

static_assertions::const_assert_eq!(EF100_STAT_COUNT, 38);
static_assertions::const_assert!(EF100_STAT_COUNT <= 64);

// =============================================================================
// MASKS
// =============================================================================

const fn bit(id: StatId) -> u64 {
    1 << id as usize
}

/// Statistics feeding the core link counters
pub const COMMON_STAT_MASK: u64 = bit(StatId::PortRxPackets)
    | bit(StatId::PortTxPackets)
    | bit(StatId::PortRxBytes)
    | bit(StatId::PortTxBytes)
    | bit(StatId::PortRxMulticast)
    | bit(StatId::PortRxBad)
    | bit(StatId::PortRxAlignError)
    | bit(StatId::PortRxOverflow);

/// Statistics reported through ethtool
pub const ETHTOOL_STAT_MASK: u64 = bit(StatId::PortTxPause)
    | bit(StatId::PortTxUnicast)
    | bit(StatId::PortTxMulticast)
    | bit(StatId::PortTxBroadcast)
    | bit(StatId::PortTxLt64)
    | bit(StatId::PortTx64)
    | bit(StatId::PortTx65To127)
    | bit(StatId::PortTx128To255)
    | bit(StatId::PortTx256To511)
    | bit(StatId::PortTx512To1023)
    | bit(StatId::PortTx1024To15xx)
    | bit(StatId::PortTx15xxToJumbo)
    | bit(StatId::PortRxGood)
    | bit(StatId::PortRxPause)
    | bit(StatId::PortRxUnicast)
    | bit(StatId::PortRxBroadcast)
    | bit(StatId::PortRxLt64)
    | bit(StatId::PortRx64)
    | bit(StatId::PortRx65To127)
    | bit(StatId::PortRx128To255)
    | bit(StatId::PortRx256To511)
    | bit(StatId::PortRx512To1023)
    | bit(StatId::PortRx1024To15xx)
    | bit(StatId::PortRx15xxToJumbo)
    | bit(StatId::PortRxGtjumbo)
    | bit(StatId::PortRxBadGtjumbo)
    | bit(StatId::PortRxLengthError)
    | bit(StatId::PortRxNodescDrops)
    | bit(StatId::RxNodescTrunc)
    | bit(StatId::RxNoskbDrops);

fn masked(mask: u64) -> impl Iterator<Item = (usize, &'static StatDesc)> {
    EF100_STAT_DESC
        .iter()
        .enumerate()
        .filter(move |(index, _)| mask & (1u64 << index) != 0)
}

/// Names of the ethtool statistics, in report order
pub fn describe_stats() -> ArrayVec<&'static str, EF100_STAT_COUNT> {
    masked(ETHTOOL_STAT_MASK).map(|(_, desc)| desc.name).collect()
}

/// Smallest MAC statistics snapshot covering every DMA statistic
pub fn mac_stats_len(num_mac_stats: u16) -> usize {
    (num_mac_stats as usize).max(MC_CMD_MAC_NSTATS_MIN)
}

// =============================================================================
// ACCUMULATED STATE
// =============================================================================

/// Aggregate link counters for the network stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Received packets
    pub rx_packets: u64,
    /// Transmitted packets
    pub tx_packets: u64,
    /// Received bytes
    pub rx_bytes: u64,
    /// Transmitted bytes
    pub tx_bytes: u64,
    /// Receive drops
    pub rx_dropped: u64,
    /// Received multicast packets
    pub multicast: u64,
    /// Oversized or bad-length frames
    pub rx_length_errors: u64,
    /// Bad FCS
    pub rx_crc_errors: u64,
    /// Alignment errors
    pub rx_frame_errors: u64,
    /// Receive FIFO overflows
    pub rx_fifo_errors: u64,
    /// Sum of length, CRC and frame errors
    pub rx_errors: u64,
}

/// Result of a statistics update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    /// Ethtool statistics, in the order of [`describe_stats`]
    pub full: ArrayVec<u64, EF100_STAT_COUNT>,
    /// Aggregate link counters
    pub link: LinkStats,
}

/// Statistics guarded by the stats lock
#[derive(Debug, Clone)]
pub struct StatsState {
    stats: [u64; EF100_STAT_COUNT],
    mc_initial: Vec<u64>,
    initialised: bool,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Zeroed state without a baseline
    pub fn new() -> Self {
        Self {
            stats: [0; EF100_STAT_COUNT],
            mc_initial: Vec::new(),
            initialised: false,
        }
    }

    /// A baseline has been taken
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Current value of one statistic
    pub fn get(&self, id: StatId) -> u64 {
        self.stats[id as usize]
    }

    /// Make `snapshot` the zero point of every DMA statistic
    pub fn reset(&mut self, snapshot: &[u64]) {
        self.mc_initial.clear();
        self.mc_initial.extend_from_slice(snapshot);
        self.stats = [0; EF100_STAT_COUNT];
        self.initialised = true;
    }

    /// Fold a MAC statistics snapshot into the accumulated values
    pub fn update(&mut self, snapshot: &[u64]) {
        for (index, desc) in masked(COMMON_STAT_MASK | ETHTOOL_STAT_MASK) {
            let StatSource::Dma(offset) = desc.source else {
                continue;
            };
            let value = snapshot.get(offset).copied().unwrap_or(0);
            let initial = self.mc_initial.get(offset).copied().unwrap_or(0);
            self.stats[index] = value.wrapping_sub(initial);
        }
    }

    /// Ethtool statistics, in the order of [`describe_stats`]
    pub fn full_stats(&self) -> ArrayVec<u64, EF100_STAT_COUNT> {
        masked(ETHTOOL_STAT_MASK)
            .map(|(index, _)| self.stats[index])
            .collect()
    }

    /// Aggregate link counters
    pub fn link_stats(&self) -> LinkStats {
        let s = |id: StatId| self.get(id);
        let rx_length_errors = s(StatId::PortRxGtjumbo) + s(StatId::PortRxLengthError);
        let rx_crc_errors = s(StatId::PortRxBad);
        let rx_frame_errors = s(StatId::PortRxAlignError);
        LinkStats {
            rx_packets: s(StatId::PortRxPackets),
            tx_packets: s(StatId::PortTxPackets),
            rx_bytes: s(StatId::PortRxBytes),
            tx_bytes: s(StatId::PortTxBytes),
            rx_dropped: s(StatId::PortRxNodescDrops)
                + s(StatId::RxNodescTrunc)
                + s(StatId::RxNoskbDrops),
            multicast: s(StatId::PortRxMulticast),
            rx_length_errors,
            rx_crc_errors,
            rx_frame_errors,
            rx_fifo_errors: s(StatId::PortRxOverflow),
            rx_errors: rx_length_errors + rx_crc_errors + rx_frame_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn snapshot(fill: impl Fn(usize) -> u64) -> Vec<u64> {
        (0..MC_CMD_MAC_NSTATS_MIN).map(fill).collect()
    }

    #[test]
    fn test_descriptor_table() {
        assert_eq!(EF100_STAT_DESC[StatId::PortTxBytes as usize].name, "port_tx_bytes");
        assert_eq!(
            EF100_STAT_DESC[StatId::PortRxBad as usize].source,
            StatSource::Dma(MC_CMD_MAC_RX_BAD_FCS_PKTS)
        );
        assert_eq!(
            EF100_STAT_DESC[StatId::PortRxLt64 as usize].source,
            StatSource::Dma(MC_CMD_MAC_RX_UNDERSIZE_PKTS)
        );
        assert_eq!(
            EF100_STAT_DESC[StatId::PortRxBadGtjumbo as usize].source,
            StatSource::Dma(MC_CMD_MAC_RX_JABBER_PKTS)
        );
        assert_eq!(EF100_STAT_DESC[StatId::RxNoskbDrops as usize].source, StatSource::Software);
    }

    #[test]
    fn test_describe_uses_ethtool_mask() {
        let names = describe_stats();
        assert_eq!(names.len(), 30);
        assert_eq!(names[0], "port_tx_pause");
        assert_eq!(names[names.len() - 1], "rx_noskb_drops");
        assert!(!names.contains(&"port_rx_packets"));
    }

    #[test]
    fn test_update_subtracts_baseline() {
        let mut state = StatsState::new();
        state.reset(&snapshot(|i| i as u64 * 10));
        assert!(state.is_initialised());

        state.update(&snapshot(|i| i as u64 * 10 + 3));
        assert_eq!(state.get(StatId::PortRxPackets), 3);
        assert_eq!(state.get(StatId::PortTxPause), 3);
        assert_eq!(state.get(StatId::RxNodescTrunc), 0);
    }

    #[test]
    fn test_link_stats_formulas() {
        let mut state = StatsState::new();
        let mut snap = vec![0u64; MC_CMD_MAC_NSTATS_MIN];
        snap[MC_CMD_MAC_RX_PKTS] = 100;
        snap[MC_CMD_MAC_TX_PKTS] = 50;
        snap[MC_CMD_MAC_RX_GTJUMBO_PKTS] = 1;
        snap[MC_CMD_MAC_RX_LENGTH_ERROR_PKTS] = 2;
        snap[MC_CMD_MAC_RX_BAD_FCS_PKTS] = 4;
        snap[MC_CMD_MAC_RX_ALIGN_ERROR_PKTS] = 8;
        snap[MC_CMD_MAC_RX_OVERFLOW_PKTS] = 16;
        snap[MC_CMD_MAC_RX_NODESC_DROPS] = 32;
        state.update(&snap);

        let link = state.link_stats();
        assert_eq!(link.rx_packets, 100);
        assert_eq!(link.tx_packets, 50);
        assert_eq!(link.rx_length_errors, 3);
        assert_eq!(link.rx_crc_errors, 4);
        assert_eq!(link.rx_frame_errors, 8);
        assert_eq!(link.rx_fifo_errors, 16);
        assert_eq!(link.rx_dropped, 32);
        assert_eq!(link.rx_errors, 15);
    }

    #[test]
    fn test_full_stats_follow_descriptions() {
        let mut state = StatsState::new();
        state.update(&snapshot(|i| i as u64));
        let full = state.full_stats();
        assert_eq!(full.len(), describe_stats().len());
        assert_eq!(full[0], MC_CMD_MAC_TX_PAUSE_PKTS as u64);
    }

    #[test]
    fn test_short_snapshot_reads_zero() {
        let mut state = StatsState::new();
        state.update(&[7; 4]);
        assert_eq!(state.get(StatId::PortTxBytes), 0);
        assert_eq!(state.get(StatId::PortTxPackets), 7);
        assert_eq!(mac_stats_len(0), MC_CMD_MAC_NSTATS_MIN);
        assert_eq!(mac_stats_len(92), 92);
    }
}
