//! # MCDI Protocol
//!
//! Wire layout of MCDI v2 messages, command numbers, event encodings and
//! the MAC statistics DMA layout used by EF100 firmware.

use core::time::Duration;

use efx_core::{align_up, Error, Result};
use efx_hal::BitField;

// =============================================================================
// MESSAGE SIZES
// =============================================================================

/// Largest request or response payload
pub const MCDI_CTL_SDU_LEN_MAX: usize = 0x400;
/// v2 header: two dwords
pub const MCDI_HEADER_LEN: usize = 8;
/// Bytes used by one message slot
pub const MCDI_BUF_LEN: usize = MCDI_HEADER_LEN + MCDI_CTL_SDU_LEN_MAX;
/// Slot alignment required by the doorbell
pub const MCDI_BUF_ALIGN: usize = 256;
/// Distance between consecutive slots
pub const MCDI_BUF_STRIDE: usize = align_up(MCDI_BUF_LEN, MCDI_BUF_ALIGN);

// Responses are copied out in dwords
static_assertions::const_assert_eq!(MCDI_CTL_SDU_LEN_MAX % 4, 0);
static_assertions::const_assert!(MCDI_BUF_ALIGN.is_power_of_two());
static_assertions::const_assert_eq!(MCDI_BUF_STRIDE % MCDI_BUF_ALIGN, 0);

// =============================================================================
// HEADER FIELDS
// =============================================================================

/// Command code, `MC_CMD_V2_EXTN` for every v2 request
pub const MCDI_HEADER_CODE: BitField = BitField::new(0, 7);
/// Resync request
pub const MCDI_HEADER_RESYNC: BitField = BitField::bit(7);
/// v1 data length (zero for v2)
pub const MCDI_HEADER_DATALEN: BitField = BitField::new(8, 8);
/// Sequence number
pub const MCDI_HEADER_SEQ: BitField = BitField::new(16, 4);
/// Sequence numbers wrap within the header field
pub const MCDI_HEADER_SEQ_MASK: u8 = 0x0f;
/// Firmware reported an error
pub const MCDI_HEADER_ERROR: BitField = BitField::bit(22);
/// Firmware has written the response
pub const MCDI_HEADER_RESPONSE: BitField = BitField::bit(23);
/// Extra flags
pub const MCDI_HEADER_XFLAGS: BitField = BitField::new(24, 8);
/// Request a completion event
pub const MCDI_HEADER_XFLAGS_EVREQ: u32 = 0x01;

/// Extended command number (second dword)
pub const MC_CMD_V2_EXTN_IN_EXTENDED_CMD: BitField = BitField::new(0, 15);
/// Payload length (second dword)
pub const MC_CMD_V2_EXTN_IN_ACTUAL_LEN: BitField = BitField::new(16, 10);
/// v2 extension marker in `MCDI_HEADER_CODE`
pub const MC_CMD_V2_EXTN: u32 = 0x7f;

/// Offset of the error code in an error response payload
pub const MC_CMD_ERR_CODE_OFST: usize = 0;

// =============================================================================
// COMMANDS
// =============================================================================

/// Inject an event into an event queue
pub const MC_CMD_DRIVER_EVENT: u16 = 0x05;
/// Firmware version
pub const MC_CMD_GET_VERSION: u16 = 0x08;
/// Function-level reset
pub const MC_CMD_ENTITY_RESET: u16 = 0x20;
/// PHY configuration
pub const MC_CMD_GET_PHY_CFG: u16 = 0x24;
/// Erase an NVRAM partition
pub const MC_CMD_NVRAM_ERASE: u16 = 0x3b;
/// Finish an NVRAM update
pub const MC_CMD_NVRAM_UPDATE_FINISH: u16 = 0x3c;
/// Permanent MAC addresses
pub const MC_CMD_GET_MAC_ADDRESSES: u16 = 0x55;
/// Datapath capabilities
pub const MC_CMD_GET_CAPABILITIES: u16 = 0xbe;
/// Raise a test interrupt
pub const MC_CMD_TRIGGER_INTERRUPT: u16 = 0xe3;

/// `MC_CMD_DRIVER_EVENT` request layout
pub mod driver_event {
    /// Target event queue
    pub const IN_EVQ_OFST: usize = 0;
    /// Event qword
    pub const IN_DATA_OFST: usize = 4;
    /// Request length
    pub const IN_LEN: usize = 12;
}

/// `MC_CMD_TRIGGER_INTERRUPT` request layout
pub mod trigger_interrupt {
    /// Interrupt level
    pub const IN_INTR_LEVEL_OFST: usize = 0;
    /// Request length
    pub const IN_LEN: usize = 4;
}

/// `MC_CMD_ENTITY_RESET` request layout
pub mod entity_reset {
    /// Flag dword
    pub const IN_FLAG_OFST: usize = 0;
    /// Reset every resource owned by the function
    pub const IN_FUNCTION_RESOURCE_RESET: u32 = 1 << 0;
    /// Request length
    pub const IN_LEN: usize = 4;
}

/// `MC_CMD_GET_MAC_ADDRESSES` response layout
pub mod get_mac_addresses {
    /// Base MAC address
    pub const OUT_MAC_ADDR_BASE_OFST: usize = 0;
    /// Response length
    pub const OUT_LEN: usize = 16;
}

/// `MC_CMD_GET_VERSION` response layout
pub mod get_version {
    /// Four little-endian 16-bit version words
    pub const OUT_VERSION_OFST: usize = 4;
    /// Minimum response carrying the version words
    pub const OUT_MIN_LEN: usize = 12;
    /// Full v1 response
    pub const OUT_LEN: usize = 32;
}

/// `MC_CMD_GET_CAPABILITIES` response layout
pub mod get_capabilities {
    /// First capability word
    pub const OUT_FLAGS1_OFST: usize = 0;
    /// Second capability word (V2)
    pub const V2_OUT_FLAGS2_OFST: usize = 20;
    /// VI window mode byte (V3)
    pub const V3_OUT_VI_WINDOW_MODE_OFST: usize = 72;
    /// MAC statistics count word (V4)
    pub const V4_OUT_MAC_STATS_NUM_STATS_OFST: usize = 76;
    /// Minimum response this driver accepts
    pub const V4_OUT_LEN: usize = 78;
}

// =============================================================================
// RPC TIMEOUTS
// =============================================================================

/// Timeout class of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Ordinary commands
    Standard,
    /// NVRAM erase and update completion
    Long,
}

impl TimeoutClass {
    /// Classify `cmd`
    pub fn of(cmd: u16) -> Self {
        match cmd {
            MC_CMD_NVRAM_ERASE | MC_CMD_NVRAM_UPDATE_FINISH => Self::Long,
            _ => Self::Standard,
        }
    }
}

/// Standard firmware timeout
pub const MCDI_RPC_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for long-running NVRAM operations
pub const MCDI_RPC_LONG_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// EVENTS
// =============================================================================

/// MCDI event code within an MCDI-type event
pub const MCDI_EVENT_CODE: BitField = BitField::new(44, 8);
/// Payload of an MCDI event
pub const MCDI_EVENT_DATA: BitField = BitField::new(0, 32);
/// Sequence number of a completed command
pub const MCDI_EVENT_CMDDONE_SEQ: BitField = BitField::new(0, 8);
/// Response length of a completed command
pub const MCDI_EVENT_CMDDONE_DATALEN: BitField = BitField::new(8, 8);
/// Error number of a completed command
pub const MCDI_EVENT_CMDDONE_ERRNO: BitField = BitField::new(16, 8);

/// MCDI event codes
pub mod event_code {
    /// Firmware assertion
    pub const BADSSERT: u8 = 0x01;
    /// Command completed
    pub const CMDDONE: u8 = 0x03;
    /// Link state changed
    pub const LINKCHANGE: u8 = 0x04;
    /// Sensor state changed
    pub const SENSOREVT: u8 = 0x05;
    /// Scheduler error
    pub const SCHEDERR: u8 = 0x06;
    /// Firmware rebooted
    pub const REBOOT: u8 = 0x07;
    /// MAC statistics DMA completed
    pub const MAC_STATS_DMA: u8 = 0x08;
    /// Firmware alert
    pub const FWALERT: u8 = 0x09;
    /// Function-level reset
    pub const FLR: u8 = 0x0a;
    /// Management controller rebooted
    pub const MC_REBOOT: u8 = 0x1e;
}

// =============================================================================
// HEADERS
// =============================================================================

/// v2 request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Command number
    pub cmd: u16,
    /// Sequence number (4 bits)
    pub seq: u8,
    /// Payload length
    pub len: u16,
    /// Ask firmware for a completion event
    pub ev_req: bool,
}

impl RequestHeader {
    /// Encode as two little-endian dwords
    pub fn encode(&self) -> [u8; MCDI_HEADER_LEN] {
        let mut dw0 = MCDI_HEADER_CODE.set32(0, MC_CMD_V2_EXTN);
        dw0 = MCDI_HEADER_RESYNC.set32(dw0, 1);
        dw0 = MCDI_HEADER_SEQ.set32(dw0, self.seq as u32);
        if self.ev_req {
            dw0 = MCDI_HEADER_XFLAGS.set32(dw0, MCDI_HEADER_XFLAGS_EVREQ);
        }
        let mut dw1 = MC_CMD_V2_EXTN_IN_EXTENDED_CMD.set32(0, self.cmd as u32);
        dw1 = MC_CMD_V2_EXTN_IN_ACTUAL_LEN.set32(dw1, self.len as u32);

        let mut out = [0u8; MCDI_HEADER_LEN];
        out[..4].copy_from_slice(&dw0.to_le_bytes());
        out[4..].copy_from_slice(&dw1.to_le_bytes());
        out
    }
}

/// Decoded v2 response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Command number echoed by firmware
    pub cmd: u16,
    /// Sequence number echoed by firmware
    pub seq: u8,
    /// Payload length
    pub len: usize,
    /// Payload is an error report
    pub error: bool,
}

impl ResponseHeader {
    /// Decode two dwords written by firmware
    pub fn decode(raw: &[u8; MCDI_HEADER_LEN]) -> Result<Self> {
        let dw0 = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let dw1 = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        if MCDI_HEADER_RESPONSE.get32(dw0) == 0 {
            return Err(Error::InvalidState);
        }
        if MCDI_HEADER_CODE.get32(dw0) != MC_CMD_V2_EXTN {
            return Err(Error::Io);
        }
        Ok(Self {
            cmd: MC_CMD_V2_EXTN_IN_EXTENDED_CMD.get32(dw1) as u16,
            seq: MCDI_HEADER_SEQ.get32(dw0) as u8,
            len: MC_CMD_V2_EXTN_IN_ACTUAL_LEN.get32(dw1) as usize,
            error: MCDI_HEADER_ERROR.get32(dw0) != 0,
        })
    }

    /// Build the header firmware writes for a response (used by test
    /// firmware models)
    pub fn encode(&self) -> [u8; MCDI_HEADER_LEN] {
        let mut dw0 = MCDI_HEADER_CODE.set32(0, MC_CMD_V2_EXTN);
        dw0 = MCDI_HEADER_SEQ.set32(dw0, self.seq as u32);
        dw0 = MCDI_HEADER_ERROR.set32(dw0, self.error as u32);
        dw0 = MCDI_HEADER_RESPONSE.set32(dw0, 1);
        let mut dw1 = MC_CMD_V2_EXTN_IN_EXTENDED_CMD.set32(0, self.cmd as u32);
        dw1 = MC_CMD_V2_EXTN_IN_ACTUAL_LEN.set32(dw1, self.len as u32);

        let mut out = [0u8; MCDI_HEADER_LEN];
        out[..4].copy_from_slice(&dw0.to_le_bytes());
        out[4..].copy_from_slice(&dw1.to_le_bytes());
        out
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Translate the VI window mode reported by GET_CAPABILITIES into a stride
pub fn window_mode_to_stride(mode: u8) -> Result<u32> {
    match mode {
        0 => Ok(8 * 1024),
        1 => Ok(16 * 1024),
        2 => Ok(64 * 1024),
        _ => {
            log::error!("MCDI: unrecognised VI window mode {}", mode);
            Err(Error::Io)
        }
    }
}

/// Little-endian dword at `offset`, zero if out of range
pub fn read_dword(buf: &[u8], offset: usize) -> u32 {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(0)
}

/// Little-endian word at `offset`, zero if out of range
pub fn read_word(buf: &[u8], offset: usize) -> u16 {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .unwrap_or(0)
}

/// Store a little-endian dword at `offset`
pub fn write_dword(buf: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let dst = buf
        .get_mut(offset..offset + 4)
        .ok_or(Error::BufferOverflow)?;
    dst.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

// =============================================================================
// MAC STATISTICS LAYOUT
// =============================================================================

/// Index of each statistic in the MAC statistics DMA buffer, in qwords
#[allow(missing_docs)]
pub mod mac_stats {
    pub const MC_CMD_MAC_GENERATION_START: usize = 0;
    pub const MC_CMD_MAC_TX_PKTS: usize = 1;
    pub const MC_CMD_MAC_TX_PAUSE_PKTS: usize = 2;
    pub const MC_CMD_MAC_TX_CONTROL_PKTS: usize = 3;
    pub const MC_CMD_MAC_TX_UNICAST_PKTS: usize = 4;
    pub const MC_CMD_MAC_TX_MULTICAST_PKTS: usize = 5;
    pub const MC_CMD_MAC_TX_BROADCAST_PKTS: usize = 6;
    pub const MC_CMD_MAC_TX_BYTES: usize = 7;
    pub const MC_CMD_MAC_TX_BAD_BYTES: usize = 8;
    pub const MC_CMD_MAC_TX_LT64_PKTS: usize = 9;
    pub const MC_CMD_MAC_TX_64_PKTS: usize = 10;
    pub const MC_CMD_MAC_TX_65_TO_127_PKTS: usize = 11;
    pub const MC_CMD_MAC_TX_128_TO_255_PKTS: usize = 12;
    pub const MC_CMD_MAC_TX_256_TO_511_PKTS: usize = 13;
    pub const MC_CMD_MAC_TX_512_TO_1023_PKTS: usize = 14;
    pub const MC_CMD_MAC_TX_1024_TO_15XX_PKTS: usize = 15;
    pub const MC_CMD_MAC_TX_15XX_TO_JUMBO_PKTS: usize = 16;
    pub const MC_CMD_MAC_TX_GTJUMBO_PKTS: usize = 17;
    pub const MC_CMD_MAC_TX_BAD_FCS_PKTS: usize = 18;
    pub const MC_CMD_MAC_RX_PKTS: usize = 28;
    pub const MC_CMD_MAC_RX_PAUSE_PKTS: usize = 29;
    pub const MC_CMD_MAC_RX_GOOD_PKTS: usize = 30;
    pub const MC_CMD_MAC_RX_CONTROL_PKTS: usize = 31;
    pub const MC_CMD_MAC_RX_UNICAST_PKTS: usize = 32;
    pub const MC_CMD_MAC_RX_MULTICAST_PKTS: usize = 33;
    pub const MC_CMD_MAC_RX_BROADCAST_PKTS: usize = 34;
    pub const MC_CMD_MAC_RX_BYTES: usize = 35;
    pub const MC_CMD_MAC_RX_BAD_BYTES: usize = 36;
    pub const MC_CMD_MAC_RX_64_PKTS: usize = 37;
    pub const MC_CMD_MAC_RX_65_TO_127_PKTS: usize = 38;
    pub const MC_CMD_MAC_RX_128_TO_255_PKTS: usize = 39;
    pub const MC_CMD_MAC_RX_256_TO_511_PKTS: usize = 40;
    pub const MC_CMD_MAC_RX_512_TO_1023_PKTS: usize = 41;
    pub const MC_CMD_MAC_RX_1024_TO_15XX_PKTS: usize = 42;
    pub const MC_CMD_MAC_RX_15XX_TO_JUMBO_PKTS: usize = 43;
    pub const MC_CMD_MAC_RX_GTJUMBO_PKTS: usize = 44;
    pub const MC_CMD_MAC_RX_UNDERSIZE_PKTS: usize = 45;
    pub const MC_CMD_MAC_RX_BAD_FCS_PKTS: usize = 46;
    pub const MC_CMD_MAC_RX_OVERFLOW_PKTS: usize = 47;
    pub const MC_CMD_MAC_RX_FALSE_CARRIER_PKTS: usize = 48;
    pub const MC_CMD_MAC_RX_SYMBOL_ERROR_PKTS: usize = 49;
    pub const MC_CMD_MAC_RX_ALIGN_ERROR_PKTS: usize = 50;
    pub const MC_CMD_MAC_RX_LENGTH_ERROR_PKTS: usize = 51;
    pub const MC_CMD_MAC_RX_INTERNAL_ERROR_PKTS: usize = 52;
    pub const MC_CMD_MAC_RX_JABBER_PKTS: usize = 53;
    pub const MC_CMD_MAC_RX_NODESC_DROPS: usize = 54;
    /// Smallest buffer covering every index above
    pub const MC_CMD_MAC_NSTATS_MIN: usize = 55;
}
