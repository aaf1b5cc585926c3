//! # Design Parameters
//!
//! Hardware limits published by the device as a TLV stream behind
//! `PARAMS_TLV_LEN` / `PARAMS_TLV`.

use efx_core::{Error, Result, TsoLimits};
use efx_hal::{regs, RegisterIo};

use crate::tlv::{Tlv, TlvReader};

/// Smallest DMA queue the driver creates
pub const EFX_MIN_DMAQ_SIZE: u64 = 512;

/// Largest GSO payload the network stack accepts
pub const GSO_MAX_SIZE: u64 = 65536;

/// VI stride the early probe assumes
pub const VI_STRIDES_DEFAULT: u64 = 0x8;

// =============================================================================
// PARAMETER TYPES
// =============================================================================

/// Known design-parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DesignParam {
    /// Padding
    Pad = 0,
    /// Sub-nanosecond bits in partial timestamps
    PartialTstampSubNanoBits = 1,
    /// Sequence bits of unsolicited-event credits
    EvqUnsolCreditSeqBits = 2,
    /// NMMU group size
    NmmuGroupSize = 3,
    /// Protocols with RX L4 checksum validation
    RxL4CsumProtocols = 4,
    /// Longest TSO header
    TsoMaxHdrLen = 5,
    /// Most TSO header segments
    TsoMaxHdrNumSegs = 6,
    /// RX queue size granularity
    RxqSizeGranularity = 7,
    /// TX queue size granularity
    TxqSizeGranularity = 8,
    /// Longest TSO payload
    TsoMaxPayloadLen = 9,
    /// Most TSO payload segments
    TsoMaxPayloadNumSegs = 10,
    /// Most frames per TSO packet
    TsoMaxNumFrames = 11,
    /// Compatibility flags
    Compat = 12,
    /// Longest mem2mem transfer
    Mem2memMaxLen = 13,
    /// EVQ timer tick
    EvqTimerTickNanos = 14,
    /// NMMU page sizes
    NmmuPageSizes = 15,
    /// VI stride mask
    ViStrides = 16,
    /// RX runt threshold
    RxMaxRunt = 17,
}

impl DesignParam {
    /// Classify a record type
    pub fn from_type(ty: u16) -> Option<Self> {
        Some(match ty {
            0 => Self::Pad,
            1 => Self::PartialTstampSubNanoBits,
            2 => Self::EvqUnsolCreditSeqBits,
            3 => Self::NmmuGroupSize,
            4 => Self::RxL4CsumProtocols,
            5 => Self::TsoMaxHdrLen,
            6 => Self::TsoMaxHdrNumSegs,
            7 => Self::RxqSizeGranularity,
            8 => Self::TxqSizeGranularity,
            9 => Self::TsoMaxPayloadLen,
            10 => Self::TsoMaxPayloadNumSegs,
            11 => Self::TsoMaxNumFrames,
            12 => Self::Compat,
            13 => Self::Mem2memMaxLen,
            14 => Self::EvqTimerTickNanos,
            15 => Self::NmmuPageSizes,
            16 => Self::ViStrides,
            17 => Self::RxMaxRunt,
            _ => return None,
        })
    }
}

// =============================================================================
// INTERPRETED STATE
// =============================================================================

/// Limits learned from the design-parameter stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignParams {
    /// TSO limits, defaulted then overwritten
    pub tso: TsoLimits,
    /// GSO size limit for the net device, when published
    pub gso_max_size: Option<u32>,
    /// GSO segment limit for the net device, when published
    pub gso_max_segs: Option<u16>,
}

impl Default for DesignParams {
    fn default() -> Self {
        Self {
            tso: TsoLimits::DEFAULT,
            gso_max_size: None,
            gso_max_segs: None,
        }
    }
}

impl DesignParams {
    /// Apply one record
    pub fn process(&mut self, tlv: &Tlv) -> Result<()> {
        let Some(param) = DesignParam::from_type(tlv.ty) else {
            log::info!("EF100: ignoring unrecognised design parameter {}", tlv.ty);
            return Ok(());
        };

        match param {
            // Padding
            DesignParam::Pad => {}
            // No timestamping support
            DesignParam::PartialTstampSubNanoBits => {}
            // No unsolicited-event credits
            DesignParam::EvqUnsolCreditSeqBits => {}
            // The NMMU is not ours to manage
            DesignParam::NmmuGroupSize => {}
            // RX uses CHECKSUM_COMPLETE
            DesignParam::RxL4CsumProtocols => {}
            DesignParam::TsoMaxHdrLen => {
                self.tso.max_hdr_len = tlv.value.min(0xffff) as u16;
            }
            DesignParam::TsoMaxHdrNumSegs => {
                // TSO descriptors always carry one header segment
                if tlv.value == 0 {
                    log::error!("EF100: TSO_MAX_HDR_NUM_SEGS < 1");
                    return Err(Error::Unsupported);
                }
            }
            DesignParam::RxqSizeGranularity | DesignParam::TxqSizeGranularity => {
                if tlv.value == 0
                    || tlv.value > EFX_MIN_DMAQ_SIZE
                    || EFX_MIN_DMAQ_SIZE % tlv.value != 0
                {
                    log::error!(
                        "EF100: {} size granularity is {}, can't guarantee safety",
                        if param == DesignParam::RxqSizeGranularity { "RXQ" } else { "TXQ" },
                        tlv.value
                    );
                    return Err(Error::Unsupported);
                }
            }
            DesignParam::TsoMaxPayloadLen => {
                let len = tlv.value.min(GSO_MAX_SIZE) as u32;
                self.tso.max_payload_len = len;
                self.gso_max_size = Some(len);
            }
            DesignParam::TsoMaxPayloadNumSegs => {
                let segs = tlv.value.min(0xffff) as u16;
                self.tso.max_payload_num_segs = segs;
                self.gso_max_segs = Some(segs);
            }
            DesignParam::TsoMaxNumFrames => {
                self.tso.max_frames = tlv.value.min(0xffff) as u16;
            }
            DesignParam::Compat => {
                if tlv.value != 0 {
                    log::error!(
                        "EF100: DP_COMPAT has unknown bits {:#x}, driver not compatible with this hw",
                        tlv.value
                    );
                    return Err(Error::Unsupported);
                }
            }
            // mem2mem is unused
            DesignParam::Mem2memMaxLen => {}
            // EVQ timers are unused
            DesignParam::EvqTimerTickNanos => {}
            // The NMMU is not ours to manage
            DesignParam::NmmuPageSizes => {}
            DesignParam::ViStrides => {
                // The real stride comes from GET_CAPABILITIES
                if tlv.value != VI_STRIDES_DEFAULT {
                    log::debug!(
                        "EF100: NIC has other than default VI_STRIDES (mask {:#x}), early probing might use wrong one",
                        tlv.value
                    );
                }
            }
            // LEN_ERR is not inspected
            DesignParam::RxMaxRunt => {}
        }
        Ok(())
    }
}

// =============================================================================
// REGISTER SCAN
// =============================================================================

/// Read and interpret the whole design-parameter stream
///
/// Stops at the first record that cannot be decoded or is incompatible.
pub fn scan_design_params<R: RegisterIo + ?Sized>(regs: &R) -> Result<DesignParams> {
    let mut params = DesignParams::default();
    let mut reader = TlvReader::new();

    let total_len = regs.read32(regs::ER_GZ_PARAMS_TLV_LEN);
    log::debug!("EF100: {} bytes of design parameters", total_len);

    let mut offset = 0u32;
    while offset < total_len {
        let mut data = regs.read32(regs::ER_GZ_PARAMS_TLV + offset);
        for _ in 0..4 {
            if let Some(tlv) = reader.feed(data as u8)? {
                params.process(&tlv)?;
            }
            data >>= 8;
            offset += 1;
        }
    }
    Ok(params)
}
