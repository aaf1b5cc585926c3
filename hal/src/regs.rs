//! # EF100 Register Map
//!
//! Function-BAR registers used by the control plane. Offsets are in bytes
//! from the start of the function's memory BAR.

use crate::field::BitField;

/// Event queue interrupt prime (read-pointer ack)
pub const ER_GZ_EVQ_INT_PRIME: u32 = 0x0000_0040;
/// Event queue id in the prime register
pub const ERF_GZ_EVQ_ID: BitField = BitField::new(0, 16);
/// Masked read index in the prime register
pub const ERF_GZ_IDX: BitField = BitField::new(16, 16);

/// MCDI doorbell, first word written
pub const ER_GZ_MC_DB_LWRD: u32 = 0x0000_0200;
/// MCDI doorbell, second word written (rings the doorbell)
pub const ER_GZ_MC_DB_HWRD: u32 = 0x0000_0204;

/// Management controller software status
pub const ER_GZ_MC_SFT_STATUS: u32 = 0x0000_0208;
/// Warm boot counter in the status word
pub const ERF_GZ_WARM_BOOT_COUNT: BitField = BitField::new(0, 16);
/// Boot magic in the status word
pub const ERF_GZ_BOOT_MAGIC: BitField = BitField::new(16, 16);
/// Expected boot magic
pub const BOOT_MAGIC: u32 = 0xb007;

/// Design parameter stream length in bytes
pub const ER_GZ_PARAMS_TLV_LEN: u32 = 0x0000_0c00;
/// Design parameter stream base
pub const ER_GZ_PARAMS_TLV: u32 = 0x0000_0c04;

static_assertions::const_assert_eq!(ER_GZ_MC_DB_HWRD, ER_GZ_MC_DB_LWRD + 4);
static_assertions::const_assert_eq!(ER_GZ_PARAMS_TLV, ER_GZ_PARAMS_TLV_LEN + 4);
