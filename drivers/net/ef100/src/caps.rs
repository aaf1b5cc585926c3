//! # Datapath Capabilities
//!
//! One GET_CAPABILITIES round-trip, decoded into a [`CapabilityState`]
//! that the caller publishes once probe succeeds.

use efx_core::{CapabilityState, Error, Flags1, Flags2, McdiRpc, NetDevice, Result, TsoLimits};
use efx_mcdi::protocol::{
    get_capabilities, read_dword, read_word, window_mode_to_stride, MC_CMD_GET_CAPABILITIES,
};

/// Query the firmware's datapath capabilities
///
/// Nothing is applied when the response is short or the VI window mode is
/// unknown.
pub fn query_datapath_caps<M, N>(mcdi: &M, net: &N, tso: TsoLimits) -> Result<CapabilityState>
where
    M: McdiRpc + ?Sized,
    N: NetDevice + ?Sized,
{
    let mut out = [0u8; get_capabilities::V4_OUT_LEN];
    let len = mcdi.rpc(MC_CMD_GET_CAPABILITIES, &[], &mut out)?;
    if len < get_capabilities::V4_OUT_LEN {
        log::error!("EF100: unable to read datapath firmware capabilities");
        return Err(Error::Io);
    }

    let flags1 = Flags1::from_bits_retain(read_dword(&out, get_capabilities::OUT_FLAGS1_OFST) as u64);
    let flags2 = Flags2::from_bits_retain(read_dword(&out, get_capabilities::V2_OUT_FLAGS2_OFST) as u64);
    let vi_stride = window_mode_to_stride(out[get_capabilities::V3_OUT_VI_WINDOW_MODE_OFST])?;
    let mac_stats_num = read_word(&out, get_capabilities::V4_OUT_MAC_STATS_NUM_STATS_OFST);

    if flags2.contains(Flags2::TX_TSO_V3) {
        net.enable_tso();
    }
    log::debug!("EF100: firmware reports num_mac_stats = {}", mac_stats_num);

    Ok(CapabilityState {
        flags1,
        flags2,
        vi_stride,
        mac_stats_num,
        tso,
    })
}
