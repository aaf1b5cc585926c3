//! # Reset Orchestration
//!
//! Maps reset requests onto what EF100 firmware can do and drives the
//! function through them.
//!
//! ## Reset Flow
//!
//! - TX watchdog: close, re-attach, reopen. Filters stay in place.
//! - Full reset: close, drop the filter table, reset the function in
//!   firmware, re-attach, rebuild the filter table, reopen.
//! - Anything else leaves the device closed.

use bitflags::bitflags;

use efx_core::{
    Error, McdiRpc, NetDevice, Platform, Representors, ResetOutcome, ResetState, ResetType,
    Result,
};
use efx_hal::RegisterIo;
use efx_mcdi::protocol::{entity_reset, write_dword, MC_CMD_ENTITY_RESET};

use crate::nic::{Host, Nic, NicVariant};

bitflags! {
    /// Components named by an ethtool reset request
    ///
    /// The low half names components dedicated to this function, the high
    /// half the same components when shared with other functions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EthResetFlags: u32 {
        /// Management processor
        const MGMT = 1 << 0;
        /// Interrupt requester
        const IRQ = 1 << 1;
        /// DMA engine
        const DMA = 1 << 2;
        /// Filtering and flow direction
        const FILTER = 1 << 3;
        /// Protocol offload
        const OFFLOAD = 1 << 4;
        /// Media access controller
        const MAC = 1 << 5;
        /// Transceiver
        const PHY = 1 << 6;
        /// RAM shared between components
        const RAM = 1 << 7;
        /// Application processor
        const AP = 1 << 8;

        /// Shared MAC and PHY: the whole port
        const PORT = (Self::MAC.bits() | Self::PHY.bits()) << ETH_RESET_SHARED_SHIFT;
    }
}

/// Shift from a dedicated component bit to its shared counterpart
pub const ETH_RESET_SHARED_SHIFT: u32 = 16;

/// Reset type actually used for a recovery `reason`
///
/// Only TX watchdog recovery is done in place; anything else disables the
/// function.
pub fn map_reset_reason(reason: ResetType) -> ResetType {
    match reason {
        ResetType::TxWatchdog => ResetType::TxWatchdog,
        _ => ResetType::Disable,
    }
}

/// Reset type for an ethtool request, consuming the bits it covers
///
/// MC reboots are not supported, so a port reset becomes a full function
/// reset.
pub fn map_reset_flags(flags: &mut u32) -> Result<ResetType> {
    let mut requested = EthResetFlags::from_bits_retain(*flags);

    let reset = if requested.intersects(EthResetFlags::PORT) {
        requested.remove(EthResetFlags::PORT);
        ResetType::All
    } else if requested.contains(EthResetFlags::MGMT) {
        requested.remove(EthResetFlags::MGMT);
        ResetType::Disable
    } else {
        return Err(Error::InvalidParameter);
    };

    *flags = requested.bits();
    Ok(reset)
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> Nic<V, R, H> {
    /// Reset the function
    ///
    /// A failed reset leaves the function disabled.
    pub fn reset(&self, reset_type: ResetType) -> Result<ResetOutcome> {
        log::info!("EF100: resetting ({:?})", reset_type);
        self.set_state(ResetState::Resetting);

        match self.reset_inner(reset_type) {
            Ok(ResetOutcome::Completed) => Ok(ResetOutcome::Completed),
            Ok(ResetOutcome::LeftDown) => {
                self.set_state(if reset_type == ResetType::Disable {
                    ResetState::Disabled
                } else {
                    ResetState::NetDown
                });
                Ok(ResetOutcome::LeftDown)
            }
            Err(e) => {
                log::error!("EF100: reset ({:?}) failed: {}; device disabled", reset_type, e);
                self.set_state(ResetState::Disabled);
                Err(e)
            }
        }
    }

    fn reset_inner(&self, reset_type: ResetType) -> Result<ResetOutcome> {
        self.host.close();

        match reset_type {
            ResetType::TxWatchdog => {
                self.reattach();
                self.set_state(ResetState::NetDown);
                self.net_open()?;
                Ok(ResetOutcome::Completed)
            }
            ResetType::All => {
                self.filter_table_down();
                self.entity_reset()?;

                *self.last_reset.lock() = Some(self.host.now());
                self.reattach();

                self.filter_table_up()?;
                self.net_open()?;
                Ok(ResetOutcome::Completed)
            }
            _ => Ok(ResetOutcome::LeftDown),
        }
    }

    fn reattach(&self) {
        if !V::IS_VF {
            Representors::attach(&*self.host);
        }
        NetDevice::attach(&*self.host);
    }

    fn entity_reset(&self) -> Result<()> {
        let mut inbuf = [0u8; entity_reset::IN_LEN];
        write_dword(
            &mut inbuf,
            entity_reset::IN_FLAG_OFST,
            entity_reset::IN_FUNCTION_RESOURCE_RESET,
        )?;
        self.rpc(MC_CMD_ENTITY_RESET, &inbuf, &mut [])?;
        Ok(())
    }
}
