//! # Message Slot Pool
//!
//! Fixed set of shared message buffers. Serialisation is provided by the
//! transport lock, so the pool itself is plain data.

use efx_core::{Error, Result};

use crate::protocol::MCDI_BUF_STRIDE;

/// Number of message slots per function
pub const EF100_NUM_MCDI_BUFFERS: usize = 1;

static_assertions::const_assert!(EF100_NUM_MCDI_BUFFERS <= 32);

// =============================================================================
// SLOT ID
// =============================================================================

/// Index of an acquired message slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(u8);

impl SlotId {
    #[cfg(test)]
    pub(crate) const fn from_index(index: u8) -> Self {
        Self(index)
    }

    /// Slot index
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Byte offset of the slot in the shared buffer
    pub const fn offset(self) -> usize {
        self.0 as usize * MCDI_BUF_STRIDE
    }
}

// =============================================================================
// POOL
// =============================================================================

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// Successful acquisitions
    pub acquires: u64,
    /// Releases
    pub releases: u64,
    /// Acquisitions refused because every slot was taken
    pub busy: u64,
    /// Releases of slots that were not held
    pub bad_releases: u64,
}

/// In-use bitmap over [`EF100_NUM_MCDI_BUFFERS`] slots
#[derive(Debug, Default)]
pub struct SlotPool {
    in_use: u32,
    stats: SlotStats,
}

impl SlotPool {
    /// All slots free
    pub const fn new() -> Self {
        Self {
            in_use: 0,
            stats: SlotStats {
                acquires: 0,
                releases: 0,
                busy: 0,
                bad_releases: 0,
            },
        }
    }

    /// Take the lowest free slot
    pub fn acquire(&mut self) -> Result<SlotId> {
        let bit = (!self.in_use).trailing_zeros() as usize;
        if bit >= EF100_NUM_MCDI_BUFFERS {
            self.stats.busy += 1;
            return Err(Error::Busy);
        }
        self.in_use |= 1 << bit;
        self.stats.acquires += 1;
        Ok(SlotId(bit as u8))
    }

    /// Return a slot
    ///
    /// Releasing a slot that is not held is a programming error. It is
    /// reported and otherwise ignored.
    pub fn release(&mut self, slot: SlotId) {
        if slot.index() >= EF100_NUM_MCDI_BUFFERS || self.in_use & (1 << slot.index()) == 0 {
            log::error!("MCDI: release of unused message slot {}", slot.index());
            self.stats.bad_releases += 1;
            return;
        }
        self.in_use &= !(1 << slot.index());
        self.stats.releases += 1;
    }

    /// Slot currently held
    pub fn is_held(&self, slot: SlotId) -> bool {
        slot.index() < EF100_NUM_MCDI_BUFFERS && self.in_use & (1 << slot.index()) != 0
    }

    /// Statistics
    pub fn stats(&self) -> SlotStats {
        self.stats
    }
}
