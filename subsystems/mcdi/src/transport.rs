//! # MC Transport
//!
//! Shared-buffer request/response channel to the management controller.
//!
//! A request is copied into a message slot, made visible with
//! [`fence::publish`], and announced by writing the slot's bus address to
//! the two doorbell registers (high word to `MC_DB_LWRD`, low word to
//! `MC_DB_HWRD`; firmware swaps them). Firmware writes the response into
//! the same slot and sets `MCDI_HEADER_RESPONSE`.
//!
//! Every step of a request/response cycle goes through a
//! [`TransportGuard`], which holds the transport lock for its lifetime.

use core::sync::atomic::{AtomicBool, Ordering};

use spin::{Mutex, MutexGuard};

use efx_core::{DmaAddr, Error, Result, Timestamp};
use efx_hal::dma::{DmaAllocator, DmaBuffer};
use efx_hal::{fence, regs, RegisterIo};

use crate::pool::{SlotId, SlotPool, SlotStats, EF100_NUM_MCDI_BUFFERS};
use crate::protocol::{MCDI_BUF_ALIGN, MCDI_BUF_LEN, MCDI_BUF_STRIDE, MCDI_HEADER_RESPONSE};

// =============================================================================
// STATE
// =============================================================================

/// Result of a reboot check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootStatus {
    /// Boot counter unchanged, or unreadable right now
    NoChange,
    /// Firmware restarted since the last observation
    Rebooted,
}

/// State protected by the transport lock
#[derive(Debug)]
pub struct TransportState {
    pool: SlotPool,
    warm_boot_count: u16,
    last_reset: Option<Timestamp>,
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// MCDI transport over a function BAR
#[derive(Debug)]
pub struct McdiTransport<R: RegisterIo> {
    regs: R,
    buffer: DmaBuffer,
    state: Mutex<TransportState>,
    hw_unavailable: AtomicBool,
}

impl<R: RegisterIo> McdiTransport<R> {
    /// Allocate the message buffers
    pub fn new(regs: R, dma: &dyn DmaAllocator) -> Result<Self> {
        let buffer = dma.alloc(EF100_NUM_MCDI_BUFFERS * MCDI_BUF_STRIDE, MCDI_BUF_ALIGN)?;
        if !buffer.bus_addr().is_aligned(MCDI_BUF_ALIGN as u64) {
            log::error!("MCDI: message buffer {:?} misaligned", buffer.bus_addr());
            return Err(Error::InvalidParameter);
        }
        Ok(Self {
            regs,
            buffer,
            state: Mutex::new(TransportState {
                pool: SlotPool::new(),
                warm_boot_count: 0,
                last_reset: None,
            }),
            hw_unavailable: AtomicBool::new(false),
        })
    }

    /// Register access
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Shared message buffer
    pub fn buffer(&self) -> &DmaBuffer {
        &self.buffer
    }

    /// Take the transport lock
    pub fn lock(&self) -> TransportGuard<'_, R> {
        TransportGuard {
            transport: self,
            state: self.state.lock(),
        }
    }

    /// Try to take the transport lock without spinning
    pub fn try_lock(&self) -> Option<TransportGuard<'_, R>> {
        self.state.try_lock().map(|state| TransportGuard {
            transport: self,
            state,
        })
    }

    /// Read the firmware warm boot counter
    ///
    /// All-ones means the device is not answering (typically mid-reboot);
    /// the condition is latched in [`Self::is_hardware_unavailable`] until
    /// the next good read.
    pub fn warm_boot_count(&self) -> Result<u16> {
        let status = self.regs.read32(regs::ER_GZ_MC_SFT_STATUS);
        if status == u32::MAX {
            if !self.hw_unavailable.swap(true, Ordering::AcqRel) {
                log::error!("MCDI: Hardware unavailable");
            }
            return Err(Error::HardwareUnavailable);
        }
        self.hw_unavailable.store(false, Ordering::Release);
        if regs::ERF_GZ_BOOT_MAGIC.get32(status) != regs::BOOT_MAGIC {
            return Err(Error::Io);
        }
        Ok(regs::ERF_GZ_WARM_BOOT_COUNT.get32(status) as u16)
    }

    /// Last status read returned all-ones
    pub fn is_hardware_unavailable(&self) -> bool {
        self.hw_unavailable.load(Ordering::Acquire)
    }

    /// Ask firmware to drop any request left by a previous user of this
    /// function, using the low bits of the doorbell
    pub fn cancel_outstanding(&self) {
        self.regs.write32(regs::ER_GZ_MC_DB_HWRD, 1);
    }

    /// Bus address of a slot
    pub fn slot_addr(&self, slot: SlotId) -> DmaAddr {
        self.buffer.bus_addr().offset(slot.offset() as u64)
    }
}

// =============================================================================
// LOCKED OPERATIONS
// =============================================================================

/// Exclusive access to the transport for one request/response cycle
pub struct TransportGuard<'a, R: RegisterIo> {
    transport: &'a McdiTransport<R>,
    state: MutexGuard<'a, TransportState>,
}

impl<R: RegisterIo> TransportGuard<'_, R> {
    /// Take a free message slot
    pub fn acquire_slot(&mut self) -> Result<SlotId> {
        self.state.pool.acquire()
    }

    /// Return a message slot
    pub fn release_slot(&mut self, slot: SlotId) {
        self.state.pool.release(slot)
    }

    /// Copy `header` and `payload` into `slot` and ring the doorbell
    pub fn send_request(&mut self, slot: SlotId, header: &[u8], payload: &[u8]) -> Result<()> {
        if header.len() + payload.len() > MCDI_BUF_LEN {
            return Err(Error::BufferOverflow);
        }
        let buffer = &self.transport.buffer;
        buffer.write_bytes(slot.offset(), header)?;
        buffer.write_bytes(slot.offset() + header.len(), payload)?;
        fence::publish();

        let addr = self.transport.slot_addr(slot);
        let regs = &self.transport.regs;
        regs.write32(regs::ER_GZ_MC_DB_LWRD, addr.hi());
        regs.write32(regs::ER_GZ_MC_DB_HWRD, addr.lo());
        Ok(())
    }

    /// Firmware has written a response into `slot`
    pub fn poll_response(&self, slot: SlotId) -> bool {
        let hdr = match self.transport.buffer.read_u32(slot.offset()) {
            Ok(hdr) => hdr,
            Err(e) => {
                log::error!("MCDI: cannot read message slot {}: {}", slot.index(), e);
                return false;
            }
        };
        fence::observe();
        MCDI_HEADER_RESPONSE.get32(hdr) != 0
    }

    /// Copy `dst.len()` bytes starting at `offset` out of `slot`
    pub fn read_response(&self, slot: SlotId, offset: usize, dst: &mut [u8]) -> Result<()> {
        if offset + dst.len() > MCDI_BUF_LEN {
            return Err(Error::BufferOverflow);
        }
        self.transport.buffer.read_bytes(slot.offset() + offset, dst)
    }

    /// Compare the firmware boot counter with the last one seen
    pub fn detect_reboot(&mut self) -> Result<RebootStatus> {
        match self.transport.warm_boot_count() {
            // Counter cannot be trusted while the MC is restarting
            Err(Error::HardwareUnavailable) => Ok(RebootStatus::NoChange),
            Err(e) => Err(e),
            Ok(count) if count == self.state.warm_boot_count => Ok(RebootStatus::NoChange),
            Ok(count) => {
                log::warn!(
                    "MCDI: firmware rebooted (boot count {} -> {})",
                    self.state.warm_boot_count,
                    count
                );
                self.state.warm_boot_count = count;
                Ok(RebootStatus::Rebooted)
            }
        }
    }

    /// Record the time a reboot was handled
    pub fn reboot_detected(&mut self, now: Timestamp) {
        self.state.last_reset = Some(now);
    }

    /// Seed the boot counter during probe
    pub fn set_warm_boot_count(&mut self, count: u16) {
        self.state.warm_boot_count = count;
    }

    /// Last observed boot counter
    pub fn warm_boot_count(&self) -> u16 {
        self.state.warm_boot_count
    }

    /// Time of the last handled reboot
    pub fn last_reset(&self) -> Option<Timestamp> {
        self.state.last_reset
    }

    /// Slot pool statistics
    pub fn slot_stats(&self) -> SlotStats {
        self.state.pool.stats()
    }
}

impl<R: RegisterIo> core::fmt::Debug for TransportGuard<'_, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransportGuard")
            .field("state", &*self.state)
            .finish()
    }
}
