//! # Interrupt and Event Self-Test
//!
//! Firmware-generated test interrupts and events, and the MSI handler
//! that notices them.

use core::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use efx_core::{ChannelId, EventQueueOps, McdiRpc, Platform, Result};
use efx_eventq::Event;
use efx_mcdi::protocol::{
    driver_event, trigger_interrupt, write_dword, MC_CMD_DRIVER_EVENT, MC_CMD_TRIGGER_INTERRUPT,
};

/// Payload of a self-test driver event
pub const EFX_EF100_TEST: u64 = 1;

/// Ask firmware to raise interrupt `irq_level`
pub fn irq_test_generate<M: McdiRpc + ?Sized>(mcdi: &M, irq_level: u32) -> Result<()> {
    let mut inbuf = [0u8; trigger_interrupt::IN_LEN];
    write_dword(&mut inbuf, trigger_interrupt::IN_INTR_LEVEL_OFST, irq_level)?;
    mcdi.rpc_quiet(MC_CMD_TRIGGER_INTERRUPT, &inbuf, &mut [])?;
    Ok(())
}

/// Ask firmware to post a test driver event to `channel`
///
/// Failures are logged; a device that is mid-reboot is not reported.
pub fn ev_test_generate<M: McdiRpc + ?Sized>(mcdi: &M, channel: ChannelId) {
    let mut inbuf = [0u8; driver_event::IN_LEN];
    inbuf[driver_event::IN_DATA_OFST..driver_event::IN_DATA_OFST + 8]
        .copy_from_slice(&Event::driver(EFX_EF100_TEST).0.to_le_bytes());

    let result = write_dword(&mut inbuf, driver_event::IN_EVQ_OFST, channel.0 as u32)
        .and_then(|_| mcdi.rpc(MC_CMD_DRIVER_EVENT, &inbuf, &mut []));
    match result {
        Ok(_) => {}
        Err(e) if e.is_hardware_unavailable() => {}
        Err(e) => log::error!("EF100: ev_test_generate failed: {}", e),
    }
}

// =============================================================================
// MSI
// =============================================================================

/// Interrupt bookkeeping shared between the IRQ handler and the self-test
#[derive(Debug)]
pub struct IrqState {
    level: u32,
    soft_enabled: AtomicBool,
    last_irq_cpu: AtomicI64,
}

impl IrqState {
    /// Nothing recorded yet
    pub const NO_CPU: i64 = -1;

    /// Interrupt state using `level` for test interrupts
    pub const fn new(level: u32) -> Self {
        Self {
            level,
            soft_enabled: AtomicBool::new(false),
            last_irq_cpu: AtomicI64::new(Self::NO_CPU),
        }
    }

    /// Test interrupt level
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Allow or suppress interrupt processing
    pub fn set_soft_enabled(&self, enabled: bool) {
        self.soft_enabled.store(enabled, Ordering::Release);
    }

    /// CPU that took the last test interrupt
    pub fn last_irq_cpu(&self) -> Option<u32> {
        match self.last_irq_cpu.load(Ordering::Acquire) {
            Self::NO_CPU => None,
            cpu => Some(cpu as u32),
        }
    }

    /// Forget the last test interrupt
    pub fn clear_last_irq_cpu(&self) {
        self.last_irq_cpu.store(Self::NO_CPU, Ordering::Release);
    }

    /// Handle MSI vector `index`; always reports the interrupt as handled
    pub fn msi_interrupt<H>(&self, index: u32, host: &H) -> bool
    where
        H: Platform + EventQueueOps + ?Sized,
    {
        log::trace!("EF100: MSI interrupt {}", index);
        if self.soft_enabled.load(Ordering::Acquire) {
            if index == self.level {
                self.last_irq_cpu
                    .store(host.current_cpu() as i64, Ordering::Release);
            }
            host.schedule_channel(ChannelId(index as u16));
        }
        true
    }
}
