//! # Register I/O
//!
//! 32-bit register access to the function's memory BAR.
//!
//! Values passed to and returned by [`RegisterIo`] are in CPU byte order.
//! Implementations apply the device's little-endian convention.

use alloc::sync::Arc;
use core::ptr::NonNull;

use efx_core::{Error, Result};

// =============================================================================
// REGISTER ACCESS TRAIT
// =============================================================================

/// Dword register access
pub trait RegisterIo {
    /// Read a 32-bit register
    fn read32(&self, offset: u32) -> u32;

    /// Write a 32-bit register
    fn write32(&self, offset: u32, value: u32);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read32(&self, offset: u32) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: u32, value: u32) {
        (**self).write32(offset, value)
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for Arc<T> {
    fn read32(&self, offset: u32) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: u32, value: u32) {
        (**self).write32(offset, value)
    }
}

// =============================================================================
// MMIO REGION
// =============================================================================

/// A mapped memory BAR
#[derive(Debug)]
pub struct MmioRegion {
    base: NonNull<u32>,
    size: usize,
}

// SAFETY: Accesses are volatile dword reads/writes; the device serialises them
unsafe impl Send for MmioRegion {}
// SAFETY: See above
unsafe impl Sync for MmioRegion {}

impl MmioRegion {
    /// Wrap a mapped BAR
    ///
    /// # Safety
    /// - `virt_addr` must map `size` bytes of device memory for the lifetime
    ///   of the returned region
    pub unsafe fn new(virt_addr: usize, size: usize) -> Result<Self> {
        if size == 0 || virt_addr & 3 != 0 {
            return Err(Error::InvalidParameter);
        }
        let base = NonNull::new(virt_addr as *mut u32).ok_or(Error::InvalidParameter)?;
        Ok(Self { base, size })
    }

    /// Region size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    fn slot(&self, offset: u32) -> Option<*mut u32> {
        let offset = offset as usize;
        if offset & 3 != 0 || offset + 4 > self.size {
            return None;
        }
        // SAFETY: Bounds checked above
        Some(unsafe { self.base.as_ptr().add(offset / 4) })
    }
}

impl RegisterIo for MmioRegion {
    fn read32(&self, offset: u32) -> u32 {
        match self.slot(offset) {
            // SAFETY: In-bounds, aligned, mapped for our lifetime
            Some(ptr) => u32::from_le(unsafe { core::ptr::read_volatile(ptr) }),
            None => {
                log::warn!("MMIO: read outside BAR at {:#x}", offset);
                u32::MAX
            }
        }
    }

    fn write32(&self, offset: u32, value: u32) {
        match self.slot(offset) {
            // SAFETY: In-bounds, aligned, mapped for our lifetime
            Some(ptr) => unsafe { core::ptr::write_volatile(ptr, value.to_le()) },
            None => log::warn!("MMIO: write outside BAR at {:#x}", offset),
        }
    }
}
