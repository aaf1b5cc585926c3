//! # DMA Buffers
//!
//! Device-visible memory shared with firmware and the event-queue hardware.
//!
//! A [`DmaBuffer`] is a cheap, clonable handle. All accesses are volatile
//! and bounds-checked; ordering against the device is the caller's job
//! (see [`crate::fence`]).

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use alloc::sync::Arc;
use core::fmt;
use core::ptr::NonNull;

use efx_core::{DmaAddr, Error, Result};

// =============================================================================
// BUFFER
// =============================================================================

enum Backing {
    /// Allocated by [`HeapDmaAllocator`], freed on drop
    Heap(Layout),
    /// Owned by the host allocator
    Foreign,
}

struct DmaInner {
    virt: NonNull<u8>,
    bus: DmaAddr,
    len: usize,
    backing: Backing,
}

// SAFETY: Contents are only touched through volatile accesses
unsafe impl Send for DmaInner {}
// SAFETY: See above
unsafe impl Sync for DmaInner {}

impl Drop for DmaInner {
    fn drop(&mut self) {
        if let Backing::Heap(layout) = self.backing {
            // SAFETY: Allocated with this layout in HeapDmaAllocator::alloc
            unsafe { dealloc(self.virt.as_ptr(), layout) }
        }
    }
}

/// Handle to a DMA-coherent buffer
#[derive(Clone)]
pub struct DmaBuffer {
    inner: Arc<DmaInner>,
}

impl DmaBuffer {
    /// Wrap memory provided by the host
    ///
    /// # Safety
    /// - `virt` must be valid for reads and writes of `len` bytes for as
    ///   long as any clone of the handle exists
    /// - `virt` must be at least 8-byte aligned
    /// - `bus` must be the device's view of `virt`
    pub unsafe fn from_raw(virt: NonNull<u8>, bus: DmaAddr, len: usize) -> Self {
        Self {
            inner: Arc::new(DmaInner {
                virt,
                bus,
                len,
                backing: Backing::Foreign,
            }),
        }
    }

    /// Device address of byte 0
    pub fn bus_addr(&self) -> DmaAddr {
        self.inner.bus
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Zero-length buffer
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    fn check(&self, offset: usize, len: usize, align: usize) -> Result<*mut u8> {
        let end = offset.checked_add(len).ok_or(Error::BufferOverflow)?;
        if end > self.inner.len {
            return Err(Error::BufferOverflow);
        }
        if offset % align != 0 {
            return Err(Error::InvalidParameter);
        }
        // SAFETY: offset + len within the allocation
        Ok(unsafe { self.inner.virt.as_ptr().add(offset) })
    }

    /// Read a little-endian dword
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let ptr = self.check(offset, 4, 4)? as *const u32;
        // SAFETY: In bounds and aligned
        Ok(u32::from_le(unsafe { core::ptr::read_volatile(ptr) }))
    }

    /// Write a little-endian dword
    pub fn write_u32(&self, offset: usize, value: u32) -> Result<()> {
        let ptr = self.check(offset, 4, 4)? as *mut u32;
        // SAFETY: In bounds and aligned
        unsafe { core::ptr::write_volatile(ptr, value.to_le()) };
        Ok(())
    }

    /// Read a little-endian qword
    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        let ptr = self.check(offset, 8, 8)? as *const u64;
        // SAFETY: In bounds and aligned
        Ok(u64::from_le(unsafe { core::ptr::read_volatile(ptr) }))
    }

    /// Write a little-endian qword
    pub fn write_u64(&self, offset: usize, value: u64) -> Result<()> {
        let ptr = self.check(offset, 8, 8)? as *mut u64;
        // SAFETY: In bounds and aligned
        unsafe { core::ptr::write_volatile(ptr, value.to_le()) };
        Ok(())
    }

    /// Copy `src` into the buffer at `offset`
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<()> {
        let ptr = self.check(offset, src.len(), 1)?;
        for (i, byte) in src.iter().enumerate() {
            // SAFETY: In bounds
            unsafe { core::ptr::write_volatile(ptr.add(i), *byte) };
        }
        Ok(())
    }

    /// Copy bytes at `offset` into `dst`
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let ptr = self.check(offset, dst.len(), 1)?;
        for (i, byte) in dst.iter_mut().enumerate() {
            // SAFETY: In bounds
            *byte = unsafe { core::ptr::read_volatile(ptr.add(i)) };
        }
        Ok(())
    }

    /// Set every byte of the buffer to `byte`
    pub fn fill(&self, byte: u8) {
        let ptr = self.inner.virt.as_ptr();
        for i in 0..self.inner.len {
            // SAFETY: In bounds
            unsafe { core::ptr::write_volatile(ptr.add(i), byte) };
        }
    }

    /// Zero the whole buffer
    pub fn clear(&self) {
        self.fill(0);
    }
}

impl fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("bus", &self.inner.bus)
            .field("len", &self.inner.len)
            .finish()
    }
}

// =============================================================================
// ALLOCATORS
// =============================================================================

/// Source of DMA-coherent memory
pub trait DmaAllocator {
    /// Allocate `len` zeroed bytes aligned to `align`
    fn alloc(&self, len: usize, align: usize) -> Result<DmaBuffer>;
}

/// Identity-mapped heap allocator for hosts without an IOMMU
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapDmaAllocator;

impl DmaAllocator for HeapDmaAllocator {
    fn alloc(&self, len: usize, align: usize) -> Result<DmaBuffer> {
        if len == 0 {
            return Err(Error::InvalidParameter);
        }
        let layout = Layout::from_size_align(len, align.max(8)).map_err(|_| Error::InvalidParameter)?;
        // SAFETY: Non-zero size
        let ptr = unsafe { alloc_zeroed(layout) };
        let virt = NonNull::new(ptr).ok_or(Error::OutOfMemory)?;
        Ok(DmaBuffer {
            inner: Arc::new(DmaInner {
                virt,
                bus: DmaAddr::new(ptr as u64),
                len,
                backing: Backing::Heap(layout),
            }),
        })
    }
}
