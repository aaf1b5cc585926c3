//! # Memory Ordering
//!
//! Explicit barriers between CPU stores to DMA memory and device doorbells,
//! and between device-written flags and the data they guard.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        /// All prior stores to DMA memory are visible before any later
        /// store (typically an MMIO doorbell)
        #[inline(always)]
        pub fn publish() {
            // SAFETY: Barrier instruction, no memory operands
            unsafe {
                core::arch::asm!("dmb oshst", options(nostack, preserves_flags));
            }
        }

        /// Loads after this point observe data at least as new as a flag
        /// read before it
        #[inline(always)]
        pub fn observe() {
            // SAFETY: Barrier instruction, no memory operands
            unsafe {
                core::arch::asm!("dmb oshld", options(nostack, preserves_flags));
            }
        }
    } else if #[cfg(target_arch = "riscv64")] {
        /// All prior stores to DMA memory are visible before any later
        /// store (typically an MMIO doorbell)
        #[inline(always)]
        pub fn publish() {
            // SAFETY: Barrier instruction, no memory operands
            unsafe {
                core::arch::asm!("fence w,o", options(nostack, preserves_flags));
            }
        }

        /// Loads after this point observe data at least as new as a flag
        /// read before it
        #[inline(always)]
        pub fn observe() {
            // SAFETY: Barrier instruction, no memory operands
            unsafe {
                core::arch::asm!("fence ir,r", options(nostack, preserves_flags));
            }
        }
    } else {
        /// All prior stores to DMA memory are visible before any later
        /// store (typically an MMIO doorbell)
        #[inline(always)]
        pub fn publish() {
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        }

        /// Loads after this point observe data at least as new as a flag
        /// read before it
        #[inline(always)]
        pub fn observe() {
            core::sync::atomic::fence(core::sync::atomic::Ordering::Acquire);
        }
    }
}
