//! # EFX Hardware Abstraction Layer
//!
//! Low-level access to the EF100 function: BAR registers, memory barriers
//! and DMA-coherent buffers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       efx-hal                           │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌─────────┐  │
//! │  │    io    │  │  fence   │  │   dma    │  │  regs   │  │
//! │  │ (BAR r/w)│  │(publish/ │  │ (shared  │  │ (offsets│  │
//! │  │          │  │ observe) │  │ buffers) │  │ fields) │  │
//! │  └──────────┘  └──────────┘  └──────────┘  └─────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod dma;
pub mod fence;
pub mod field;
pub mod io;
pub mod regs;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use dma::{DmaAllocator, DmaBuffer, HeapDmaAllocator};
pub use field::BitField;
pub use io::{MmioRegion, RegisterIo};
