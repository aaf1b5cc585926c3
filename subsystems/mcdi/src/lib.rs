//! # EFX MCDI Transport
//!
//! Management-controller command interface for EF100 functions.
//!
//! ## Architecture
//!
//! The driver and the management controller (MC) share one DMA-visible
//! message buffer. A request is written into a slot, the slot's bus address
//! is rung on the doorbell registers, and the MC writes its response back
//! over the request.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MCDI Exchange                         │
//! │                                                              │
//! │  ┌────────────────┐   doorbell (HI, LO)   ┌───────────────┐  │
//! │  │  McdiIface     │ ────────────────────▶ │  Management   │  │
//! │  │  (poll, seq)   │                       │  Controller   │  │
//! │  └───────┬────────┘                       └───────┬───────┘  │
//! │          │                                        │          │
//! │  ┌───────▼────────────────────────────────────────▼───────┐  │
//! │  │            Shared message buffer (1 slot)              │  │
//! │  │   ┌──────────┬───────────────────────────────────────┐ │  │
//! │  │   │ v2 hdr 8 │  payload (up to 0x400 bytes)          │ │  │
//! │  │   └──────────┴───────────────────────────────────────┘ │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Message Flow
//!
//! 1. Acquire a slot under the transport lock
//! 2. Write header and payload, then ring the doorbell
//! 3. Poll the response bit, watching the warm-boot counter
//! 4. Decode the response header and copy out the payload
//! 5. Release the slot

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(test)]
extern crate alloc;

pub mod iface;
pub mod pool;
pub mod protocol;
pub mod transport;

// Re-exports
pub use efx_core::{Error, Result};
pub use iface::{McdiConfig, McdiIface};
pub use pool::{SlotId, SlotPool, SlotStats, EF100_NUM_MCDI_BUFFERS};
pub use protocol::{RequestHeader, ResponseHeader, TimeoutClass};
pub use transport::{McdiTransport, RebootStatus, TransportGuard};
