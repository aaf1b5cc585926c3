//! # EF100 Network Function
//!
//! Bring-up, reset orchestration and device operations for EF100 PCI
//! functions, built on the MCDI transport and the event-queue dispatcher.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         Nic<V, R, H>                           │
//! │                                                                │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐    │
//! │  │ Design params│   │ Capabilities │   │ Reset / BAR mode │    │
//! │  │  (TLV scan)  │   │ (write once) │   │  state machine   │    │
//! │  └──────┬───────┘   └──────┬───────┘   └────────┬─────────┘    │
//! │         │                  │                    │              │
//! │  ┌──────▼──────────────────▼────────────────────▼───────────┐  │
//! │  │          McdiIface            │      EventDispatcher     │  │
//! │  └──────────────┬────────────────┴─────────────┬────────────┘  │
//! └─────────────────┼──────────────────────────────┼───────────────┘
//!                   ▼                              ▼
//!            MC doorbell / DMA             Event rings / INT_PRIME
//! ```
//!
//! ## Bring-up Flow
//!
//! 1. [`Nic::probe`] reads design parameters, the boot count, firmware
//!    version and capabilities
//! 2. [`Nic::probe_netdev`] registers the net device and, on a PF, claims
//!    the port MAC, m-ports and TC offload
//! 3. The host drives events, statistics and resets through [`NicOps`]
//!
//! The host supplies everything outside the control plane through the
//! traits of `efx-core`, gathered in [`Host`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod bar_config;
pub mod caps;
pub mod design_params;
pub mod filter;
pub mod nic;
pub mod ops;
pub mod reset;
pub mod selftest;
pub mod stats;
pub mod tlv;
pub mod version;

#[cfg(test)]
mod testing;

// Re-exports
pub use design_params::{scan_design_params, DesignParam, DesignParams};
pub use efx_core::{Error, Result};
pub use filter::FilterState;
pub use nic::{Host, Nic, NicVariant, Pf, PfNic, ProbeConfig, Vf, VfNic};
pub use ops::NicOps;
pub use reset::{map_reset_flags, map_reset_reason, EthResetFlags};
pub use selftest::IrqState;
pub use stats::{LinkStats, StatId, StatsReport, EF100_STAT_COUNT};
pub use tlv::{Tlv, TlvReader};
pub use version::{compare_versions, FwVersion};
