//! # EFX Core
//!
//! Foundational types for the EF100 control plane.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          efx-core                            │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌─────────┐ │
//! │  │   Error    │  │   Types    │  │    Caps    │  │ Traits  │ │
//! │  │            │  │ (DmaAddr,  │  │ (Flags1/2, │  │ (host   │ │
//! │  │            │  │  states)   │  │  limits)   │  │  iface) │ │
//! │  └────────────┘  └────────────┘  └────────────┘  └─────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod caps;
pub mod error;
pub mod traits;
pub mod types;

pub use caps::{CapabilityCell, CapabilityState, CapsWord, Flags1, Flags2, TsoLimits};
pub use error::{Error, McdiErrorCode, Result};
pub use traits::*;
pub use types::*;

// Reported layouts are fixed by the hardware
static_assertions::const_assert_eq!(core::mem::size_of::<DmaAddr>(), 8);
static_assertions::const_assert_eq!(core::mem::size_of::<MacAddress>(), 6);
