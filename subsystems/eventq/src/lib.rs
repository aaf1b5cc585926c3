//! # EFX Event Queues
//!
//! Consumer side of the EF100 event rings.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Event Dispatch                         │
//! │                                                              │
//! │  ┌─────────────┐  phase == expected?  ┌──────────────────┐   │
//! │  │ Event ring  │ ───────────────────▶ │ EventDispatcher  │   │
//! │  │ (8B entries)│                      │  (quota bounded) │   │
//! │  └─────────────┘                      └────────┬─────────┘   │
//! │        ▲                                       │             │
//! │        │ INT_PRIME (id, idx)     ┌─────────────┼──────────┐  │
//! │        │                         ▼             ▼          ▼  │
//! │   ┌────┴─────┐              ┌────────┐   ┌────────┐ ┌──────┐ │
//! │   │  Device  │              │   RX   │   │   TX   │ │ MCDI │ │
//! │   └──────────┘              └────────┘   └────────┘ └──────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Processing Flow
//!
//! 1. Read the entry at the masked read cursor
//! 2. Stop at the first entry whose phase is not the expected one
//! 3. Dispatch by type, charging RX and MCDI work against the quota
//! 4. Flip the expected phase on every wrap of the cursor
//! 5. Commit the cursor and phase, then prime the queue

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod channel;
pub mod dispatcher;
pub mod event;
pub mod phase;

// Re-exports
pub use channel::{Channel, ChannelStats, EventRing};
pub use dispatcher::{EventDispatcher, EventHandler, PollConfig};
pub use efx_core::{Error, Result};
pub use event::{Event, EventType};
pub use phase::PhaseBits;
