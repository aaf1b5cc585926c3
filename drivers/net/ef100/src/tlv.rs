//! # TLV Stream Decoder
//!
//! Byte-at-a-time decoder for the type-length-value records the device
//! exposes through its design-parameter window.
//!
//! ## Record Format
//!
//! ```text
//! ┌──────────────────────┬──────────┬─────────────────────────┐
//! │ type (1 or 2 bytes)  │ len (1)  │ value (len bytes, LE)   │
//! │ bit 7 set: continued │ <= 8     │                         │
//! └──────────────────────┴──────────┴─────────────────────────┘
//! ```

use efx_core::{Error, Result};

/// Widest value the decoder accumulates
pub const TLV_MAX_VALUE_LEN: u8 = core::mem::size_of::<u64>() as u8;

// =============================================================================
// STATE
// =============================================================================

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlvState {
    /// Expecting the first type byte
    #[default]
    Type,
    /// Expecting the second type byte
    TypeCont,
    /// Expecting the length byte
    Length,
    /// Accumulating value bytes
    Value,
}

/// A decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv {
    /// Record type
    pub ty: u16,
    /// Declared value length
    pub len: u8,
    /// Value, little-endian accumulated
    pub value: u64,
}

// =============================================================================
// READER
// =============================================================================

/// Streaming TLV decoder
#[derive(Debug, Clone, Default)]
pub struct TlvReader {
    state: TlvState,
    ty: u16,
    len: u8,
    value: u64,
    value_offset: u32,
}

impl TlvReader {
    /// Fresh decoder
    pub const fn new() -> Self {
        Self {
            state: TlvState::Type,
            ty: 0,
            len: 0,
            value: 0,
            value_offset: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> TlvState {
        self.state
    }

    /// Consume one byte
    ///
    /// Returns the record completed by this byte, if any.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Tlv>> {
        match self.state {
            TlvState::Type => {
                self.ty = (byte & 0x7f) as u16;
                self.state = if byte & 0x80 != 0 {
                    TlvState::TypeCont
                } else {
                    TlvState::Length
                };
                self.value = 0;
                self.value_offset = 0;
                Ok(None)
            }
            TlvState::TypeCont => {
                self.ty |= (byte as u16) << 7;
                self.state = TlvState::Length;
                Ok(None)
            }
            TlvState::Length => {
                self.len = byte;
                if self.len > TLV_MAX_VALUE_LEN {
                    return Err(Error::Unsupported);
                }
                if self.len == 0 {
                    self.state = TlvState::Type;
                    return Ok(Some(self.current()));
                }
                self.state = TlvState::Value;
                Ok(None)
            }
            TlvState::Value => {
                self.value |= (byte as u64) << (self.value_offset * 8);
                self.value_offset += 1;
                if self.value_offset >= self.len as u32 {
                    self.state = TlvState::Type;
                    return Ok(Some(self.current()));
                }
                Ok(None)
            }
        }
    }

    fn current(&self) -> Tlv {
        Tlv {
            ty: self.ty,
            len: self.len,
            value: self.value,
        }
    }
}
