//! # Bit Fields
//!
//! Little-endian bit-field descriptors used by register values, event
//! entries and MCDI headers.

// =============================================================================
// BIT FIELD
// =============================================================================

/// A field `width` bits wide starting at bit `lbn`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    /// Lowest bit number
    pub lbn: u32,
    /// Width in bits
    pub width: u32,
}

impl BitField {
    /// Describe a field
    pub const fn new(lbn: u32, width: u32) -> Self {
        Self { lbn, width }
    }

    /// Single-bit field
    pub const fn bit(lbn: u32) -> Self {
        Self { lbn, width: 1 }
    }

    /// Unshifted mask
    #[inline]
    pub const fn mask(self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Extract from a 64-bit word
    #[inline]
    pub const fn get(self, word: u64) -> u64 {
        (word >> self.lbn) & self.mask()
    }

    /// Insert into a 64-bit word
    #[inline]
    pub const fn set(self, word: u64, value: u64) -> u64 {
        let mask = self.mask() << self.lbn;
        (word & !mask) | ((value << self.lbn) & mask)
    }

    /// Extract from a 32-bit word
    #[inline]
    pub const fn get32(self, word: u32) -> u32 {
        self.get(word as u64) as u32
    }

    /// Insert into a 32-bit word
    #[inline]
    pub const fn set32(self, word: u32, value: u32) -> u32 {
        self.set(word as u64, value as u64) as u32
    }

    /// Test a single-bit field
    #[inline]
    pub const fn is_set(self, word: u64) -> bool {
        self.get(word) != 0
    }
}
