//! # Phase Bits
//!
//! One expected-phase bit per channel, shared between the context draining
//! a channel and the context (re)initialising it.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use efx_core::ChannelId;

const BITS_PER_WORD: usize = 64;

/// Atomic bitset indexed by channel
#[derive(Debug)]
pub struct PhaseBits {
    words: Vec<AtomicU64>,
    channels: usize,
}

impl PhaseBits {
    /// All bits clear for `channels` channels
    pub fn new(channels: usize) -> Self {
        let words = (channels + BITS_PER_WORD - 1) / BITS_PER_WORD;
        Self {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
            channels,
        }
    }

    /// Number of channels covered
    pub fn channels(&self) -> usize {
        self.channels
    }

    fn locate(&self, id: ChannelId) -> Option<(&AtomicU64, u64)> {
        let index = id.index();
        if index >= self.channels {
            log::error!("EVQ: channel {} has no phase bit", index);
            return None;
        }
        Some((&self.words[index / BITS_PER_WORD], 1 << (index % BITS_PER_WORD)))
    }

    /// Current expected phase
    pub fn test(&self, id: ChannelId) -> bool {
        self.locate(id)
            .map(|(word, bit)| word.load(Ordering::Acquire) & bit != 0)
            .unwrap_or(false)
    }

    /// Reset to phase 0
    pub fn clear(&self, id: ChannelId) {
        if let Some((word, bit)) = self.locate(id) {
            word.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// Flip the expected phase
    pub fn toggle(&self, id: ChannelId) {
        if let Some((word, bit)) = self.locate(id) {
            word.fetch_xor(bit, Ordering::AcqRel);
        }
    }
}
