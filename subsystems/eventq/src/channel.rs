//! # Event Channels
//!
//! An event ring in DMA memory plus the cursor of the context draining it.

use core::sync::atomic::{AtomicBool, Ordering};

use efx_core::{ChannelId, DmaAddr, Error, Result};
use efx_hal::{DmaAllocator, DmaBuffer};

use crate::event::{Event, EVENT_SIZE};

/// Ring buffer alignment
pub const EVQ_BUF_ALIGN: usize = 4096;

// =============================================================================
// EVENT RING
// =============================================================================

/// Circular ring of event entries
///
/// The buffer holds one entry beyond the power-of-two ring for the
/// status-completion marker written by the queue manager.
#[derive(Debug, Clone)]
pub struct EventRing {
    buffer: DmaBuffer,
    mask: u32,
}

impl EventRing {
    /// Allocate a ring of `entries` events
    pub fn probe(dma: &dyn DmaAllocator, entries: u32) -> Result<Self> {
        if entries < 2 || !entries.is_power_of_two() {
            return Err(Error::InvalidParameter);
        }
        let mask = entries - 1;
        let buffer = dma.alloc((mask as usize + 2) * EVENT_SIZE, EVQ_BUF_ALIGN)?;
        Self::init_entries(&buffer);
        Ok(Self { buffer, mask })
    }

    /// Mark every entry as not yet written in lap 0
    fn init_entries(buffer: &DmaBuffer) {
        buffer.fill(0xff);
    }

    /// Return the ring to its initial contents
    pub fn reset(&self) {
        Self::init_entries(&self.buffer);
    }

    /// Ring entries (power of two)
    pub fn entries(&self) -> u32 {
        self.mask + 1
    }

    /// Index mask
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Bus address handed to the device
    pub fn bus_addr(&self) -> DmaAddr {
        self.buffer.bus_addr()
    }

    /// Backing buffer
    pub fn buffer(&self) -> &DmaBuffer {
        &self.buffer
    }

    /// Entry at `index` (masked)
    pub fn read(&self, index: u32) -> Result<Event> {
        let offset = (index & self.mask) as usize * EVENT_SIZE;
        self.buffer.read_u64(offset).map(Event)
    }

    /// Store an entry at `index` (masked), as the device would
    pub fn write(&self, index: u32, event: Event) -> Result<()> {
        let offset = (index & self.mask) as usize * EVENT_SIZE;
        self.buffer.write_u64(offset, event.0)
    }
}

// =============================================================================
// CHANNEL
// =============================================================================

/// Per-channel event counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// RX events
    pub rx: u64,
    /// TX completion events
    pub tx: u64,
    /// MCDI events
    pub mcdi: u64,
    /// Driver-generated events
    pub driver: u64,
    /// Events nobody claimed
    pub unhandled: u64,
    /// Ring laps completed
    pub wraps: u64,
}

/// One event queue and its read cursor
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    /// Monotonic cursor, masked on use
    read_ptr: u32,
    ring: EventRing,
    enabled: AtomicBool,
    stats: ChannelStats,
}

impl Channel {
    /// Wrap an allocated ring; the channel starts disabled
    pub fn new(id: ChannelId, ring: EventRing) -> Self {
        Self {
            id,
            read_ptr: 0,
            ring,
            enabled: AtomicBool::new(false),
            stats: ChannelStats::default(),
        }
    }

    /// Allocate the ring for channel `id`
    pub fn probe(id: ChannelId, entries: u32, dma: &dyn DmaAllocator) -> Result<Self> {
        let ring = EventRing::probe(dma, entries)?;
        log::debug!("EVQ: channel {} ring of {} entries at {:?}", id.index(), entries, ring.bus_addr());
        Ok(Self::new(id, ring))
    }

    /// Channel id
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Unmasked read cursor
    pub fn read_ptr(&self) -> u32 {
        self.read_ptr
    }

    /// Read cursor masked to the ring
    pub fn masked_read_ptr(&self) -> u32 {
        self.read_ptr & self.ring.mask()
    }

    pub(crate) fn set_read_ptr(&mut self, read_ptr: u32) {
        self.read_ptr = read_ptr;
    }

    /// Event ring
    pub fn ring(&self) -> &EventRing {
        &self.ring
    }

    /// Allow processing
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop processing; safe from any context
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Processing allowed
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Counters
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ChannelStats {
        &mut self.stats
    }
}
