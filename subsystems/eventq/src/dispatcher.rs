//! # Event Dispatcher
//!
//! Drains event rings under a work quota and routes each event to the
//! RX, TX or MCDI paths.
//!
//! ## Phase
//!
//! Each channel expects a phase of 0 on its first lap around the ring.
//! The device writes every entry with the phase of the lap it is on, so an
//! entry whose phase differs from the expected one has not been written yet.
//! The expected phase flips each time the read cursor wraps to zero.

use efx_core::{ChannelId, EventQueueOps, InterruptMode, Result};
use efx_hal::{regs, RegisterIo};

use crate::channel::Channel;
use crate::event::{Event, EventType};
use crate::phase::PhaseBits;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Event polling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interrupt mode of the function
    pub mode: InterruptMode,
    /// Re-arm interval, in entries, while busy-polling
    pub busy_poll_ack_interval: u32,
    /// Report the full quota from a busy-poll pass
    pub busy_poll_force_quota: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            mode: InterruptMode::default(),
            busy_poll_ack_interval: 512,
            busy_poll_force_quota: true,
        }
    }
}

impl PollConfig {
    fn busy_polling(&self) -> bool {
        self.mode == InterruptMode::Polled
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Consumers of dispatched events
pub trait EventHandler {
    /// Received packets
    fn rx_event(&self, channel: ChannelId, event: Event);

    /// Transmit completion
    fn tx_event(&self, channel: ChannelId, event: Event);

    /// Offer an MCDI event to the request path; `true` when claimed
    fn mcdi_event(&self, channel: ChannelId, event: Event) -> bool;

    /// Offer an unclaimed MCDI event to the port handler
    ///
    /// Returns `None` when not claimed, otherwise the work done (negative on
    /// error). At most `quota` units may be spent.
    fn port_event(&self, channel: ChannelId, event: Event, quota: u32) -> Option<i32> {
        let _ = (channel, event, quota);
        None
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

/// Event-queue dispatcher for one function
#[derive(Debug)]
pub struct EventDispatcher<R: RegisterIo> {
    regs: R,
    phases: PhaseBits,
    config: PollConfig,
}

impl<R: RegisterIo> EventDispatcher<R> {
    /// Dispatcher over `channels` event queues
    pub fn new(regs: R, channels: usize, config: PollConfig) -> Self {
        Self {
            regs,
            phases: PhaseBits::new(channels),
            config,
        }
    }

    /// Register access
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Shared phase bits
    pub fn phases(&self) -> &PhaseBits {
        &self.phases
    }

    /// Active configuration
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Bring a probed channel to its initial state and create the queue
    pub fn ev_init<P: EventQueueOps + ?Sized>(&self, channel: &mut Channel, ops: &P) -> Result<()> {
        self.phases.clear(channel.id());
        channel.set_read_ptr(0);
        channel.ring().reset();
        let ring = channel.ring();
        ops.init_evq(channel.id(), ring.bus_addr(), ring.entries())
    }

    /// Drain up to `quota` units of work from `channel`
    ///
    /// RX events cost one unit each, MCDI events cost what their handler
    /// reports, everything else is free.
    pub fn process<H: EventHandler + ?Sized>(
        &self,
        channel: &mut Channel,
        quota: u32,
        handler: &H,
    ) -> u32 {
        if !channel.is_enabled() {
            return 0;
        }

        let id = channel.id();
        let mask = channel.ring().mask();
        let old_phase = self.phases.test(id);
        let mut phase = old_phase;
        let mut read_ptr = channel.read_ptr();
        let mut spent = 0u32;

        while spent < quota {
            let event = match channel.ring().read(read_ptr) {
                Ok(event) => event,
                Err(e) => {
                    log::error!("EVQ: channel {} ring read failed: {}", id.index(), e);
                    break;
                }
            };
            if event.phase() != phase {
                break;
            }

            log::trace!("EVQ: processing event on {} {}", id.index(), event);

            match event.event_type() {
                EventType::RxPkts => {
                    handler.rx_event(id, event);
                    channel.stats_mut().rx += 1;
                    spent += 1;
                }
                EventType::Mcdi => {
                    channel.stats_mut().mcdi += 1;
                    spent += self.mcdi_event(channel, event, quota - spent, handler);
                }
                EventType::TxCompletion => {
                    handler.tx_event(id, event);
                    channel.stats_mut().tx += 1;
                }
                EventType::Driver => {
                    log::info!("EVQ: driver initiated event {}", event);
                    channel.stats_mut().driver += 1;
                }
                EventType::TxTimestamp | EventType::Unknown(_) => {
                    log::info!("EVQ: unhandled event {}", event);
                    channel.stats_mut().unhandled += 1;
                }
            }

            read_ptr = read_ptr.wrapping_add(1);
            if read_ptr & mask == 0 {
                phase = !phase;
                channel.stats_mut().wraps += 1;
            }

            if self.config.busy_polling()
                && self.config.busy_poll_ack_interval != 0
                && read_ptr % self.config.busy_poll_ack_interval == 0
            {
                channel.set_read_ptr(read_ptr);
                self.read_ack(channel);
            }
        }

        channel.set_read_ptr(read_ptr);
        if phase != old_phase {
            self.phases.toggle(id);
        }

        if self.config.busy_polling() && self.config.busy_poll_force_quota {
            return quota;
        }
        spent
    }

    fn mcdi_event<H: EventHandler + ?Sized>(
        &self,
        channel: &mut Channel,
        event: Event,
        quota: u32,
        handler: &H,
    ) -> u32 {
        let id = channel.id();
        if handler.mcdi_event(id, event) {
            return 0;
        }
        match handler.port_event(id, event, quota) {
            Some(rc) if rc > 0 => (rc as u32).min(quota),
            Some(rc) if rc < 0 => 1,
            Some(_) => 0,
            None => {
                log::info!(
                    "EVQ: unhandled MCDI event {} code {}",
                    event,
                    efx_mcdi::protocol::MCDI_EVENT_CODE.get(event.0)
                );
                channel.stats_mut().unhandled += 1;
                0
            }
        }
    }

    /// Tell the device how far the channel has been read
    pub fn read_ack(&self, channel: &Channel) {
        let mut prime = regs::ERF_GZ_EVQ_ID.set32(0, channel.id().0 as u32);
        prime = regs::ERF_GZ_IDX.set32(prime, channel.masked_read_ptr());
        self.regs.write32(regs::ER_GZ_EVQ_INT_PRIME, prime);
    }

    /// An MCDI event is waiting ahead of the read cursor
    pub fn mcdi_pending(&self, channel: &Channel) -> bool {
        if !channel.is_enabled() {
            return false;
        }

        let phase = self.phases.test(channel.id());
        let mut read_ptr = channel.read_ptr();
        for _ in 0..channel.ring().entries() {
            let event = match channel.ring().read(read_ptr) {
                Ok(event) => event,
                Err(_) => return false,
            };
            if event.phase() != phase {
                return false;
            }
            if event.event_type() == EventType::Mcdi {
                return true;
            }
            read_ptr = read_ptr.wrapping_add(1);
        }
        false
    }
}
