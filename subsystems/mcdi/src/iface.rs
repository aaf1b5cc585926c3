//! # Polled MCDI Interface
//!
//! A complete request/response RPC over [`McdiTransport`]: encode, send,
//! poll against the command's timeout budget, decode, release.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use core::time::Duration;

use efx_core::{Error, McdiRpc, Platform, Result};
use efx_hal::RegisterIo;

use crate::pool::SlotId;
use crate::protocol::{
    self, event_code, RequestHeader, ResponseHeader, TimeoutClass, MCDI_CTL_SDU_LEN_MAX,
    MCDI_EVENT_CMDDONE_DATALEN, MCDI_EVENT_CMDDONE_ERRNO, MCDI_EVENT_CMDDONE_SEQ,
    MCDI_EVENT_CODE, MCDI_HEADER_LEN, MCDI_HEADER_SEQ_MASK, MC_CMD_ERR_CODE_OFST,
};
use crate::transport::{McdiTransport, RebootStatus, TransportGuard};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Polling and timeout parameters
#[derive(Debug, Clone)]
pub struct McdiConfig {
    /// Delay between response polls
    pub poll_interval: Duration,
    /// Budget for ordinary commands
    pub timeout: Duration,
    /// Budget for NVRAM erase / update-finish
    pub long_timeout: Duration,
}

impl McdiConfig {
    /// Timeout budget for `cmd`
    pub fn timeout_for(&self, cmd: u16) -> Duration {
        match TimeoutClass::of(cmd) {
            TimeoutClass::Standard => self.timeout,
            TimeoutClass::Long => self.long_timeout,
        }
    }
}

impl Default for McdiConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(100),
            timeout: protocol::MCDI_RPC_TIMEOUT,
            long_timeout: protocol::MCDI_RPC_LONG_TIMEOUT,
        }
    }
}

// =============================================================================
// INTERFACE
// =============================================================================

/// No request is waiting for a completion event
const NO_REQUEST: u8 = 0xff;

/// Polled MCDI RPC endpoint
#[derive(Debug)]
pub struct McdiIface<R: RegisterIo, P: Platform> {
    transport: McdiTransport<R>,
    platform: P,
    config: McdiConfig,
    seq: AtomicU8,
    /// Sequence number of the request in flight, or `NO_REQUEST`
    outstanding: AtomicU8,
    /// A CMDDONE event arrived since the last poll
    completion: AtomicBool,
    /// A REBOOT event arrived
    reboot_event: AtomicBool,
}

impl<R: RegisterIo, P: Platform> McdiIface<R, P> {
    /// Wrap a transport
    pub fn new(transport: McdiTransport<R>, platform: P, config: McdiConfig) -> Self {
        Self {
            transport,
            platform,
            config,
            seq: AtomicU8::new(0),
            outstanding: AtomicU8::new(NO_REQUEST),
            completion: AtomicBool::new(false),
            reboot_event: AtomicBool::new(false),
        }
    }

    /// Underlying transport
    pub fn transport(&self) -> &McdiTransport<R> {
        &self.transport
    }

    /// Host platform
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Active configuration
    pub fn config(&self) -> &McdiConfig {
        &self.config
    }

    /// Consume an MCDI-type event if it belongs to the request path
    ///
    /// Returns `true` when the event was claimed.
    pub fn process_event(&self, event: u64) -> bool {
        match MCDI_EVENT_CODE.get(event) as u8 {
            event_code::CMDDONE => {
                self.command_done(event);
                true
            }
            event_code::REBOOT | event_code::MC_REBOOT => {
                log::warn!("MCDI: firmware reboot event");
                self.reboot_event.store(true, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    fn command_done(&self, event: u64) {
        let seq = MCDI_EVENT_CMDDONE_SEQ.get(event) as u8 & MCDI_HEADER_SEQ_MASK;
        let outstanding = self.outstanding.load(Ordering::Acquire);
        if outstanding == NO_REQUEST {
            log::warn!("MCDI: completion for seq {} with no request outstanding", seq);
            return;
        }
        if seq != outstanding {
            log::error!("MCDI: response mismatch tx seq {} rx seq {}", outstanding, seq);
            return;
        }
        log::trace!(
            "MCDI: seq {} done, {} bytes, errno {}",
            seq,
            MCDI_EVENT_CMDDONE_DATALEN.get(event),
            MCDI_EVENT_CMDDONE_ERRNO.get(event)
        );
        self.completion.store(true, Ordering::Release);
    }

    /// A reboot event is waiting to be handled
    pub fn reboot_pending(&self) -> bool {
        self.reboot_event.load(Ordering::Acquire)
    }

    /// Check for a firmware reboot outside of a request
    pub fn poll_reboot(&self) -> Result<RebootStatus> {
        let mut guard = self.transport.lock();
        self.check_reboot(&mut guard)
    }

    /// [`Self::poll_reboot`] unless a request holds the transport
    ///
    /// Returns `None` when the lock is taken. The request in flight checks
    /// the boot counter on every poll and picks the reboot up itself.
    pub fn try_poll_reboot(&self) -> Option<Result<RebootStatus>> {
        let mut guard = self.transport.try_lock()?;
        Some(self.check_reboot(&mut guard))
    }

    fn check_reboot(&self, guard: &mut TransportGuard<'_, R>) -> Result<RebootStatus> {
        self.reboot_event.store(false, Ordering::Release);
        let status = guard.detect_reboot()?;
        if status == RebootStatus::Rebooted {
            guard.reboot_detected(self.platform.now());
        }
        Ok(status)
    }

    fn call(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8], quiet: bool) -> Result<usize> {
        if inbuf.len() > MCDI_CTL_SDU_LEN_MAX {
            return Err(Error::BufferOverflow);
        }
        if self.transport.is_hardware_unavailable() {
            return Err(Error::HardwareUnavailable);
        }

        let mut guard = self.transport.lock();
        let slot = guard.acquire_slot()?;
        let result = self.exchange(&mut guard, slot, cmd, inbuf, outbuf);
        guard.release_slot(slot);
        drop(guard);

        if let Err(e) = result {
            if !quiet {
                log::error!("MCDI: command {:#x} failed: {}", cmd, e);
            }
        }
        result
    }

    fn exchange(
        &self,
        guard: &mut TransportGuard<'_, R>,
        slot: SlotId,
        cmd: u16,
        inbuf: &[u8],
        outbuf: &mut [u8],
    ) -> Result<usize> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) & MCDI_HEADER_SEQ_MASK;
        let header = RequestHeader {
            cmd,
            seq,
            len: inbuf.len() as u16,
            ev_req: true,
        };
        self.completion.store(false, Ordering::Release);
        self.outstanding.store(seq, Ordering::Release);
        let waited = guard
            .send_request(slot, &header.encode(), inbuf)
            .and_then(|()| self.wait_response(guard, slot, cmd));
        self.outstanding.store(NO_REQUEST, Ordering::Release);
        waited?;

        let mut raw = [0u8; MCDI_HEADER_LEN];
        guard.read_response(slot, 0, &mut raw)?;
        let resp = ResponseHeader::decode(&raw)?;
        if resp.seq != seq || resp.cmd != cmd {
            log::error!(
                "MCDI: response mismatch (cmd {:#x} seq {}, expected {:#x} seq {})",
                resp.cmd,
                resp.seq,
                cmd,
                seq
            );
            return Err(Error::Io);
        }

        if resp.error {
            let mut code = [0u8; 4];
            guard.read_response(slot, MCDI_HEADER_LEN + MC_CMD_ERR_CODE_OFST, &mut code)?;
            return Err(Error::from_mcdi(u32::from_le_bytes(code)));
        }

        let len = resp.len.min(MCDI_CTL_SDU_LEN_MAX);
        let copy = len.min(outbuf.len());
        guard.read_response(slot, MCDI_HEADER_LEN, &mut outbuf[..copy])?;
        Ok(len)
    }

    /// Poll until firmware answers in `slot`, the MC reboots or the
    /// command's budget runs out
    ///
    /// A matching CMDDONE event skips the sleep before the next poll.
    fn wait_response(&self, guard: &mut TransportGuard<'_, R>, slot: SlotId, cmd: u16) -> Result<()> {
        let budget = self.config.timeout_for(cmd);
        let start = self.platform.now();
        while !guard.poll_response(slot) {
            if self.check_reboot(guard)? == RebootStatus::Rebooted {
                return Err(Error::Io);
            }
            if self.platform.now().since(start) >= budget {
                log::error!("MCDI: command {:#x} timed out after {:?}", cmd, budget);
                return Err(Error::Timeout);
            }
            if !self.completion.swap(false, Ordering::AcqRel) {
                self.platform.sleep(self.config.poll_interval);
            }
        }
        Ok(())
    }
}

impl<R: RegisterIo, P: Platform> McdiRpc for McdiIface<R, P> {
    fn rpc(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8]) -> Result<usize> {
        self.call(cmd, inbuf, outbuf, false)
    }

    fn rpc_quiet(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8]) -> Result<usize> {
        self.call(cmd, inbuf, outbuf, true)
    }
}
