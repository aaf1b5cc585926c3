//! Test doubles for the host collaborators and the firmware.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use core::time::Duration;

use spin::Mutex;

use efx_core::*;
use efx_hal::sim::SimRegisters;
use efx_hal::{regs, DmaAllocator, DmaBuffer, HeapDmaAllocator};
use efx_mcdi::protocol::{ResponseHeader, MCDI_CTL_SDU_LEN_MAX, MCDI_HEADER_LEN};

// =============================================================================
// CANNED FIRMWARE
// =============================================================================

/// Firmware model answering each command with a fixed reply
///
/// Commands without a reply succeed with an empty response.
#[derive(Debug, Default)]
pub struct CannedRpc {
    replies: Mutex<BTreeMap<u16, core::result::Result<Vec<u8>, McdiErrorCode>>>,
    requests: Mutex<Vec<(u16, Vec<u8>)>>,
}

impl CannedRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, cmd: u16, payload: &[u8]) {
        self.replies.lock().insert(cmd, Ok(payload.to_vec()));
    }

    pub fn fail(&self, cmd: u16, code: McdiErrorCode) {
        self.replies.lock().insert(cmd, Err(code));
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<(u16, Vec<u8>)> {
        self.requests.lock().clone()
    }

    /// Payloads sent with `cmd`
    pub fn requests_for(&self, cmd: u16) -> Vec<Vec<u8>> {
        self.requests
            .lock()
            .iter()
            .filter(|(c, _)| *c == cmd)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn answer(&self, cmd: u16, inbuf: &[u8]) -> core::result::Result<Vec<u8>, McdiErrorCode> {
        self.requests.lock().push((cmd, inbuf.to_vec()));
        self.replies.lock().get(&cmd).cloned().unwrap_or(Ok(Vec::new()))
    }
}

impl McdiRpc for CannedRpc {
    fn rpc(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8]) -> Result<usize> {
        let payload = self.answer(cmd, inbuf).map_err(Error::from)?;
        let copy = payload.len().min(outbuf.len());
        outbuf[..copy].copy_from_slice(&payload[..copy]);
        Ok(payload.len())
    }
}

/// DMA allocator that remembers the first buffer it hands out
#[derive(Debug, Default, Clone)]
pub struct RecordingDma {
    first: Arc<Mutex<Option<DmaBuffer>>>,
}

impl DmaAllocator for RecordingDma {
    fn alloc(&self, len: usize, align: usize) -> Result<DmaBuffer> {
        let buffer = HeapDmaAllocator.alloc(len, align)?;
        self.first.lock().get_or_insert_with(|| buffer.clone());
        Ok(buffer)
    }
}

/// Connect `rpc` to the MCDI doorbell of `sim`
///
/// The returned allocator must be used to probe the device so the model
/// can find the message buffer.
pub fn attach_firmware(sim: &Arc<SimRegisters>, rpc: &Arc<CannedRpc>) -> RecordingDma {
    let dma = RecordingDma::default();
    let first = dma.first.clone();
    let rpc = rpc.clone();

    sim.set(regs::ER_GZ_MC_SFT_STATUS, 0xb007_0001);
    sim.on_write(move |offset, value| {
        // Value 1 cancels outstanding requests
        if offset != regs::ER_GZ_MC_DB_HWRD || value == 1 {
            return;
        }
        let Some(buffer) = first.lock().clone() else {
            return;
        };

        let mut req = [0u8; MCDI_HEADER_LEN];
        buffer.read_bytes(0, &mut req).unwrap();
        let dw0 = u32::from_le_bytes([req[0], req[1], req[2], req[3]]);
        let dw1 = u32::from_le_bytes([req[4], req[5], req[6], req[7]]);
        let cmd = (dw1 & 0x7fff) as u16;
        let mut inbuf = alloc::vec![0u8; ((dw1 >> 16) & 0x3ff) as usize];
        buffer.read_bytes(MCDI_HEADER_LEN, &mut inbuf).unwrap();

        let (payload, error) = match rpc.answer(cmd, &inbuf) {
            Ok(payload) => (payload, false),
            Err(code) => (code.0.to_le_bytes().to_vec(), true),
        };
        let len = payload.len().min(MCDI_CTL_SDU_LEN_MAX);
        buffer.write_bytes(MCDI_HEADER_LEN, &payload[..len]).unwrap();
        let resp = ResponseHeader {
            cmd,
            seq: ((dw0 >> 16) & 0xf) as u8,
            len,
            error,
        };
        buffer.write_bytes(0, &resp.encode()).unwrap();
    });
    dma
}

// =============================================================================
// HOST
// =============================================================================

/// Calls made into the host, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Register,
    Unregister,
    Open,
    Close,
    Attach,
    SetMacAddress(MacAddress),
    EnableTso,
    GsoMaxSize(u32),
    GsoMaxSegs(u16),
    EnableHwTc,
    FilterProbe(bool, bool, bool),
    AddVlan(FilterVlan),
    DelVlan(FilterVlan),
    TableDown,
    SyncRxMode,
    RepAttach,
    RepDetach,
    RepStart,
    RepStop,
    ProbeCommon,
    RemoveCommon,
    GetPhyCfg,
    PortReconfigure,
    SetMac,
    SetMtu,
    LookupMport(MportSelector),
    InitTc,
    PullMacStats,
    InitEvq(ChannelId, u32),
    ScheduleChannel(ChannelId),
    Rx(ChannelId),
    Tx(ChannelId),
}

/// Recording host with injectable failures
#[derive(Debug, Default)]
pub struct FakeHost {
    now: AtomicU64,
    cpu: AtomicU32,
    primary: AtomicBool,
    mport: AtomicU32,
    calls: Mutex<Vec<HostCall>>,
    failures: Mutex<BTreeMap<&'static str, Error>>,
    mac_stats: Mutex<Vec<u64>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operation fail with `error`
    pub fn fail(&self, op: &'static str, error: Error) {
        self.failures.lock().insert(op, error);
    }

    /// Let the named operation succeed again
    pub fn heal(&self, op: &'static str) {
        self.failures.lock().remove(op);
    }

    pub fn set_primary(&self, primary: bool) {
        self.primary.store(primary, Ordering::SeqCst);
    }

    pub fn set_cpu(&self, cpu: u32) {
        self.cpu.store(cpu, Ordering::SeqCst);
    }

    pub fn set_mport(&self, id: u32) {
        self.mport.store(id, Ordering::SeqCst);
    }

    pub fn set_mac_stats(&self, stats: &[u64]) {
        *self.mac_stats.lock() = stats.to_vec();
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn called(&self, call: HostCall) -> bool {
        self.calls.lock().contains(&call)
    }

    pub fn tso_enabled(&self) -> bool {
        self.called(HostCall::EnableTso)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.now.load(Ordering::SeqCst))
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }

    fn check(&self, op: &'static str) -> Result<()> {
        match self.failures.lock().get(op) {
            Some(e) => Err(*e),
            None => Ok(()),
        }
    }

    fn call(&self, op: &'static str, call: HostCall) -> Result<()> {
        self.record(call);
        self.check(op)
    }
}

impl Platform for FakeHost {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.now.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.now.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    fn current_cpu(&self) -> u32 {
        self.cpu.load(Ordering::SeqCst)
    }
}

impl NetDevice for FakeHost {
    fn register(&self) -> Result<()> {
        self.call("register", HostCall::Register)
    }

    fn unregister(&self) {
        self.record(HostCall::Unregister);
    }

    fn open(&self) -> Result<()> {
        self.call("open", HostCall::Open)
    }

    fn close(&self) {
        self.record(HostCall::Close);
    }

    fn attach(&self) {
        self.record(HostCall::Attach);
    }

    fn set_mac_address(&self, mac: MacAddress) {
        self.record(HostCall::SetMacAddress(mac));
    }

    fn enable_tso(&self) {
        self.record(HostCall::EnableTso);
    }

    fn set_gso_max_size(&self, max_size: u32) {
        self.record(HostCall::GsoMaxSize(max_size));
    }

    fn set_gso_max_segs(&self, max_segs: u16) {
        self.record(HostCall::GsoMaxSegs(max_segs));
    }

    fn enable_hw_tc(&self) {
        self.record(HostCall::EnableHwTc);
    }
}

impl FilterTable for FakeHost {
    fn probe(&self, rss_limited: bool, additional_rss: bool, encap: bool) -> Result<()> {
        self.call(
            "filter_probe",
            HostCall::FilterProbe(rss_limited, additional_rss, encap),
        )
    }

    fn add_vlan(&self, vlan: FilterVlan) -> Result<()> {
        self.record(HostCall::AddVlan(vlan));
        match vlan {
            FilterVlan::Unspecified => self.check("add_vlan_unspec"),
            FilterVlan::Id(_) => self.check("add_vlan"),
        }
    }

    fn del_vlan(&self, vlan: FilterVlan) {
        self.record(HostCall::DelVlan(vlan));
    }

    fn table_down(&self) {
        self.record(HostCall::TableDown);
    }

    fn sync_rx_mode(&self) {
        self.record(HostCall::SyncRxMode);
    }
}

impl Representors for FakeHost {
    fn attach(&self) {
        self.record(HostCall::RepAttach);
    }

    fn detach(&self) {
        self.record(HostCall::RepDetach);
    }

    fn start(&self) {
        self.record(HostCall::RepStart);
    }

    fn stop(&self) {
        self.record(HostCall::RepStop);
    }
}

impl PortOps for FakeHost {
    fn probe_common(&self) -> Result<()> {
        self.call("probe_common", HostCall::ProbeCommon)
    }

    fn remove_common(&self) {
        self.record(HostCall::RemoveCommon);
    }

    fn pf_index(&self) -> Result<u32> {
        self.check("pf_index").map(|_| 0)
    }

    fn port_number(&self) -> Result<u32> {
        self.check("port_number").map(|_| 1)
    }

    fn is_primary(&self) -> bool {
        self.primary.load(Ordering::SeqCst)
    }

    fn get_phy_cfg(&self) -> Result<()> {
        self.call("get_phy_cfg", HostCall::GetPhyCfg)
    }

    fn port_reconfigure(&self) -> Result<()> {
        self.call("port_reconfigure", HostCall::PortReconfigure)
    }

    fn set_mac(&self) -> Result<()> {
        self.call("set_mac", HostCall::SetMac)
    }

    fn set_mtu(&self) -> Result<()> {
        self.call("set_mtu", HostCall::SetMtu)
    }

    fn lookup_mport(&self, selector: MportSelector) -> Result<u32> {
        self.call("lookup_mport", HostCall::LookupMport(selector))?;
        Ok(self.mport.load(Ordering::SeqCst))
    }

    fn init_tc(&self) -> Result<()> {
        self.call("init_tc", HostCall::InitTc)
    }

    fn pull_mac_stats(&self) -> Result<()> {
        self.call("pull_mac_stats", HostCall::PullMacStats)
    }

    fn copy_mac_stats(&self, dest: &mut [u64]) -> Result<()> {
        self.check("copy_mac_stats")?;
        let stats = self.mac_stats.lock();
        for (d, s) in dest.iter_mut().zip(stats.iter()) {
            *d = *s;
        }
        Ok(())
    }
}

impl EventQueueOps for FakeHost {
    fn init_evq(&self, channel: ChannelId, _ring: DmaAddr, entries: u32) -> Result<()> {
        self.call("init_evq", HostCall::InitEvq(channel, entries))
    }

    fn schedule_channel(&self, channel: ChannelId) {
        self.record(HostCall::ScheduleChannel(channel));
    }
}

impl Datapath for FakeHost {
    fn rx_event(&self, channel: ChannelId, _event: u64) {
        self.record(HostCall::Rx(channel));
    }

    fn tx_event(&self, channel: ChannelId, _event: u64) {
        self.record(HostCall::Tx(channel));
    }
}
