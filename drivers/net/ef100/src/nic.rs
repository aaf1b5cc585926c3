//! # EF100 Function
//!
//! One probed PCI function: the MCDI interface, the event dispatcher and
//! the state learned during bring-up.
//!
//! ## Probe Flow
//!
//! 1. Scan the design parameters and hand GSO limits to the net device
//! 2. Allocate the MCDI buffer
//! 3. Read the warm boot count, retrying while the MC restarts
//! 4. Cancel any request left by a previous user of the function
//! 5. Run the host's common probe, read PF index and port number
//! 6. Reject firmware older than the minimum version
//! 7. Query and publish the datapath capabilities

use alloc::sync::Arc;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::time::Duration;

use spin::{Mutex, RwLock};

use efx_core::{
    BarConfig, CapabilityCell, CapabilityState, ChannelId, Datapath, Error, EventQueueOps,
    FilterTable, Flags1, LinkState, MacAddress, McdiRpc, MportSelector, NetDevice, Platform,
    PortOps, Representors, ResetState, Result, Timestamp,
};
use efx_eventq::{Event, EventDispatcher, EventHandler, PollConfig};
use efx_hal::{DmaAllocator, RegisterIo};
use efx_mcdi::protocol::{get_mac_addresses, MC_CMD_GET_MAC_ADDRESSES};
use efx_mcdi::{McdiConfig, McdiIface, McdiTransport};

use crate::bar_config;
use crate::caps::query_datapath_caps;
use crate::design_params::{scan_design_params, DesignParams};
use crate::filter::FilterState;
use crate::selftest::IrqState;
use crate::stats::StatsState;
use crate::version::{compare_versions, read_fw_version, FwVersion};

// =============================================================================
// HOST AND VARIANTS
// =============================================================================

/// Everything the function needs from the surrounding driver
pub trait Host:
    Platform + NetDevice + FilterTable + Representors + PortOps + EventQueueOps + Datapath
{
}

impl<T> Host for T where
    T: Platform
        + NetDevice
        + FilterTable
        + Representors
        + PortOps
        + EventQueueOps
        + Datapath
        + ?Sized
{
}

/// Hardware variant of a function
pub trait NicVariant: Send + Sync + 'static {
    /// Name used in logs
    const NAME: &'static str;
    /// Virtual function: no MAC ownership, representors or TC offload
    const IS_VF: bool;
}

/// Physical function
#[derive(Debug)]
pub enum Pf {}

impl NicVariant for Pf {
    const NAME: &'static str = "EF100 PF";
    const IS_VF: bool = false;
}

/// Virtual function
#[derive(Debug)]
pub enum Vf {}

impl NicVariant for Vf {
    const NAME: &'static str = "EF100 VF";
    const IS_VF: bool = true;
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Bring-up parameters
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Reads of the warm boot count before giving up
    pub boot_count_attempts: u32,
    /// Delay between boot count reads
    pub boot_count_retry_delay: Duration,
    /// Oldest firmware with the current event descriptors
    pub min_fw_version: &'static str,
    /// Interrupt level used by the interrupt self-test
    pub irq_level: u32,
    /// Event queues the dispatcher tracks
    pub channels: usize,
    /// MCDI polling
    pub mcdi: McdiConfig,
    /// Event polling
    pub poll: PollConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            boot_count_attempts: 5,
            boot_count_retry_delay: Duration::from_secs(1),
            min_fw_version: "1.1.0.1000",
            irq_level: 0,
            channels: 32,
            mcdi: McdiConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

// =============================================================================
// FUNCTION
// =============================================================================

/// A probed EF100 function
pub struct Nic<V: NicVariant, R: RegisterIo + Clone, H: Host> {
    pub(crate) host: Arc<H>,
    pub(crate) mcdi: McdiIface<R, Arc<H>>,
    pub(crate) dispatcher: EventDispatcher<R>,
    pub(crate) config: ProbeConfig,
    design: DesignParams,
    pub(crate) caps: CapabilityCell,
    pub(crate) state: Mutex<ResetState>,
    pub(crate) filters: RwLock<FilterState>,
    pub(crate) stats: Mutex<StatsState>,
    bar_config: Mutex<BarConfig>,
    fw_version: FwVersion,
    pf_index: u32,
    port_num: u32,
    port_id: Mutex<MacAddress>,
    base_mport: Mutex<Option<u32>>,
    old_base_mport: Mutex<Option<u32>>,
    pub(crate) irq: IrqState,
    pub(crate) last_reset: Mutex<Option<Timestamp>>,
    _variant: PhantomData<V>,
}

/// Physical function
pub type PfNic<R, H> = Nic<Pf, R, H>;

/// Virtual function
pub type VfNic<R, H> = Nic<Vf, R, H>;

struct Identity {
    pf_index: u32,
    port_num: u32,
    fw_version: FwVersion,
    caps: CapabilityState,
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> Nic<V, R, H> {
    /// Bring up the function
    ///
    /// On failure nothing is left behind: the host's common probe is undone
    /// and the partially built function is dropped.
    pub fn probe(regs: R, host: Arc<H>, dma: &dyn DmaAllocator, config: ProbeConfig) -> Result<Self> {
        let design = scan_design_params(&regs).map_err(|e| {
            log::error!("EF100: Unsupported design parameters");
            e
        })?;
        if let Some(max_size) = design.gso_max_size {
            host.set_gso_max_size(max_size);
        }
        if let Some(max_segs) = design.gso_max_segs {
            host.set_gso_max_segs(max_segs);
        }

        let transport = McdiTransport::new(regs.clone(), dma)?;
        let boot_count = read_boot_count(&transport, &*host, &config)?;
        transport.lock().set_warm_boot_count(boot_count);
        transport.cancel_outstanding();
        let mcdi = McdiIface::new(transport, host.clone(), config.mcdi.clone());

        host.probe_common()?;
        let identity = match identify(&mcdi, &*host, &config, &design) {
            Ok(identity) => identity,
            Err(e) => {
                host.remove_common();
                return Err(e);
            }
        };

        let nic = Self {
            dispatcher: EventDispatcher::new(regs, config.channels, config.poll.clone()),
            irq: IrqState::new(config.irq_level),
            host,
            mcdi,
            config,
            design,
            caps: CapabilityCell::new(),
            state: Mutex::new(ResetState::Uninitialized),
            filters: RwLock::new(FilterState::default()),
            stats: Mutex::new(StatsState::new()),
            bar_config: Mutex::new(BarConfig::Ef100),
            fw_version: identity.fw_version,
            pf_index: identity.pf_index,
            port_num: identity.port_num,
            port_id: Mutex::new(MacAddress::ZERO),
            base_mport: Mutex::new(None),
            old_base_mport: Mutex::new(None),
            last_reset: Mutex::new(None),
            _variant: PhantomData,
        };
        nic.caps.commit(identity.caps)?;
        nic.set_state(ResetState::Probed);
        log::info!("EF100: {} probed, firmware {}", V::NAME, nic.fw_version);
        Ok(nic)
    }

    /// Tear the function down
    pub fn remove(self) {
        if *self.bar_config.lock() == BarConfig::Ef100 && self.net_registered() {
            self.remove_netdev();
        }
        self.host.remove_common();
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Host collaborators
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// MCDI endpoint
    pub fn mcdi(&self) -> &McdiIface<R, Arc<H>> {
        &self.mcdi
    }

    /// Event dispatcher
    pub fn dispatcher(&self) -> &EventDispatcher<R> {
        &self.dispatcher
    }

    /// Bring-up parameters
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Design parameters learned at probe
    pub fn design_params(&self) -> &DesignParams {
        &self.design
    }

    /// Published datapath capabilities
    pub fn caps(&self) -> Option<&CapabilityState> {
        self.caps.get()
    }

    /// Current device state
    pub fn state(&self) -> ResetState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ResetState) {
        *self.state.lock() = state;
    }

    /// Running firmware version
    pub fn fw_version(&self) -> &str {
        &self.fw_version
    }

    /// PCI physical function index
    pub fn pf_index(&self) -> u32 {
        self.pf_index
    }

    /// Physical port number
    pub fn port_number(&self) -> u32 {
        self.port_num
    }

    /// Interrupt bookkeeping
    pub fn irq(&self) -> &IrqState {
        &self.irq
    }

    /// Time of the last reset or MC reboot
    pub fn last_reset(&self) -> Option<Timestamp> {
        *self.last_reset.lock()
    }

    /// M-port of the physical network port
    pub fn base_mport(&self) -> Option<u32> {
        *self.base_mport.lock()
    }

    /// M-port of the calling PF
    pub fn old_base_mport(&self) -> Option<u32> {
        *self.old_base_mport.lock()
    }

    fn net_registered(&self) -> bool {
        matches!(self.state(), ResetState::NetUp | ResetState::NetDown)
    }

    // -------------------------------------------------------------------------
    // Net device
    // -------------------------------------------------------------------------

    /// Register the net device; physical functions also claim the port MAC,
    /// the base m-port and TC offload
    pub fn probe_netdev(&self) -> Result<()> {
        self.host.register()?;
        self.set_state(ResetState::NetDown);
        if !V::IS_VF {
            if let Err(e) = self.probe_netdev_pf() {
                self.remove_netdev();
                return Err(e);
            }
        }
        Ok(())
    }

    fn probe_netdev_pf(&self) -> Result<()> {
        let mac = self.read_mac_address()?;
        self.host.set_mac_address(mac);
        *self.port_id.lock() = mac;

        if let Err(e) = self.probe_base_mport() {
            log::warn!(
                "EF100: Failed to probe base mport: {}; representors will not function",
                e
            );
        }

        if self.host.is_primary() {
            match self.host.init_tc() {
                Ok(()) => self.host.enable_hw_tc(),
                Err(e) => log::warn!("EF100: Failed to probe MAE: {}; TC offload unavailable", e),
            }
        }
        Ok(())
    }

    fn read_mac_address(&self) -> Result<MacAddress> {
        let mut out = [0u8; get_mac_addresses::OUT_LEN];
        let len = self.rpc(MC_CMD_GET_MAC_ADDRESSES, &[], &mut out)?;
        if len < get_mac_addresses::OUT_LEN {
            return Err(Error::Io);
        }
        let base = get_mac_addresses::OUT_MAC_ADDR_BASE_OFST;
        MacAddress::from_slice(&out[base..base + 6]).ok_or(Error::Io)
    }

    fn probe_base_mport(&self) -> Result<()> {
        let id = self.host.lookup_mport(MportSelector::Wire)?;
        if id >> 16 != 0 {
            log::warn!("EF100: Bad base m-port id {:#x}", id);
        }
        *self.base_mport.lock() = Some(id);

        let id = self.host.lookup_mport(MportSelector::Uplink)?;
        if id >> 16 != 0 {
            log::warn!("EF100: Bad oldbase m-port id {:#x}", id);
        }
        *self.old_base_mport.lock() = Some(id);
        Ok(())
    }

    /// Unregister the net device
    pub fn remove_netdev(&self) {
        self.host.unregister();
        self.set_state(ResetState::Probed);
    }

    /// Open the net device
    pub fn net_open(&self) -> Result<()> {
        self.host.open()?;
        self.set_state(ResetState::NetUp);
        Ok(())
    }

    /// Close the net device
    pub fn net_stop(&self) {
        self.host.close();
        if self.state() == ResetState::NetUp {
            self.set_state(ResetState::NetDown);
        }
    }

    /// Read the PHY configuration and push the wanted settings
    ///
    /// A push failure is only reported; it can be fixed from user space.
    pub fn phy_probe(&self) -> Result<()> {
        self.host.get_phy_cfg()?;
        match self.host.port_reconfigure() {
            Ok(()) | Err(Error::PermissionDenied) => {}
            Err(e) => log::warn!("EF100: could not initialise PHY settings: {}", e),
        }
        Ok(())
    }

    /// Start or stop the representors with the link
    pub fn link_state_change(&self, link: LinkState) {
        if V::IS_VF || self.state() != ResetState::NetUp {
            return;
        }
        if link.up {
            self.host.start();
        } else {
            self.host.stop();
        }
    }

    /// Identifier of the physical port, for switchdev
    pub fn phys_port_id(&self) -> Result<MacAddress> {
        let port_id = *self.port_id.lock();
        if !port_id.is_valid_ether() {
            return Err(Error::NotSupported);
        }
        Ok(port_id)
    }

    /// Push MAC settings after a configuration change
    ///
    /// When only the MTU changed and firmware refuses the full MAC update,
    /// the MTU is set on its own if the firmware supports that.
    pub fn reconfigure_mac(&self, mtu_only: bool) -> Result<()> {
        self.host.sync_rx_mode();
        match self.host.set_mac() {
            Err(Error::PermissionDenied)
                if mtu_only
                    && self
                        .caps()
                        .is_some_and(|c| c.flags1.contains(Flags1::SET_MAC_ENHANCED)) =>
            {
                self.host.set_mtu()
            }
            result => result,
        }
    }

    // -------------------------------------------------------------------------
    // BAR configuration
    // -------------------------------------------------------------------------

    /// Current BAR personality
    pub fn bar_config(&self) -> BarConfig {
        *self.bar_config.lock()
    }

    /// Attribute text of the current BAR personality
    pub fn show_bar_config(&self) -> &'static str {
        bar_config::show(self.bar_config())
    }

    /// Switch BAR personality from attribute input
    ///
    /// Returns the number of bytes consumed.
    pub fn store_bar_config(&self, input: &[u8]) -> Result<usize> {
        let new = bar_config::parse(input)?;
        let mut current = self.bar_config.lock();
        if *current == new {
            return Ok(input.len());
        }

        self.bar_fini(*current);
        *current = new;
        self.bar_init(new)?;

        log::info!(
            "EF100: BAR configuration changed to {}",
            bar_config::show(new).trim_end()
        );
        Ok(input.len())
    }

    fn bar_init(&self, config: BarConfig) -> Result<()> {
        match config {
            BarConfig::Ef100 => self.probe_netdev(),
            BarConfig::Vdpa | BarConfig::None => Ok(()),
        }
    }

    fn bar_fini(&self, config: BarConfig) {
        match config {
            BarConfig::Ef100 => self.remove_netdev(),
            BarConfig::Vdpa | BarConfig::None => {}
        }
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub(crate) fn event_handler(&self) -> NicEvents<'_, V, R, H> {
        NicEvents { nic: self }
    }

    /// Act on a reboot event unless a request is in flight
    ///
    /// A request holding the transport checks the boot counter itself; its
    /// outcome reaches the device state through [`Self::sync_mcdi_state`].
    fn handle_reboot_event(&self) {
        match self.mcdi.try_poll_reboot() {
            None => {}
            Some(Ok(_)) => self.sync_mcdi_state(),
            Some(Err(e)) => {
                log::error!("EF100: cannot read MC boot count after reboot event: {}", e);
                self.sync_mcdi_state();
            }
        }
    }

    /// Fold what the MCDI transport has learned into the device state
    ///
    /// Unreadable hardware disables the function. A reboot recorded by the
    /// transport becomes the device's last reset time.
    pub(crate) fn sync_mcdi_state(&self) {
        let transport = self.mcdi.transport();
        if transport.is_hardware_unavailable() {
            if !self.state().is_disabled() {
                log::error!("EF100: hardware unavailable, disabling {}", V::NAME);
            }
            self.set_state(ResetState::Disabled);
            return;
        }

        let Some(rebooted_at) = transport.try_lock().and_then(|guard| guard.last_reset()) else {
            return;
        };
        let mut last_reset = self.last_reset.lock();
        if last_reset.map_or(true, |at| at < rebooted_at) {
            *last_reset = Some(rebooted_at);
        }
    }
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> McdiRpc for Nic<V, R, H> {
    fn rpc(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8]) -> Result<usize> {
        let result = self.mcdi.rpc(cmd, inbuf, outbuf);
        if result.is_err() {
            self.sync_mcdi_state();
        }
        result
    }

    fn rpc_quiet(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8]) -> Result<usize> {
        let result = self.mcdi.rpc_quiet(cmd, inbuf, outbuf);
        if result.is_err() {
            self.sync_mcdi_state();
        }
        result
    }
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> fmt::Debug for Nic<V, R, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nic")
            .field("variant", &V::NAME)
            .field("state", &self.state())
            .field("bar_config", &self.bar_config())
            .field("fw_version", &self.fw_version.as_str())
            .field("port_num", &self.port_num)
            .finish()
    }
}

/// Routes dispatched events to the MCDI endpoint and the datapath
pub(crate) struct NicEvents<'a, V: NicVariant, R: RegisterIo + Clone, H: Host> {
    nic: &'a Nic<V, R, H>,
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> EventHandler for NicEvents<'_, V, R, H> {
    fn rx_event(&self, channel: ChannelId, event: Event) {
        self.nic.host.rx_event(channel, event.0);
    }

    fn tx_event(&self, channel: ChannelId, event: Event) {
        self.nic.host.tx_event(channel, event.0);
    }

    fn mcdi_event(&self, _channel: ChannelId, event: Event) -> bool {
        if !self.nic.mcdi.process_event(event.0) {
            return false;
        }
        if self.nic.mcdi.reboot_pending() {
            self.nic.handle_reboot_event();
        }
        true
    }

    fn port_event(&self, channel: ChannelId, event: Event, quota: u32) -> Option<i32> {
        self.nic.host.port_event(channel, event.0, quota)
    }
}

// =============================================================================
// PROBE STEPS
// =============================================================================

fn read_boot_count<R, P>(transport: &McdiTransport<R>, platform: &P, config: &ProbeConfig) -> Result<u16>
where
    R: RegisterIo,
    P: Platform + ?Sized,
{
    let mut attempt = 0;
    loop {
        match transport.warm_boot_count() {
            Ok(count) => return Ok(count),
            Err(e) => {
                attempt += 1;
                if attempt >= config.boot_count_attempts {
                    log::error!("EF100: failed to read MC boot count: {}", e);
                    return Err(e);
                }
                platform.sleep(config.boot_count_retry_delay);
            }
        }
    }
}

fn identify<M, H>(mcdi: &M, host: &H, config: &ProbeConfig, design: &DesignParams) -> Result<Identity>
where
    M: McdiRpc + ?Sized,
    H: Host + ?Sized,
{
    let pf_index = host.pf_index()?;
    let port_num = host.port_number()?;

    let fw_version = read_fw_version(mcdi);
    log::debug!("EF100: Firmware version {}", fw_version);
    if compare_versions(&fw_version, config.min_fw_version) == Ordering::Less {
        log::info!("EF100: Firmware uses old event descriptors");
        return Err(Error::InvalidParameter);
    }

    let caps = query_datapath_caps(mcdi, host, design.tso)?;
    Ok(Identity {
        pf_index,
        port_num,
        fw_version,
        caps,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::{attach_firmware, CannedRpc, FakeHost, HostCall};
    use efx_core::McdiErrorCode;
    use efx_hal::regs;
    use efx_hal::sim::SimRegisters;
    use efx_mcdi::protocol::{MC_CMD_GET_CAPABILITIES, MC_CMD_GET_VERSION};

    pub(crate) type TestNic<V> = Nic<V, Arc<SimRegisters>, FakeHost>;

    pub(crate) struct Rig {
        pub sim: Arc<SimRegisters>,
        pub rpc: Arc<CannedRpc>,
        pub host: Arc<FakeHost>,
    }

    pub(crate) const MAC: [u8; 6] = [0x00, 0x0f, 0x53, 0x01, 0x02, 0x03];

    impl Rig {
        /// Firmware 1.2.0.0 with TSO v3, SET_MAC_ENHANCED and a permanent MAC
        pub fn new() -> Self {
            let rpc = Arc::new(CannedRpc::new());
            rpc.reply(MC_CMD_GET_VERSION, &[0, 0, 0, 0, 1, 0, 2, 0, 0, 0, 0, 0]);

            let mut caps = [0u8; 78];
            caps[0..4].copy_from_slice(&(Flags1::SET_MAC_ENHANCED.bits() as u32).to_le_bytes());
            caps[20..24].copy_from_slice(&(1u32 << 30).to_le_bytes());
            caps[76..78].copy_from_slice(&94u16.to_le_bytes());
            rpc.reply(MC_CMD_GET_CAPABILITIES, &caps);

            let mut macs = [0u8; 16];
            macs[..6].copy_from_slice(&MAC);
            rpc.reply(MC_CMD_GET_MAC_ADDRESSES, &macs);

            Self {
                sim: Arc::new(SimRegisters::new()),
                rpc,
                host: Arc::new(FakeHost::new()),
            }
        }

        pub fn probe<V: NicVariant>(&self) -> Result<TestNic<V>> {
            let dma = attach_firmware(&self.sim, &self.rpc);
            Nic::probe(self.sim.clone(), self.host.clone(), &dma, ProbeConfig::default())
        }
    }

    #[test]
    fn test_probe_pf() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        assert_eq!(nic.state(), ResetState::Probed);
        assert_eq!(nic.bar_config(), BarConfig::Ef100);
        assert_eq!(nic.fw_version(), "1.2.0.0");
        assert_eq!(nic.port_number(), 1);
        assert_eq!(nic.caps().map(|c| c.mac_stats_num), Some(94));
        assert!(rig.host.tso_enabled());
        assert!(rig.host.called(HostCall::ProbeCommon));
        assert_eq!(rig.sim.writes_to(regs::ER_GZ_MC_DB_HWRD).first(), Some(&1));
    }

    #[test]
    fn test_probe_passes_gso_limits() {
        let rig = Rig::new();
        rig.sim.load_design_params(&[
            0x09, 0x02, 0x00, 0x80, // TSO max payload 0x8000
            0x0a, 0x01, 0x20, // TSO max payload segments 32
        ]);
        let nic = rig.probe::<Pf>().unwrap();

        assert!(rig.host.called(HostCall::GsoMaxSize(0x8000)));
        assert!(rig.host.called(HostCall::GsoMaxSegs(32)));
        assert_eq!(nic.design_params().tso.max_payload_num_segs, 32);
    }

    #[test]
    fn test_probe_rejects_bad_design_params() {
        let rig = Rig::new();
        rig.sim.load_design_params(&[0x05, 0x09]);
        assert_eq!(rig.probe::<Pf>().err(), Some(Error::Unsupported));
        assert!(rig.rpc.requests().is_empty());
    }

    #[test]
    fn test_probe_retries_boot_count() {
        let rig = Rig::new();
        let dma = attach_firmware(&rig.sim, &rig.rpc);
        rig.sim.script(regs::ER_GZ_MC_SFT_STATUS, &[u32::MAX, u32::MAX]);

        let nic: TestNic<Pf> =
            Nic::probe(rig.sim.clone(), rig.host.clone(), &dma, ProbeConfig::default()).unwrap();
        assert_eq!(nic.state(), ResetState::Probed);
        assert_eq!(rig.host.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_probe_gives_up_on_boot_count() {
        let rig = Rig::new();
        let dma = attach_firmware(&rig.sim, &rig.rpc);
        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, u32::MAX);

        let result: Result<TestNic<Pf>> =
            Nic::probe(rig.sim.clone(), rig.host.clone(), &dma, ProbeConfig::default());
        assert_eq!(result.err(), Some(Error::HardwareUnavailable));
        assert_eq!(rig.host.elapsed(), Duration::from_secs(4));
        assert!(!rig.host.called(HostCall::ProbeCommon));
    }

    #[test]
    fn test_probe_rejects_old_firmware() {
        let rig = Rig::new();
        rig.rpc.reply(MC_CMD_GET_VERSION, &[0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0xe7, 0x03]);

        assert_eq!(rig.probe::<Pf>().err(), Some(Error::InvalidParameter));
        assert!(rig.host.called(HostCall::RemoveCommon));
        assert!(rig.rpc.requests_for(MC_CMD_GET_CAPABILITIES).is_empty());
    }

    #[test]
    fn test_probe_short_caps_is_io_error() {
        let rig = Rig::new();
        rig.rpc.reply(MC_CMD_GET_CAPABILITIES, &[0; 40]);

        assert_eq!(rig.probe::<Pf>().err(), Some(Error::Io));
        assert!(!rig.host.tso_enabled());
        assert!(rig.host.called(HostCall::RemoveCommon));
    }

    #[test]
    fn test_probe_common_failure() {
        let rig = Rig::new();
        rig.host.fail("probe_common", Error::OutOfMemory);
        assert_eq!(rig.probe::<Pf>().err(), Some(Error::OutOfMemory));
        assert!(!rig.host.called(HostCall::RemoveCommon));
    }

    #[test]
    fn test_pf_netdev_probe() {
        let rig = Rig::new();
        rig.host.set_primary(true);
        rig.host.set_mport(0x12);
        let nic = rig.probe::<Pf>().unwrap();
        rig.host.clear_calls();

        nic.probe_netdev().unwrap();
        assert_eq!(nic.state(), ResetState::NetDown);
        assert_eq!(
            rig.host.calls(),
            [
                HostCall::Register,
                HostCall::SetMacAddress(MacAddress(MAC)),
                HostCall::LookupMport(MportSelector::Wire),
                HostCall::LookupMport(MportSelector::Uplink),
                HostCall::InitTc,
                HostCall::EnableHwTc,
            ]
        );
        assert_eq!(nic.base_mport(), Some(0x12));
        assert_eq!(nic.old_base_mport(), Some(0x12));
        assert_eq!(nic.phys_port_id(), Ok(MacAddress(MAC)));
    }

    #[test]
    fn test_pf_netdev_optional_failures_are_warnings() {
        let rig = Rig::new();
        rig.host.set_primary(true);
        rig.host.fail("lookup_mport", Error::NotSupported);
        rig.host.fail("init_tc", Error::NotSupported);
        let nic = rig.probe::<Pf>().unwrap();

        nic.probe_netdev().unwrap();
        assert_eq!(nic.base_mport(), None);
        assert!(!rig.host.called(HostCall::EnableHwTc));
    }

    #[test]
    fn test_pf_netdev_short_mac_response() {
        let rig = Rig::new();
        rig.rpc.reply(MC_CMD_GET_MAC_ADDRESSES, &[0; 8]);
        let nic = rig.probe::<Pf>().unwrap();

        assert_eq!(nic.probe_netdev(), Err(Error::Io));
        assert!(rig.host.called(HostCall::Unregister));
        assert_eq!(nic.state(), ResetState::Probed);
    }

    #[test]
    fn test_vf_skips_pf_extras() {
        let rig = Rig::new();
        let nic = rig.probe::<Vf>().unwrap();
        rig.host.clear_calls();

        nic.probe_netdev().unwrap();
        assert_eq!(rig.host.calls(), [HostCall::Register]);
        assert!(rig.rpc.requests_for(MC_CMD_GET_MAC_ADDRESSES).is_empty());
        assert_eq!(nic.phys_port_id(), Err(Error::NotSupported));
    }

    #[test]
    fn test_phy_probe() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        rig.host.fail("port_reconfigure", Error::Timeout);
        assert_eq!(nic.phy_probe(), Ok(()));

        rig.host.fail("get_phy_cfg", Error::Io);
        assert_eq!(nic.phy_probe(), Err(Error::Io));
    }

    #[test]
    fn test_link_state_change_only_when_up() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        nic.probe_netdev().unwrap();
        rig.host.clear_calls();

        nic.link_state_change(LinkState { up: true, ..Default::default() });
        assert!(rig.host.calls().is_empty());

        nic.net_open().unwrap();
        nic.link_state_change(LinkState { up: true, ..Default::default() });
        nic.link_state_change(LinkState::default());
        assert_eq!(
            rig.host.calls(),
            [HostCall::Open, HostCall::RepStart, HostCall::RepStop]
        );
    }

    #[test]
    fn test_reconfigure_mac_mtu_fallback() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        rig.host.fail("set_mac", Error::PermissionDenied);
        rig.host.clear_calls();

        assert_eq!(nic.reconfigure_mac(true), Ok(()));
        assert_eq!(
            rig.host.calls(),
            [HostCall::SyncRxMode, HostCall::SetMac, HostCall::SetMtu]
        );

        assert_eq!(nic.reconfigure_mac(false), Err(Error::PermissionDenied));
    }

    #[test]
    fn test_bar_config_switch() {
        let rig = Rig::new();
        let nic = rig.probe::<Vf>().unwrap();
        nic.probe_netdev().unwrap();
        rig.host.clear_calls();

        assert_eq!(nic.show_bar_config(), "EF100\n");
        assert_eq!(nic.store_bar_config(b"ef100\n"), Ok(6));
        assert!(rig.host.calls().is_empty());

        assert_eq!(nic.store_bar_config(b"vdpa\n"), Ok(5));
        assert_eq!(nic.show_bar_config(), "vDPA\n");
        assert_eq!(rig.host.calls(), [HostCall::Unregister]);

        assert_eq!(nic.store_bar_config(b"bogus"), Err(Error::Io));
        assert_eq!(nic.bar_config(), BarConfig::Vdpa);

        rig.host.clear_calls();
        assert_eq!(nic.store_bar_config(b"EF100"), Ok(5));
        assert_eq!(rig.host.calls(), [HostCall::Register]);
        assert_eq!(nic.state(), ResetState::NetDown);
    }

    #[test]
    fn test_bar_config_init_failure() {
        let rig = Rig::new();
        let nic = rig.probe::<Vf>().unwrap();
        nic.store_bar_config(b"none").unwrap();

        rig.host.fail("register", Error::Busy);
        assert_eq!(nic.store_bar_config(b"ef100"), Err(Error::Busy));
        assert_eq!(nic.bar_config(), BarConfig::Ef100);
    }

    #[test]
    fn test_rpc_delegates_to_firmware() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        rig.rpc.fail(MC_CMD_GET_VERSION, McdiErrorCode::EPERM);

        let mut out = [0u8; 32];
        assert_eq!(
            nic.rpc(MC_CMD_GET_VERSION, &[], &mut out),
            Err(Error::PermissionDenied)
        );
    }

    #[test]
    fn test_unreadable_status_during_request_disables() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        nic.probe_netdev().unwrap();
        nic.net_open().unwrap();

        // Firmware stops answering and the status register reads all-ones
        rig.sim.on_write(|_, _| {});
        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, u32::MAX);

        let mut out = [0u8; 32];
        assert_eq!(nic.rpc(MC_CMD_GET_VERSION, &[], &mut out), Err(Error::Timeout));
        assert_eq!(nic.state(), ResetState::Disabled);
        assert_eq!(
            nic.rpc_quiet(MC_CMD_GET_VERSION, &[], &mut out),
            Err(Error::HardwareUnavailable)
        );
        assert_eq!(nic.state(), ResetState::Disabled);
    }

    #[test]
    fn test_reboot_seen_during_request_sets_last_reset() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        rig.sim.on_write(|_, _| {});
        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, 0xb007_0002);

        let mut out = [0u8; 32];
        assert_eq!(nic.rpc_quiet(MC_CMD_GET_VERSION, &[], &mut out), Err(Error::Io));
        assert!(nic.last_reset().is_some());
        assert_eq!(nic.state(), ResetState::Probed);
    }

    #[test]
    fn test_remove_unregisters() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        nic.probe_netdev().unwrap();
        rig.host.clear_calls();

        nic.remove();
        assert_eq!(rig.host.calls(), [HostCall::Unregister, HostCall::RemoveCommon]);
    }
}
