//! # Device Operations
//!
//! The operation table the surrounding driver calls into. It is
//! implemented once for [`Nic`] and specialised per hardware variant
//! through the [`NicVariant`] parameter.

use alloc::sync::Arc;
use alloc::vec;
use core::time::Duration;

use arrayvec::ArrayVec;

use efx_core::{
    CapsWord, ChannelId, Error, McdiRpc, Platform, PortOps, ResetOutcome, ResetState, ResetType,
    Result,
};
use efx_eventq::Channel;
use efx_hal::{DmaAllocator, RegisterIo};
use efx_mcdi::{McdiTransport, RebootStatus};

use crate::nic::{Host, Nic, NicVariant, ProbeConfig};
use crate::reset;
use crate::selftest;
use crate::stats::{self, mac_stats_len, StatsReport, EF100_STAT_COUNT};

/// Operations of an EF100 function
pub trait NicOps: McdiRpc {
    /// Register access
    type Regs: RegisterIo + Clone;
    /// Host collaborators
    type Host: Host;

    /// Bring up a function
    fn probe(
        regs: Self::Regs,
        host: Arc<Self::Host>,
        dma: &dyn DmaAllocator,
        config: ProbeConfig,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Tear the function down
    fn remove(self)
    where
        Self: Sized;

    /// Variant name
    fn name(&self) -> &'static str;

    /// Current device state
    fn state(&self) -> ResetState;

    // -------------------------------------------------------------------------
    // Reset
    // -------------------------------------------------------------------------

    /// Reset type used to recover from `reason`
    fn map_reset_reason(&self, reason: ResetType) -> ResetType;

    /// Reset type for an ethtool request; consumed bits are cleared
    fn map_reset_flags(&self, flags: &mut u32) -> Result<ResetType>;

    /// Reset the function
    fn reset(&self, reset_type: ResetType) -> Result<ResetOutcome>;

    // -------------------------------------------------------------------------
    // MCDI
    // -------------------------------------------------------------------------

    /// Test a firmware capability bit
    fn check_caps(&self, flag: u32, word: CapsWord) -> bool;

    /// Message transport
    fn mcdi_transport(&self) -> &McdiTransport<Self::Regs>;

    /// Timeout budget for `cmd`
    fn mcdi_rpc_timeout(&self, cmd: u16) -> Duration;

    /// Current firmware warm boot count
    fn mcdi_get_warm_boot_count(&self) -> Result<u16>;

    /// Check whether the MC restarted
    fn mcdi_poll_reboot(&self) -> Result<RebootStatus>;

    /// Note that an MC reboot was handled
    fn mcdi_reboot_detected(&self);

    // -------------------------------------------------------------------------
    // Events and interrupts
    // -------------------------------------------------------------------------

    /// Allocate an event queue of `entries` events
    fn ev_probe(&self, id: ChannelId, entries: u32, dma: &dyn DmaAllocator) -> Result<Channel>;

    /// Reset a channel and create its queue
    fn ev_init(&self, channel: &mut Channel) -> Result<()>;

    /// Drain up to `quota` units of work from a channel
    fn ev_process(&self, channel: &mut Channel, quota: u32) -> u32;

    /// An MCDI event is waiting on a channel
    fn ev_mcdi_pending(&self, channel: &Channel) -> bool;

    /// Re-arm a channel
    fn ev_read_ack(&self, channel: &Channel);

    /// MSI vector `index` fired
    fn irq_handle_msi(&self, index: u32) -> bool;

    /// Raise a test interrupt
    fn irq_test_generate(&self) -> Result<()>;

    /// Post a test event to a channel
    fn ev_test_generate(&self, channel: ChannelId);

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    /// Names of the reported statistics
    fn describe_stats(&self) -> ArrayVec<&'static str, EF100_STAT_COUNT>;

    /// Fold the latest MAC statistics into the reported values
    fn update_stats(&self) -> Result<StatsReport>;

    /// Trigger a MAC statistics DMA, taking the baseline the first time
    fn pull_stats(&self) -> Result<()>;
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> Nic<V, R, H> {
    fn mac_stats_snapshot(&self) -> Result<vec::Vec<u64>> {
        let num = self.caps().map_or(0, |c| c.mac_stats_num);
        let mut snapshot = vec![0u64; mac_stats_len(num)];
        self.host.copy_mac_stats(&mut snapshot)?;
        Ok(snapshot)
    }
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> NicOps for Nic<V, R, H> {
    type Regs = R;
    type Host = H;

    fn probe(regs: R, host: Arc<H>, dma: &dyn DmaAllocator, config: ProbeConfig) -> Result<Self> {
        Nic::probe(regs, host, dma, config)
    }

    fn remove(self) {
        Nic::remove(self)
    }

    fn name(&self) -> &'static str {
        V::NAME
    }

    fn state(&self) -> ResetState {
        Nic::state(self)
    }

    fn map_reset_reason(&self, reason: ResetType) -> ResetType {
        reset::map_reset_reason(reason)
    }

    fn map_reset_flags(&self, flags: &mut u32) -> Result<ResetType> {
        reset::map_reset_flags(flags)
    }

    fn reset(&self, reset_type: ResetType) -> Result<ResetOutcome> {
        Nic::reset(self, reset_type)
    }

    fn check_caps(&self, flag: u32, word: CapsWord) -> bool {
        self.caps().is_some_and(|caps| caps.check(flag, word))
    }

    fn mcdi_transport(&self) -> &McdiTransport<R> {
        self.mcdi.transport()
    }

    fn mcdi_rpc_timeout(&self, cmd: u16) -> Duration {
        self.mcdi.config().timeout_for(cmd)
    }

    fn mcdi_get_warm_boot_count(&self) -> Result<u16> {
        self.mcdi.transport().warm_boot_count()
    }

    fn mcdi_poll_reboot(&self) -> Result<RebootStatus> {
        let status = self.mcdi.poll_reboot();
        self.sync_mcdi_state();
        status
    }

    fn mcdi_reboot_detected(&self) {
        *self.last_reset.lock() = Some(self.host.now());
    }

    fn ev_probe(&self, id: ChannelId, entries: u32, dma: &dyn DmaAllocator) -> Result<Channel> {
        if id.index() >= self.config.channels {
            return Err(Error::InvalidParameter);
        }
        Channel::probe(id, entries, dma)
    }

    fn ev_init(&self, channel: &mut Channel) -> Result<()> {
        self.dispatcher.ev_init(channel, &*self.host)
    }

    fn ev_process(&self, channel: &mut Channel, quota: u32) -> u32 {
        self.dispatcher.process(channel, quota, &self.event_handler())
    }

    fn ev_mcdi_pending(&self, channel: &Channel) -> bool {
        self.dispatcher.mcdi_pending(channel)
    }

    fn ev_read_ack(&self, channel: &Channel) {
        self.dispatcher.read_ack(channel);
    }

    fn irq_handle_msi(&self, index: u32) -> bool {
        self.irq.msi_interrupt(index, &*self.host)
    }

    fn irq_test_generate(&self) -> Result<()> {
        selftest::irq_test_generate(self, self.irq.level())
    }

    fn ev_test_generate(&self, channel: ChannelId) {
        selftest::ev_test_generate(self, channel);
    }

    fn describe_stats(&self) -> ArrayVec<&'static str, EF100_STAT_COUNT> {
        stats::describe_stats()
    }

    fn update_stats(&self) -> Result<StatsReport> {
        let snapshot = self.mac_stats_snapshot()?;
        let mut stats = self.stats.lock();
        stats.update(&snapshot);
        Ok(StatsReport {
            full: stats.full_stats(),
            link: stats.link_stats(),
        })
    }

    fn pull_stats(&self) -> Result<()> {
        self.host.pull_mac_stats()?;
        let mut stats = self.stats.lock();
        if !stats.is_initialised() {
            let snapshot = self.mac_stats_snapshot()?;
            stats.reset(&snapshot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nic::tests::{Rig, TestNic};
    use crate::nic::{Pf, Vf};
    use crate::stats::StatId;
    use crate::testing::HostCall;
    use efx_core::{Flags1, McdiErrorCode};
    use efx_eventq::event::ev_type;
    use efx_eventq::Event;
    use efx_hal::{regs, HeapDmaAllocator};
    use efx_mcdi::protocol::{
        event_code, mac_stats::MC_CMD_MAC_NSTATS_MIN, MC_CMD_DRIVER_EVENT, MC_CMD_NVRAM_ERASE,
        MC_CMD_TRIGGER_INTERRUPT,
    };

    fn channel(nic: &TestNic<Pf>, id: u16, entries: u32) -> Channel {
        let mut channel = nic.ev_probe(ChannelId(id), entries, &HeapDmaAllocator).unwrap();
        nic.ev_init(&mut channel).unwrap();
        channel.enable();
        channel
    }

    fn ops<N: NicOps>(nic: &N) -> &N {
        nic
    }

    #[test]
    fn test_identity_and_caps() {
        let rig = Rig::new();
        let nic = rig.probe::<Vf>().unwrap();
        let nic = ops(&nic);

        assert_eq!(nic.name(), "EF100 VF");
        assert_eq!(NicOps::state(nic), ResetState::Probed);
        assert!(nic.check_caps(Flags1::SET_MAC_ENHANCED.bits().trailing_zeros(), CapsWord::Flags1));
        assert!(nic.check_caps(30, CapsWord::Flags2));
        assert!(!nic.check_caps(0, CapsWord::Flags1));
    }

    #[test]
    fn test_rpc_timeouts() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        assert_eq!(nic.mcdi_rpc_timeout(MC_CMD_DRIVER_EVENT), Duration::from_secs(10));
        assert_eq!(nic.mcdi_rpc_timeout(MC_CMD_NVRAM_ERASE), Duration::from_secs(60));
    }

    #[test]
    fn test_reboot_detection() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        assert_eq!(nic.mcdi_poll_reboot(), Ok(RebootStatus::NoChange));
        assert_eq!(nic.last_reset(), None);

        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, 0xb007_0002);
        assert_eq!(nic.mcdi_get_warm_boot_count(), Ok(2));
        assert_eq!(nic.mcdi_poll_reboot(), Ok(RebootStatus::Rebooted));
        assert!(nic.last_reset().is_some());
        assert_eq!(nic.mcdi_poll_reboot(), Ok(RebootStatus::NoChange));
    }

    #[test]
    fn test_hardware_unavailable_disables() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, u32::MAX);
        assert_eq!(nic.mcdi_poll_reboot(), Ok(RebootStatus::NoChange));
        assert_eq!(NicOps::state(&nic), ResetState::Disabled);
    }

    #[test]
    fn test_bad_status_magic() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, 0x1234_0001);
        assert_eq!(nic.mcdi_poll_reboot(), Err(Error::Io));
    }

    #[test]
    fn test_ev_probe_bounds() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        assert_eq!(
            nic.ev_probe(ChannelId(32), 8, &HeapDmaAllocator).err(),
            Some(Error::InvalidParameter)
        );
        assert_eq!(
            nic.ev_probe(ChannelId(0), 6, &HeapDmaAllocator).err(),
            Some(Error::InvalidParameter)
        );
    }

    #[test]
    fn test_ev_process_routes_events() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        let mut ch = channel(&nic, 3, 8);
        assert!(rig.host.called(HostCall::InitEvq(ChannelId(3), 8)));

        let cmddone = 0x03u64 << 44;
        let unclaimed = 0x04u64 << 44;
        ch.ring().write(0, Event::new(ev_type::RX_PKTS, false, 0)).unwrap();
        ch.ring().write(1, Event::new(ev_type::TX_COMPLETION, false, 0)).unwrap();
        ch.ring().write(2, Event::new(ev_type::MCDI, false, cmddone)).unwrap();
        ch.ring().write(3, Event::new(ev_type::MCDI, false, unclaimed)).unwrap();
        ch.ring().write(4, Event::driver(selftest::EFX_EF100_TEST)).unwrap();

        assert!(nic.ev_mcdi_pending(&ch));
        rig.host.clear_calls();

        assert_eq!(nic.ev_process(&mut ch, 16), 1);
        assert_eq!(ch.read_ptr(), 5);
        assert_eq!(
            rig.host.calls(),
            [HostCall::Rx(ChannelId(3)), HostCall::Tx(ChannelId(3))]
        );
        assert!(!nic.ev_mcdi_pending(&ch));

        nic.ev_read_ack(&ch);
        let prime = rig.sim.writes_to(regs::ER_GZ_EVQ_INT_PRIME);
        assert_eq!(prime.len(), 1);
        assert_eq!(regs::ERF_GZ_EVQ_ID.get32(prime[0]), 3);
        assert_eq!(regs::ERF_GZ_IDX.get32(prime[0]), 5);
    }

    #[test]
    fn test_reboot_event_runs_recovery() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        let mut ch = channel(&nic, 0, 8);
        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, 0xb007_0002);
        let reboot = (event_code::REBOOT as u64) << 44;
        ch.ring().write(0, Event::new(ev_type::MCDI, false, reboot)).unwrap();
        rig.host.clear_calls();

        assert_eq!(nic.ev_process(&mut ch, 8), 0);
        assert_eq!(ch.read_ptr(), 1);
        assert!(!nic.mcdi().reboot_pending());
        assert_eq!(nic.mcdi_transport().lock().warm_boot_count(), 2);
        assert!(nic.last_reset().is_some());
        assert_eq!(NicOps::state(&nic), ResetState::Probed);
        assert_eq!(ch.stats().mcdi, 1);
        assert_eq!(ch.stats().unhandled, 0);
    }

    #[test]
    fn test_reboot_event_while_unavailable_disables() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        let mut ch = channel(&nic, 0, 8);
        rig.sim.set(regs::ER_GZ_MC_SFT_STATUS, u32::MAX);
        let reboot = (event_code::MC_REBOOT as u64) << 44;
        ch.ring().write(0, Event::new(ev_type::MCDI, false, reboot)).unwrap();

        nic.ev_process(&mut ch, 8);
        assert_eq!(NicOps::state(&nic), ResetState::Disabled);
        assert_eq!(nic.last_reset(), None);
    }

    #[test]
    fn test_ev_process_respects_quota() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        let mut ch = channel(&nic, 0, 4);

        for i in 0..4 {
            ch.ring().write(i, Event::new(ev_type::RX_PKTS, false, 0)).unwrap();
        }
        assert_eq!(nic.ev_process(&mut ch, 3), 3);
        assert_eq!(ch.read_ptr(), 3);
        assert_eq!(nic.ev_process(&mut ch, 10), 1);
        assert_eq!(ch.read_ptr(), 4);
        assert!(nic.dispatcher().phases().test(ChannelId(0)));
    }

    #[test]
    fn test_disabled_channel_is_skipped() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        let mut ch = channel(&nic, 1, 4);
        ch.ring().write(0, Event::new(ev_type::MCDI, false, 0x03u64 << 44)).unwrap();

        ch.disable();
        assert!(!nic.ev_mcdi_pending(&ch));
        assert_eq!(nic.ev_process(&mut ch, 4), 0);
        assert_eq!(ch.read_ptr(), 0);
    }

    #[test]
    fn test_self_test_generators() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();

        nic.irq_test_generate().unwrap();
        assert_eq!(
            rig.rpc.requests_for(MC_CMD_TRIGGER_INTERRUPT),
            [alloc::vec![0u8, 0, 0, 0]]
        );

        nic.ev_test_generate(ChannelId(2));
        let sent = rig.rpc.requests_for(MC_CMD_DRIVER_EVENT);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0], 2);

        rig.rpc.fail(MC_CMD_TRIGGER_INTERRUPT, McdiErrorCode::EPERM);
        assert_eq!(nic.irq_test_generate(), Err(Error::PermissionDenied));
    }

    #[test]
    fn test_msi_through_ops() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        rig.host.set_cpu(4);
        rig.host.clear_calls();

        assert!(nic.irq_handle_msi(0));
        assert!(rig.host.calls().is_empty());

        nic.irq().set_soft_enabled(true);
        assert!(nic.irq_handle_msi(0));
        assert_eq!(nic.irq().last_irq_cpu(), Some(4));
        assert_eq!(rig.host.calls(), [HostCall::ScheduleChannel(ChannelId(0))]);
    }

    #[test]
    fn test_stats_pull_and_update() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        assert_eq!(nic.describe_stats().len(), nic.update_stats().unwrap().full.len());

        let rx_packets = stats::EF100_STAT_DESC[StatId::PortRxPackets as usize].source;
        let stats::StatSource::Dma(offset) = rx_packets else {
            panic!("rx packets is a DMA statistic");
        };

        let mut snapshot = alloc::vec![0u64; 94];
        snapshot[offset] = 100;
        rig.host.set_mac_stats(&snapshot);
        nic.pull_stats().unwrap();
        assert!(rig.host.called(HostCall::PullMacStats));

        snapshot[offset] = 142;
        rig.host.set_mac_stats(&snapshot);
        nic.pull_stats().unwrap();
        let report = nic.update_stats().unwrap();
        assert_eq!(report.link.rx_packets, 42);
    }

    #[test]
    fn test_stats_snapshot_covers_minimum() {
        let rig = Rig::new();
        rig.rpc.reply(efx_mcdi::protocol::MC_CMD_GET_CAPABILITIES, &[0; 78]);
        let nic = rig.probe::<Pf>().unwrap();

        assert_eq!(nic.mac_stats_snapshot().unwrap().len(), MC_CMD_MAC_NSTATS_MIN);
    }

    #[test]
    fn test_pull_stats_failure() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        rig.host.fail("pull_mac_stats", Error::Timeout);

        assert_eq!(nic.pull_stats(), Err(Error::Timeout));
        assert!(!nic.stats.lock().is_initialised());
    }

    #[test]
    fn test_reset_through_ops() {
        let rig = Rig::new();
        let nic = rig.probe::<Pf>().unwrap();
        let nic = ops(&nic);

        let mut flags = 0x0060_0000;
        let reset_type = nic.map_reset_flags(&mut flags).unwrap();
        assert_eq!(flags, 0);
        assert_eq!(nic.map_reset_reason(ResetType::McdiTimeout), ResetType::Disable);
        assert_eq!(NicOps::reset(nic, reset_type), Ok(ResetOutcome::Completed));
    }
}
