//! # Filter Table
//!
//! Default RX filters for the untagged and "any VLAN" cases. The table
//! is brought up with the net device and torn down around full resets.

use efx_core::{CapabilityState, Error, FilterTable, FilterVlan, Flags1, Result};
use efx_hal::RegisterIo;

use crate::nic::{Host, Nic, NicVariant};

/// Filter-table state guarded by the filter lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterState {
    up: bool,
}

impl FilterState {
    /// Default filters installed
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Install the default filters; no-op when already up
    ///
    /// On failure everything installed so far is removed again.
    pub fn up<F: FilterTable + ?Sized>(&mut self, table: &F) -> Result<()> {
        if self.up {
            return Ok(());
        }

        if let Err(e) = table.add_vlan(FilterVlan::Unspecified) {
            table.table_down();
            return Err(e);
        }
        if let Err(e) = table.add_vlan(FilterVlan::Id(0)) {
            table.del_vlan(FilterVlan::Unspecified);
            table.table_down();
            return Err(e);
        }

        self.up = true;
        Ok(())
    }

    /// Remove the default filters and the table; no-op when already down
    pub fn down<F: FilterTable + ?Sized>(&mut self, table: &F) {
        if !self.up {
            return;
        }

        table.del_vlan(FilterVlan::Id(0));
        table.del_vlan(FilterVlan::Unspecified);
        table.table_down();
        self.up = false;
    }
}

/// Create the filter table with the RSS and encapsulation features the
/// firmware reported
pub fn filter_table_probe<F: FilterTable + ?Sized>(table: &F, caps: &CapabilityState) -> Result<()> {
    table.probe(
        caps.flags1.contains(Flags1::RX_RSS_LIMITED),
        caps.flags1.contains(Flags1::ADDITIONAL_RSS_MODES),
        caps.flags1.contains(Flags1::VXLAN_NVGRE),
    )
}

impl<V: NicVariant, R: RegisterIo + Clone, H: Host> Nic<V, R, H> {
    /// Create the host filter table
    pub fn filter_table_probe(&self) -> Result<()> {
        let caps = self.caps().ok_or(Error::InvalidState)?;
        filter_table_probe(&*self.host, caps)
    }

    /// Install the default filters under the filter lock
    pub fn filter_table_up(&self) -> Result<()> {
        self.filters.write().up(&*self.host)
    }

    /// Remove the default filters under the filter lock
    pub fn filter_table_down(&self) {
        self.filters.write().down(&*self.host);
    }

    /// Default filters are installed
    pub fn filters_up(&self) -> bool {
        self.filters.read().is_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, HostCall};
    use efx_core::Error;

    #[test]
    fn test_up_and_down_are_idempotent() {
        let host = FakeHost::new();
        let mut state = FilterState::default();

        state.up(&host).unwrap();
        state.up(&host).unwrap();
        assert!(state.is_up());
        assert_eq!(
            host.calls(),
            [
                HostCall::AddVlan(FilterVlan::Unspecified),
                HostCall::AddVlan(FilterVlan::Id(0)),
            ]
        );

        host.clear_calls();
        state.down(&host);
        state.down(&host);
        assert!(!state.is_up());
        assert_eq!(
            host.calls(),
            [
                HostCall::DelVlan(FilterVlan::Id(0)),
                HostCall::DelVlan(FilterVlan::Unspecified),
                HostCall::TableDown,
            ]
        );
    }

    #[test]
    fn test_second_vlan_failure_rolls_back() {
        let host = FakeHost::new();
        host.fail("add_vlan", Error::OutOfMemory);
        let mut state = FilterState::default();

        assert_eq!(state.up(&host), Err(Error::OutOfMemory));
        assert!(!state.is_up());
        assert_eq!(
            host.calls(),
            [
                HostCall::AddVlan(FilterVlan::Unspecified),
                HostCall::AddVlan(FilterVlan::Id(0)),
                HostCall::DelVlan(FilterVlan::Unspecified),
                HostCall::TableDown,
            ]
        );
    }

    #[test]
    fn test_first_vlan_failure_tears_down() {
        let host = FakeHost::new();
        host.fail("add_vlan_unspec", Error::Busy);
        let mut state = FilterState::default();

        assert_eq!(state.up(&host), Err(Error::Busy));
        assert_eq!(
            host.calls(),
            [HostCall::AddVlan(FilterVlan::Unspecified), HostCall::TableDown]
        );
    }

    #[test]
    fn test_probe_passes_caps() {
        let host = FakeHost::new();
        let caps = CapabilityState {
            flags1: Flags1::RX_RSS_LIMITED | Flags1::VXLAN_NVGRE,
            ..Default::default()
        };
        filter_table_probe(&host, &caps).unwrap();
        assert!(host.called(HostCall::FilterProbe(true, false, true)));
    }

    #[test]
    fn test_nic_filter_table() {
        let rig = crate::nic::tests::Rig::new();
        let nic = rig.probe::<crate::nic::Pf>().unwrap();

        nic.filter_table_probe().unwrap();
        assert!(rig.host.called(HostCall::FilterProbe(false, false, false)));

        nic.filter_table_up().unwrap();
        assert!(nic.filters_up());
        nic.filter_table_down();
        assert!(!nic.filters_up());
    }
}
