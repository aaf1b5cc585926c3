//! # Host Interfaces
//!
//! Traits implemented by the embedding host. The control plane drives
//! these collaborators but never looks inside them.
//!
//! ## Trait Map
//!
//! ```text
//! Platform ─────── clock, sleep, current CPU
//! McdiRpc ──────── firmware request/response
//! NetDevice ────── net-device open/close/attach, offload limits
//! FilterTable ──── VLAN filters and RX mode
//! Representors ─── VF representor lifecycle
//! PortOps ──────── common probe, PHY, m-ports, TC, stats DMA
//! EventQueueOps ── event queue creation, channel scheduling
//! Datapath ─────── RX / TX completion paths
//! ```

use alloc::sync::Arc;
use core::time::Duration;

use crate::error::Result;
use crate::types::*;

// =============================================================================
// PLATFORM
// =============================================================================

/// Clock and scheduling services
pub trait Platform {
    /// Monotonic time
    fn now(&self) -> Timestamp;

    /// Block the calling context
    fn sleep(&self, duration: Duration);

    /// CPU executing the caller
    fn current_cpu(&self) -> u32 {
        0
    }
}

impl<T: Platform + ?Sized> Platform for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }

    fn current_cpu(&self) -> u32 {
        (**self).current_cpu()
    }
}

impl<T: Platform + ?Sized> Platform for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }

    fn current_cpu(&self) -> u32 {
        (**self).current_cpu()
    }
}

// =============================================================================
// FIRMWARE RPC
// =============================================================================

/// Firmware request/response channel
pub trait McdiRpc {
    /// Issue `cmd` with `inbuf`, copy the response into `outbuf`
    ///
    /// Returns the number of response bytes the firmware produced, which
    /// may exceed `outbuf.len()`.
    fn rpc(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8]) -> Result<usize>;

    /// Same as [`McdiRpc::rpc`] without logging failures
    fn rpc_quiet(&self, cmd: u16, inbuf: &[u8], outbuf: &mut [u8]) -> Result<usize> {
        self.rpc(cmd, inbuf, outbuf)
    }
}

// =============================================================================
// NETWORK STACK
// =============================================================================

/// Host network interface bound to this function
pub trait NetDevice {
    /// Register the interface with the network stack
    fn register(&self) -> Result<()>;

    /// Unregister the interface
    fn unregister(&self);

    /// Bring the interface up
    fn open(&self) -> Result<()>;

    /// Bring the interface down
    fn close(&self);

    /// Mark the device present again after a reset
    fn attach(&self);

    /// Set the current and permanent MAC address
    fn set_mac_address(&self, mac: MacAddress);

    /// Hardware TSO is usable
    fn enable_tso(&self);

    /// Largest GSO packet the stack may build
    fn set_gso_max_size(&self, max_size: u32);

    /// Most segments in one GSO packet
    fn set_gso_max_segs(&self, max_segs: u16);

    /// TC offload is usable
    fn enable_hw_tc(&self) {}
}

/// VLAN selector for filter insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVlan {
    /// Match frames regardless of VLAN tag
    Unspecified,
    /// Match one VLAN id
    Id(u16),
}

/// Receive filter table
pub trait FilterTable {
    /// Create the table
    fn probe(&self, rss_limited: bool, additional_rss: bool, encap: bool) -> Result<()>;

    /// Install the default filters for a VLAN
    fn add_vlan(&self, vlan: FilterVlan) -> Result<()>;

    /// Remove the default filters for a VLAN
    fn del_vlan(&self, vlan: FilterVlan);

    /// Remove every filter from hardware
    fn table_down(&self);

    /// Push the current RX mode (promiscuous, multicast list)
    fn sync_rx_mode(&self) {}
}

/// VF representor net devices
pub trait Representors {
    /// Reattach after reset
    fn attach(&self);

    /// Detach before reset
    fn detach(&self);

    /// Carrier on
    fn start(&self);

    /// Carrier off
    fn stop(&self);
}

// =============================================================================
// PORT AND PROBE SERVICES
// =============================================================================

/// m-port selector for MAE lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MportSelector {
    /// Physical network port
    Wire,
    /// Calling PF
    Uplink,
}

/// Port-level services the probe and reset paths call into
pub trait PortOps {
    /// Generic probe shared with other NIC families
    fn probe_common(&self) -> Result<()>;

    /// Undo [`PortOps::probe_common`]
    fn remove_common(&self) {}

    /// PCI function index
    fn pf_index(&self) -> Result<u32>;

    /// Physical port number
    fn port_number(&self) -> Result<u32>;

    /// Function holds the PRIMARY attach flag
    fn is_primary(&self) -> bool {
        false
    }

    /// Read PHY configuration into host state
    fn get_phy_cfg(&self) -> Result<()>;

    /// Push link settings to the PHY
    fn port_reconfigure(&self) -> Result<()>;

    /// Program MAC settings
    fn set_mac(&self) -> Result<()>;

    /// Program MTU only
    fn set_mtu(&self) -> Result<()>;

    /// Resolve an m-port id
    fn lookup_mport(&self, selector: MportSelector) -> Result<u32>;

    /// Initialise TC / MAE offload
    fn init_tc(&self) -> Result<()>;

    /// Ask firmware to DMA fresh MAC statistics
    fn pull_mac_stats(&self) -> Result<()>;

    /// Copy the latest MAC statistics DMA snapshot, one `u64` per MC stat
    fn copy_mac_stats(&self, dest: &mut [u64]) -> Result<()>;
}

// =============================================================================
// EVENT QUEUES
// =============================================================================

/// Event-queue services of the host
pub trait EventQueueOps {
    /// Create the hardware event queue for a channel
    fn init_evq(&self, channel: ChannelId, ring: DmaAddr, entries: u32) -> Result<()>;

    /// Queue the channel for event processing
    fn schedule_channel(&self, channel: ChannelId);
}

// =============================================================================
// DATAPATH
// =============================================================================

/// Receive and transmit completion paths fed by the event dispatcher
pub trait Datapath {
    /// Received-packets event
    fn rx_event(&self, channel: ChannelId, event: u64);

    /// Transmit completion event
    fn tx_event(&self, channel: ChannelId, event: u64);

    /// MCDI event not claimed by the request path
    ///
    /// Returns `None` when the event is not a port event, otherwise the
    /// work spent (negative on error), at most `quota`.
    fn port_event(&self, channel: ChannelId, event: u64, quota: u32) -> Option<i32> {
        let _ = (channel, event, quota);
        None
    }
}
