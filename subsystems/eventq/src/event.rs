//! # Event Descriptors
//!
//! Layout of the 8-byte entries written by the device into an event ring.

use core::fmt;

use efx_hal::BitField;

// =============================================================================
// FIELD LAYOUT
// =============================================================================

/// Event type tag
pub const ESF_GZ_E_TYPE: BitField = BitField::new(60, 4);
/// Phase bit of an RX packets event
pub const ESF_GZ_EV_RXPKTS_PHASE: BitField = BitField::new(59, 1);
/// Phase bit of a TX completion event
pub const ESF_GZ_EV_TXCMPL_PHASE: BitField = BitField::new(59, 1);
/// Payload of a driver-generated event
pub const ESF_GZ_DRIVER_DATA: BitField = BitField::new(0, 59);

// The dispatcher reads the phase before it knows the event type
static_assertions::const_assert_eq!(ESF_GZ_EV_RXPKTS_PHASE.lbn, ESF_GZ_EV_TXCMPL_PHASE.lbn);

/// Size of one ring entry in bytes
pub const EVENT_SIZE: usize = 8;

/// Event type codes
pub mod ev_type {
    /// Received packets
    pub const RX_PKTS: u8 = 1;
    /// Transmit completion
    pub const TX_COMPLETION: u8 = 2;
    /// Transmit timestamp
    pub const TX_TIMESTAMP: u8 = 3;
    /// Management-controller event
    pub const MCDI: u8 = 4;
    /// Driver-generated event
    pub const DRIVER: u8 = 5;
}

// =============================================================================
// EVENT
// =============================================================================

/// Classified event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Received packets
    RxPkts,
    /// Transmit completion
    TxCompletion,
    /// Transmit timestamp
    TxTimestamp,
    /// Management-controller event
    Mcdi,
    /// Driver-generated event
    Driver,
    /// Anything else
    Unknown(u8),
}

impl From<u8> for EventType {
    fn from(code: u8) -> Self {
        match code {
            ev_type::RX_PKTS => Self::RxPkts,
            ev_type::TX_COMPLETION => Self::TxCompletion,
            ev_type::TX_TIMESTAMP => Self::TxTimestamp,
            ev_type::MCDI => Self::Mcdi,
            ev_type::DRIVER => Self::Driver,
            other => Self::Unknown(other),
        }
    }
}

/// One raw event ring entry
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Event(pub u64);

impl Event {
    /// Raw type tag
    pub const fn type_code(self) -> u8 {
        ESF_GZ_E_TYPE.get(self.0) as u8
    }

    /// Classified type
    pub fn event_type(self) -> EventType {
        EventType::from(self.type_code())
    }

    /// Phase bit
    pub const fn phase(self) -> bool {
        ESF_GZ_EV_RXPKTS_PHASE.is_set(self.0)
    }

    /// Build an event from a type tag, phase and payload
    pub const fn new(code: u8, phase: bool, data: u64) -> Self {
        let mut raw = ESF_GZ_E_TYPE.set(0, code as u64);
        raw = ESF_GZ_EV_RXPKTS_PHASE.set(raw, phase as u64);
        Self(ESF_GZ_DRIVER_DATA.set(raw, data))
    }

    /// Driver event carrying `data`, as posted with DRIVER_EVENT
    pub const fn driver(data: u64) -> Self {
        Self::new(ev_type::DRIVER, false, data)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({:#018x})", self.0)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}", (self.0 >> 32) as u32, self.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_fields() {
        let ev = Event::new(ev_type::MCDI, true, 0x1234);
        assert_eq!(ev.event_type(), EventType::Mcdi);
        assert!(ev.phase());
        assert_eq!(ESF_GZ_DRIVER_DATA.get(ev.0), 0x1234);
        assert_eq!(ev.0 >> 60, 4);
        assert_eq!((ev.0 >> 59) & 1, 1);
    }

    #[test]
    fn test_unknown_type() {
        let ev = Event(0xf << 60);
        assert_eq!(ev.event_type(), EventType::Unknown(0xf));
        assert!(!ev.phase());
    }

    #[test]
    fn test_driver_event() {
        let ev = Event::driver(1);
        assert_eq!(ev.event_type(), EventType::Driver);
        assert_eq!(ev.0, (5u64 << 60) | 1);
    }
}
