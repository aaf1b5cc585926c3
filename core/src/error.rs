//! # EFX Error Handling
//!
//! Error types shared by every crate of the control plane.
//!
//! - Errors are `Copy` and carry no allocation
//! - No panics in production code paths
//! - Firmware error codes are preserved when they have no local meaning

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// EFX Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// EFX unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Resource is busy (no free message slot, lock contention)
    Busy,
    /// Invalid parameter provided
    InvalidParameter,
    /// Operation not supported by this function or firmware
    NotSupported,
    /// Operation refused by firmware policy
    PermissionDenied,
    /// Operation timed out
    Timeout,
    /// Operation not valid in the current device state
    InvalidState,

    // =========================================================================
    // Hardware / Protocol Errors
    // =========================================================================
    /// Hardware reported something incompatible with this driver
    Unsupported,
    /// Malformed data from hardware or firmware
    Io,
    /// Device registers read as all-ones
    HardwareUnavailable,

    // =========================================================================
    // Memory Errors
    // =========================================================================
    /// DMA or heap allocation failed
    OutOfMemory,
    /// Message does not fit the destination buffer
    BufferOverflow,

    // =========================================================================
    // Firmware Errors
    // =========================================================================
    /// Firmware returned an error without a local equivalent
    Firmware(McdiErrorCode),
}

impl Error {
    /// Map a firmware error code onto the local taxonomy
    pub fn from_mcdi(code: u32) -> Self {
        match McdiErrorCode(code) {
            McdiErrorCode::EPERM | McdiErrorCode::EACCES => Self::PermissionDenied,
            McdiErrorCode::EBUSY | McdiErrorCode::EAGAIN => Self::Busy,
            McdiErrorCode::EINVAL | McdiErrorCode::ERANGE => Self::InvalidParameter,
            McdiErrorCode::ENOSYS | McdiErrorCode::ENOTSUP => Self::NotSupported,
            McdiErrorCode::ETIME => Self::Timeout,
            code => Self::Firmware(code),
        }
    }

    /// Device is (at least temporarily) gone
    pub fn is_hardware_unavailable(&self) -> bool {
        matches!(self, Self::HardwareUnavailable)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "resource busy"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NotSupported => write!(f, "operation not supported"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::InvalidState => write!(f, "invalid device state"),
            Self::Unsupported => write!(f, "unsupported hardware"),
            Self::Io => write!(f, "I/O error"),
            Self::HardwareUnavailable => write!(f, "hardware unavailable"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::BufferOverflow => write!(f, "buffer overflow"),
            Self::Firmware(code) => write!(f, "firmware error: {}", code),
        }
    }
}

// =============================================================================
// FIRMWARE ERROR CODES
// =============================================================================

/// Raw MCDI error code as returned in an error response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct McdiErrorCode(pub u32);

impl McdiErrorCode {
    /// Operation not permitted
    pub const EPERM: Self = Self(1);
    /// Not found
    pub const ENOENT: Self = Self(2);
    /// Interrupted
    pub const EINTR: Self = Self(4);
    /// Try again
    pub const EAGAIN: Self = Self(11);
    /// Permission denied
    pub const EACCES: Self = Self(13);
    /// Busy
    pub const EBUSY: Self = Self(16);
    /// Invalid argument
    pub const EINVAL: Self = Self(22);
    /// Out of range
    pub const ERANGE: Self = Self(34);
    /// Deadlock
    pub const EDEADLK: Self = Self(35);
    /// Not implemented
    pub const ENOSYS: Self = Self(38);
    /// Timer expired
    pub const ETIME: Self = Self(62);
    /// Link has been severed
    pub const ENOLINK: Self = Self(67);
    /// Not supported
    pub const ENOTSUP: Self = Self(95);
    /// Operation already in progress
    pub const EALREADY: Self = Self(114);
}

impl fmt::Display for McdiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MC_CMD_ERR {}", self.0)
    }
}

impl From<McdiErrorCode> for Error {
    fn from(code: McdiErrorCode) -> Self {
        Error::from_mcdi(code.0)
    }
}
