//! # Firmware Version
//!
//! Retrieval and ordering of dotted four-part firmware versions.

use core::cmp::Ordering;
use core::fmt::Write;

use efx_core::McdiRpc;
use efx_mcdi::protocol::{get_version, read_word, MC_CMD_GET_VERSION};

/// Longest rendered version string
pub const FW_VERSION_LEN: usize = 32;

/// Rendered firmware version
pub type FwVersion = heapless::String<FW_VERSION_LEN>;

/// Read the running firmware version as `a.b.c.d`
///
/// Returns an empty string when the firmware does not answer; an empty
/// version sorts below every well-formed one.
pub fn read_fw_version<M: McdiRpc + ?Sized>(mcdi: &M) -> FwVersion {
    let mut out = [0u8; get_version::OUT_LEN];
    let mut version = FwVersion::new();

    let len = match mcdi.rpc(MC_CMD_GET_VERSION, &[], &mut out) {
        Ok(len) => len,
        Err(_) => return version,
    };
    if len < get_version::OUT_MIN_LEN {
        log::error!("EF100: GET_VERSION response too short ({} bytes)", len);
        return version;
    }

    let ofst = get_version::OUT_VERSION_OFST;
    let rendered = write!(
        version,
        "{}.{}.{}.{}",
        read_word(&out, ofst),
        read_word(&out, ofst + 2),
        read_word(&out, ofst + 4),
        read_word(&out, ofst + 6)
    );
    if rendered.is_err() {
        version.clear();
    }
    version
}

fn parse(version: &str) -> Option<[u32; 4]> {
    let mut parts = [0u32; 4];
    let mut fields = version.split('.');
    for part in parts.iter_mut() {
        *part = fields.next()?.parse().ok()?;
    }
    if fields.next().is_some() {
        return None;
    }
    Some(parts)
}

/// Order two dotted versions
///
/// A well-formed version is newer than a malformed one; two malformed
/// versions compare equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
