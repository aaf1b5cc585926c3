//! # BAR Configuration
//!
//! Text form of the function's BAR personality, as read and written
//! through the `bar_config` device attribute.

use efx_core::{BarConfig, Error, Result};

const KEYWORDS: [(&str, BarConfig); 3] = [
    ("ef100", BarConfig::Ef100),
    ("vdpa", BarConfig::Vdpa),
    ("none", BarConfig::None),
];

/// Attribute text for `config`
pub fn show(config: BarConfig) -> &'static str {
    match config {
        BarConfig::Ef100 => "EF100\n",
        BarConfig::Vdpa => "vDPA\n",
        BarConfig::None => "None\n",
    }
}

/// Parse attribute input
///
/// At most `keyword.len()` leading bytes are compared, case-insensitively,
/// so any prefix of a keyword (or a keyword followed by a newline) selects
/// it. Keywords are tried in order.
pub fn parse(input: &[u8]) -> Result<BarConfig> {
    KEYWORDS
        .iter()
        .find(|(keyword, _)| {
            let n = input.len().min(keyword.len());
            input[..n].eq_ignore_ascii_case(&keyword.as_bytes()[..n])
        })
        .map(|(_, config)| *config)
        .ok_or(Error::Io)
}
