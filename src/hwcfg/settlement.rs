//! Firmware settlement delay
//!
//! How long to wait after a successful bring-up before the controller is
//! considered ready.

use std::time::Duration;

/// Recommended delays per chip-name prefix. The `None` entry matches anything
/// and must stay last.
pub const FW_SETTLEMENT_TABLE: &[(Option<&str>, u32)] = &[(Some("BCM43241"), 200), (None, 100)];

/// Settlement delay for `chip_name`, or `override_ms` when configured.
pub fn settlement_delay(chip_name: &str, override_ms: Option<u32>) -> Duration {
    if let Some(ms) = override_ms {
        return Duration::from_millis(ms as u64);
    }

    let ms = FW_SETTLEMENT_TABLE
        .iter()
        .find(|(prefix, _)| prefix.map_or(true, |p| chip_name.starts_with(p)))
        .map(|(_, ms)| *ms)
        .unwrap_or(0);
    Duration::from_millis(ms as u64)
}
