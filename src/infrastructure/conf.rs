//! Vendor configuration file (`bt_vendor.conf`)
//!
//! ```text
//! # comment
//! FwPatchFilePath = /vendor/firmware/
//! FwPatchFileName = 0123456789abcdef01.seq
//! FwPatchSettlementDelay = 200
//! ```

use crate::domain::settings::PatchSettings;
use crate::error::ConfigError;
use crate::patch::locator::PATH_MAX;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Longest accepted patch file name.
pub const NAME_MAX: usize = 255;

pub const KEY_PATCH_PATH: &str = "FwPatchFilePath";
pub const KEY_PATCH_NAME: &str = "FwPatchFileName";
pub const KEY_SETTLEMENT_DELAY: &str = "FwPatchSettlementDelay";

/// Apply one `key = value` entry to `settings`.
pub fn apply_entry(settings: &mut PatchSettings, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        KEY_PATCH_PATH => {
            if value.len() >= PATH_MAX {
                return Err(ConfigError::ValueTooLong {
                    key: KEY_PATCH_PATH,
                    max: PATH_MAX - 1,
                });
            }
            settings.patch_file_path = value.to_string();
        }
        KEY_PATCH_NAME => {
            if value.len() >= NAME_MAX {
                return Err(ConfigError::ValueTooLong {
                    key: KEY_PATCH_NAME,
                    max: NAME_MAX - 1,
                });
            }
            settings.patch_file_name = Some(value.to_string()).filter(|v| !v.is_empty());
        }
        KEY_SETTLEMENT_DELAY => {
            // Negative values mean "use the table", as in the vendor conf files
            let delay: i64 = value
                .parse()
                .map_err(|_| ConfigError::InvalidDelay(value.to_string()))?;
            settings.settlement_delay_ms = u32::try_from(delay).ok();
        }
        other => return Err(ConfigError::UnknownKey(other.to_string())),
    }
    Ok(())
}

/// Apply every entry of a conf file's text. Unknown keys are skipped with a warning.
pub fn apply_str(settings: &mut PatchSettings, text: &str) -> Result<(), ConfigError> {
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or(ConfigError::Malformed { line: idx + 1 })?;

        match apply_entry(settings, key.trim(), value.trim()) {
            Ok(()) => {}
            Err(ConfigError::UnknownKey(key)) => warn!("Ignoring unknown conf key {}", key),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Read and apply a conf file.
pub fn load_file(settings: &mut PatchSettings, path: &Path) -> Result<(), ConfigError> {
    let text = fs::read_to_string(path)?;
    apply_str(settings, &text)?;
    info!("Loaded vendor conf {}", path.display());
    Ok(())
}
