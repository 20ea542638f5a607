//! Patch Locator
//!
//! Finds the patch file for a chip, either from an explicit filename override
//! or by scanning the patch directory for `<chip_id>*.seq`.

use crate::domain::settings::PatchSettings;
use crate::error::LocateError;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Reserved patch file extension (matched case-insensitively).
pub const FW_PATCHFILE_EXTENSION: &str = ".seq";

/// Longest accepted patch path.
pub const PATH_MAX: usize = 4096;

/// Locates patch files under a configured directory.
#[derive(Debug, Clone)]
pub struct PatchLocator {
    dir: PathBuf,
    file_name: Option<String>,
}

impl PatchLocator {
    pub fn new(dir: impl Into<PathBuf>, file_name: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.filter(|name| !name.is_empty()),
        }
    }

    pub fn from_settings(settings: &PatchSettings) -> Self {
        Self::new(&settings.patch_file_path, settings.patch_file_name.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the patch file for `chip_id`, or `None` (logged) if there is none.
    pub fn locate(&self, chip_id: &str) -> Option<PathBuf> {
        match self.try_locate(chip_id) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    /// Like [`locate`](Self::locate) but reports why nothing was found.
    pub fn try_locate(&self, chip_id: &str) -> Result<PathBuf, LocateError> {
        debug!("Target name = [{}]", chip_id);

        // The override is used as-is; a missing file surfaces when it is opened
        if let Some(name) = &self.file_name {
            let path = self.dir.join(name);
            info!("FW patchfile: {}", path.display());
            return Ok(path);
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| LocateError::DirectoryUnreadable {
            path: self.dir.clone(),
            source,
        })?;
        let names = entries.filter_map(|entry| entry.ok().map(|e| e.file_name()));

        let name = select_entry(names, chip_id).ok_or_else(|| LocateError::NotFound {
            chip_id: chip_id.to_string(),
            dir: self.dir.clone(),
        })?;

        let path = self.dir.join(&name);
        info!("Found patchfile: {}", path.display());

        if path.as_os_str().len() > PATH_MAX - 2 {
            return Err(LocateError::PathTooLong(path));
        }
        Ok(path)
    }
}

/// First name starting with `chip_id` and ending with [`FW_PATCHFILE_EXTENSION`],
/// both compared ASCII case-insensitively.
///
/// Order is whatever `names` yields; with several candidates the choice is
/// arbitrary.
pub fn select_entry<I>(names: I, chip_id: &str) -> Option<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    names.into_iter().find(|name| {
        let bytes = name.as_encoded_bytes();
        starts_with_ignore_case(bytes, chip_id.as_bytes())
            && ends_with_ignore_case(bytes, FW_PATCHFILE_EXTENSION.as_bytes())
    })
}

fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn ends_with_ignore_case(haystack: &[u8], suffix: &[u8]) -> bool {
    haystack.len() >= suffix.len()
        && haystack[haystack.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
