use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

/// Crash-safe replace-in-place of a file.
///
/// The payload is written in full to a `.new` sibling and synced before it is
/// renamed over the target. The rename replaces the old file in one step, so
/// readers see either the old complete content or the new complete content.
pub struct AtomicFileWriter;

impl AtomicFileWriter {
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".new");
        PathBuf::from(name)
    }

    pub fn replace(path: &Path, payload: &[u8]) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            // create_dir_all already treats a concurrently created directory as success.
            fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;
        }

        let temp = Self::temp_path(path);
        if let Err(err) = write_synced(&temp, payload) {
            let _ = fs::remove_file(&temp);
            return Err(SettingsError::io(&temp, err));
        }

        if let Err(err) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(SettingsError::io(path, err));
        }
        Ok(())
    }
}

fn write_synced(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(payload)?;
    file.sync_all()
}
