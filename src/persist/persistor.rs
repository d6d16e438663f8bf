use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::SettingsError;

use super::{AtomicFileWriter, Codec, SettingsDocument, StorageFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Replace an existing file. With `false` an existing file is kept and
    /// the save reports nothing written.
    pub overwrite: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions { overwrite: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub written: bool,
    pub existed_already: bool,
}

/// One storage strategy: a codec plus the shared file policy.
pub struct FilePersistor {
    codec: &'static dyn Codec,
}

impl FilePersistor {
    pub fn new(format: StorageFormat) -> Self {
        FilePersistor {
            codec: format.codec(),
        }
    }

    pub fn format(&self) -> StorageFormat {
        self.codec.format()
    }

    pub fn save(
        &self,
        path: &Path,
        document: &SettingsDocument,
        options: SaveOptions,
    ) -> Result<SaveReport, SettingsError> {
        let existed_already = path.exists();
        if existed_already && !options.overwrite {
            debug!(path = %path.display(), "settings file exists, overwrite disabled");
            return Ok(SaveReport {
                written: false,
                existed_already,
            });
        }

        let bytes = self.codec.encode(document)?;
        AtomicFileWriter::replace(path, &bytes)?;
        debug!(
            path = %path.display(),
            format = %self.format(),
            bytes = bytes.len(),
            "settings saved"
        );
        Ok(SaveReport {
            written: true,
            existed_already,
        })
    }

    /// Load the document at `path`. `Ok(None)` when there is no file.
    ///
    /// A payload that does not decode, or that belongs to another settings
    /// type, is moved aside before the error is returned.
    pub fn retrieve(
        &self,
        path: &Path,
        expected_type: &str,
    ) -> Result<Option<SettingsDocument>, SettingsError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SettingsError::io(path, err)),
        };

        let decoded = self.codec.decode(&bytes).and_then(|doc| {
            if doc.type_name == expected_type {
                Ok(doc)
            } else {
                Err(SettingsError::TypeTag {
                    expected: expected_type.to_string(),
                    found: doc.type_name,
                })
            }
        });

        match decoded {
            Ok(doc) => Ok(Some(doc)),
            Err(err) => {
                if err.is_corruption() {
                    quarantine(path);
                }
                Err(err)
            }
        }
    }
}

pub fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".corrupt");
    PathBuf::from(name)
}

/// Move an undecodable file out of the way so the next save starts clean.
///
/// Both formats keep the bytes at [`corrupt_path`] for inspection instead of
/// deleting them, and a later quarantine replaces the earlier copy. The file
/// is deleted only when it cannot be renamed.
fn quarantine(path: &Path) {
    let target = corrupt_path(path);
    match fs::rename(path, &target) {
        Ok(()) => warn!(
            path = %path.display(),
            moved_to = %target.display(),
            "corrupt settings file moved aside"
        ),
        Err(rename_err) => match fs::remove_file(path) {
            Ok(()) => warn!(
                path = %path.display(),
                error = %rename_err,
                "corrupt settings file deleted"
            ),
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "corrupt settings file could not be removed"
            ),
        },
    }
}
