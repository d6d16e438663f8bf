use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::persist::StorageFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    Io {
        path: PathBuf,
        message: String,
    },
    Codec {
        format: StorageFormat,
        message: String,
    },
    TypeTag {
        expected: String,
        found: String,
    },
    UnknownProperty {
        type_name: &'static str,
        name: String,
    },
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    /// NaN or infinity, which the JSON format cannot carry.
    NonFiniteFloat {
        name: String,
    },
}

impl SettingsError {
    pub(crate) fn io(path: &Path, err: io::Error) -> Self {
        SettingsError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// True for failures caused by the payload itself rather than the filesystem.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SettingsError::Codec { .. } | SettingsError::TypeTag { .. }
        )
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, message } => {
                write!(f, "settings i/o error at {}: {}", path.display(), message)
            }
            SettingsError::Codec { format, message } => {
                write!(f, "{} codec error: {}", format, message)
            }
            SettingsError::TypeTag { expected, found } => write!(
                f,
                "settings payload belongs to {} (expected {})",
                found, expected
            ),
            SettingsError::UnknownProperty { type_name, name } => {
                write!(f, "{} has no property named {}", type_name, name)
            }
            SettingsError::TypeMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "property {} expects {} (got {})",
                name, expected, found
            ),
            SettingsError::NonFiniteFloat { name } => {
                write!(f, "property {} must be a finite number", name)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
