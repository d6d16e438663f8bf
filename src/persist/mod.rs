//! On-disk representation of settings and the two storage strategies.
//!
//! A settings type picks its [`StorageFormat`] once, as an associated const.
//! Both formats share one document shape, one atomic write path and one
//! corruption policy: a payload that fails to decode is moved aside to
//! `<file>.corrupt` so the next load starts clean.

mod atomic;
mod codec;
mod persistor;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

pub use atomic::AtomicFileWriter;
pub use codec::{BinaryCodec, Codec, JsonCodec};
pub use persistor::{corrupt_path, FilePersistor, SaveOptions, SaveReport};

pub const FILE_EXTENSION: &str = "settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    /// Compact opaque blob (bitcode).
    Binary,
    /// Pretty-printed JSON with type tags on the document and every value.
    Json,
}

impl StorageFormat {
    pub fn codec(self) -> &'static dyn Codec {
        match self {
            StorageFormat::Binary => &BinaryCodec,
            StorageFormat::Json => &JsonCodec,
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageFormat::Binary => write!(f, "binary"),
            StorageFormat::Json => write!(f, "json"),
        }
    }
}

/// The persisted payload of one settings instance.
///
/// Runtime-only state (version skew flags, hooks, the undo ledger) is not part
/// of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(rename = "type")]
    pub type_name: String,
    pub persisted_version: u64,
    pub auto_save: bool,
    pub properties: BTreeMap<String, Value>,
}

/// `"{type}.{marker}.settings"`, or `"{type}.settings"` for a blank marker.
pub fn file_name(type_name: &str, marker: Option<&str>) -> String {
    match marker.map(str::trim).filter(|m| !m.is_empty()) {
        Some(marker) => format!("{}.{}.{}", type_name, marker, FILE_EXTENSION),
        None => format!("{}.{}", type_name, FILE_EXTENSION),
    }
}
