use crate::error::SettingsError;

use super::{SettingsDocument, StorageFormat};

/// Serialize one settings document to bytes and back.
pub trait Codec: Send + Sync {
    fn format(&self) -> StorageFormat;

    fn encode(&self, document: &SettingsDocument) -> Result<Vec<u8>, SettingsError>;

    fn decode(&self, bytes: &[u8]) -> Result<SettingsDocument, SettingsError>;
}

pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Binary
    }

    fn encode(&self, document: &SettingsDocument) -> Result<Vec<u8>, SettingsError> {
        bitcode::serialize(document).map_err(|e| SettingsError::Codec {
            format: StorageFormat::Binary,
            message: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<SettingsDocument, SettingsError> {
        bitcode::deserialize(bytes).map_err(|e| SettingsError::Codec {
            format: StorageFormat::Binary,
            message: e.to_string(),
        })
    }
}

pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Json
    }

    fn encode(&self, document: &SettingsDocument) -> Result<Vec<u8>, SettingsError> {
        serde_json::to_vec_pretty(document).map_err(|e| SettingsError::Codec {
            format: StorageFormat::Json,
            message: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<SettingsDocument, SettingsError> {
        serde_json::from_slice(bytes).map_err(|e| SettingsError::Codec {
            format: StorageFormat::Json,
            message: e.to_string(),
        })
    }
}
