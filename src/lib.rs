mod autosave;
mod bag;
mod emitter;
mod error;
mod lock;
mod persist;
mod schema;
mod settings;
mod store;
mod subscription;
mod undo;
mod value;
mod version;

pub use autosave::AutosaveController;
pub use bag::{ChangeHooks, PropertyBag, PropertyChange, SetOptions, Verdict};
pub use emitter::{SaveBroadcaster, SavedEvent, SettingsEvent};
pub use error::SettingsError;
pub use persist::{
    corrupt_path, file_name, AtomicFileWriter, BinaryCodec, Codec, FilePersistor, JsonCodec,
    SaveOptions, SaveReport, SettingsDocument, StorageFormat, FILE_EXTENSION,
};
pub use schema::{Property, PropertyDef, Schema, SchemaBuilder};
pub use settings::{SaveOutcome, Settings, SettingsInstance, WeakSettings};
pub use store::{SettingsStore, StoreConfig, DEFAULT_DIR_NAME};
pub use subscription::Subscription;
pub use undo::{RevertReport, RevertStep, UndoLedger};
pub use value::{PropertyType, Value};
pub use version::VersionGuard;
