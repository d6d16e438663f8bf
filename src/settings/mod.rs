//! The user-facing settings contract.
//!
//! ## Example
//!
//! ```ignore
//! use settings_store::{Property, Schema, SchemaBuilder, Settings, SettingsStore, StorageFormat};
//!
//! pub struct Example;
//!
//! impl Example {
//!     pub const YEAR: Property<i64> = Property::new("year");
//!     pub const FIRST: Property<String> = Property::new("first");
//! }
//!
//! impl Settings for Example {
//!     const TYPE_NAME: &'static str = "Example";
//!     const FORMAT: StorageFormat = StorageFormat::Json;
//!     const CURRENT_VERSION: u64 = 2;
//!
//!     fn schema(builder: SchemaBuilder) -> SchemaBuilder {
//!         builder
//!             .property(Self::YEAR, 2024)
//!             .property(Self::FIRST, "John".to_string())
//!     }
//! }
//!
//! let settings = SettingsStore::global().instance::<Example>(Some("prod"));
//! settings.set(Example::FIRST, "Jane".to_string())?;
//! ```

mod instance;

use crate::persist::StorageFormat;
use crate::schema::{Schema, SchemaBuilder};

pub use instance::{SaveOutcome, SettingsInstance, WeakSettings};
pub(crate) use instance::SaveTarget;

/// A settings type: a name, a storage format, a version and a property table.
///
/// Implementors are usually unit structs; the values live in the
/// [`SettingsInstance`] the store hands out.
pub trait Settings: Sized + Send + Sync + 'static {
    /// Used for the file name and as the type tag inside the payload.
    const TYPE_NAME: &'static str;

    const FORMAT: StorageFormat;

    /// Schema version of the running code. Compared against the version
    /// recorded in a loaded payload.
    const CURRENT_VERSION: u64 = 0;

    /// Initial autosave flag for instances that were not loaded from disk.
    const AUTO_SAVE: bool = true;

    /// Declare every property with its default.
    fn schema(builder: SchemaBuilder) -> SchemaBuilder;

    /// Runs at the start of every save, before the payload is captured.
    /// Mutations made here are saved but never trigger another autosave.
    fn on_saving(_settings: &SettingsInstance<Self>) {}

    /// Runs once per load, after stored values are applied and before the
    /// instance is shared. `found` is false when it started from defaults.
    fn on_loaded(_settings: &SettingsInstance<Self>, _found: bool) {}
}

pub(crate) fn build_schema<S: Settings>() -> Schema {
    S::schema(Schema::builder(S::TYPE_NAME)).build()
}
