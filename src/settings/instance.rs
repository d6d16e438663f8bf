use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use crate::autosave::AutosaveState;
use crate::bag::{PropertyBag, PropertyChange, SetOptions, Verdict};
use crate::emitter::{SaveBroadcaster, SavedEvent, SettingsEvent};
use crate::error::SettingsError;
use crate::lock::{self, SaveLocks};
use crate::persist::{self, FilePersistor, SaveOptions, SaveReport, SettingsDocument};
use crate::schema::{Property, Schema};
use crate::store::StoreConfig;
use crate::subscription::Subscription;
use crate::undo::{RevertReport, RevertStep, UndoLedger};
use crate::value::{PropertyType, Value};
use crate::version::VersionGuard;

use super::Settings;

/// Where and how one instance persists. The directory is resolved on every
/// save so a base directory change applies to live instances.
pub(crate) struct SaveTarget {
    file_name: String,
    marker: Option<String>,
    persistor: FilePersistor,
    config: Arc<StoreConfig>,
    locks: Arc<SaveLocks>,
}

impl SaveTarget {
    pub(crate) fn new<S: Settings>(
        marker: Option<String>,
        config: Arc<StoreConfig>,
        locks: Arc<SaveLocks>,
    ) -> Self {
        SaveTarget {
            file_name: persist::file_name(S::TYPE_NAME, marker.as_deref()),
            marker,
            persistor: FilePersistor::new(S::FORMAT),
            config,
            locks,
        }
    }

    pub(crate) fn path(&self) -> PathBuf {
        self.config.base_dir().join(&self.file_name)
    }

    pub(crate) fn persistor(&self) -> &FilePersistor {
        &self.persistor
    }

    pub(crate) fn persistence_disabled(&self) -> bool {
        self.config.no_persistence()
    }
}

/// Result of one save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// The file was (re)written.
    pub saved: bool,
    /// A file was present before the save.
    pub existed_already: bool,
}

impl SaveOutcome {
    const NOT_SAVED: SaveOutcome = SaveOutcome {
        saved: false,
        existed_already: false,
    };
}

struct Shared<S> {
    schema: Arc<Schema>,
    bag: PropertyBag,
    ledger: UndoLedger,
    version: VersionGuard,
    auto_save: AtomicBool,
    broadcaster: SaveBroadcaster,
    autosave: AutosaveState,
    target: SaveTarget,
    _settings: PhantomData<fn() -> S>,
}

/// Live values of one settings type under one marker.
///
/// Cloning is cheap and every clone observes the same values. The store
/// hands out clones of one cached instance per `(type, marker)`.
pub struct SettingsInstance<S: Settings> {
    shared: Arc<Shared<S>>,
}

impl<S: Settings> Clone for SettingsInstance<S> {
    fn clone(&self) -> Self {
        SettingsInstance {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Settings> fmt::Debug for SettingsInstance<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsInstance")
            .field("type", &S::TYPE_NAME)
            .field("marker", &self.shared.target.marker)
            .field("values", &self.shared.bag.snapshot())
            .finish()
    }
}

/// Non-owning handle, see [`SettingsInstance::downgrade`].
pub struct WeakSettings<S: Settings> {
    shared: Weak<Shared<S>>,
}

impl<S: Settings> WeakSettings<S> {
    pub fn upgrade(&self) -> Option<SettingsInstance<S>> {
        self.shared
            .upgrade()
            .map(|shared| SettingsInstance { shared })
    }
}

impl<S: Settings> SettingsInstance<S> {
    /// Build an instance from schema defaults overlaid with `document`.
    ///
    /// Loaded names the schema does not declare are dropped. Values whose
    /// type no longer matches the declaration, and non-finite floats, fall
    /// back to the default.
    pub(crate) fn load(
        schema: Arc<Schema>,
        target: SaveTarget,
        document: Option<SettingsDocument>,
    ) -> Self {
        let mut values: Vec<(String, Value)> = schema
            .properties()
            .iter()
            .map(|def| (def.name().to_string(), def.default_value().clone()))
            .collect();

        let (version, auto_save) = match document {
            None => (VersionGuard::fresh(S::CURRENT_VERSION), S::AUTO_SAVE),
            Some(document) => {
                for (name, value) in document.properties {
                    let Some(def) = schema.get(&name) else {
                        debug!(settings = S::TYPE_NAME, property = %name, "ignoring undeclared property");
                        continue;
                    };
                    if !def.accepts(&value) {
                        warn!(
                            settings = S::TYPE_NAME,
                            property = %name,
                            expected = def.kind(),
                            found = value.kind(),
                            "stored value has the wrong type, using default"
                        );
                        continue;
                    }
                    if !value.is_finite() {
                        warn!(settings = S::TYPE_NAME, property = %name, "stored value is not finite, using default");
                        continue;
                    }
                    if let Some(slot) = values.iter_mut().find(|(n, _)| *n == name) {
                        slot.1 = value;
                    }
                }
                let version = VersionGuard::loaded(S::CURRENT_VERSION, document.persisted_version);
                if version.disk_is_older() || version.disk_is_newer() {
                    debug!(
                        settings = S::TYPE_NAME,
                        current = S::CURRENT_VERSION,
                        persisted = document.persisted_version,
                        "settings version skew"
                    );
                }
                (version, document.auto_save)
            }
        };

        SettingsInstance {
            shared: Arc::new(Shared {
                schema,
                bag: PropertyBag::with_values(values),
                ledger: UndoLedger::new(),
                version,
                auto_save: AtomicBool::new(auto_save),
                broadcaster: SaveBroadcaster::new(),
                autosave: AutosaveState::default(),
                target,
                _settings: PhantomData,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakSettings<S> {
        WeakSettings {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Whether both handles point at the same live instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// [`Settings::TYPE_NAME`] of this instance.
    pub fn type_name(&self) -> &'static str {
        S::TYPE_NAME
    }

    /// The normalized marker, `None` for the unmarked instance.
    pub fn marker(&self) -> Option<&str> {
        self.shared.target.marker.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    /// Where the next save writes, under the current base directory.
    pub fn file_path(&self) -> PathBuf {
        self.shared.target.path()
    }

    // --- properties ---

    /// Current value, or the type's zero value when absent or mistyped.
    pub fn get<T: PropertyType>(&self, property: Property<T>) -> T {
        match self.try_get(property) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                debug!(settings = S::TYPE_NAME, %err, "reading zero value");
                T::default()
            }
        }
    }

    /// `Ok(None)` for an absent or null value.
    pub fn try_get<T: PropertyType>(&self, property: Property<T>) -> Result<Option<T>, SettingsError> {
        let value = self.shared.bag.get(property.name());
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(&value)
            .map(Some)
            .ok_or_else(|| SettingsError::TypeMismatch {
                name: property.name().to_string(),
                expected: T::KIND,
                found: value.kind(),
            })
    }

    /// Untyped read. [`Value::Null`] for undeclared names.
    pub fn get_value(&self, name: &str) -> Value {
        self.shared.bag.get(name)
    }

    /// Assign `value`. `Ok(true)` when the stored value changed, `Ok(false)`
    /// when it was equal or a pre-change hook vetoed it.
    pub fn set<T: PropertyType>(&self, property: Property<T>, value: T) -> Result<bool, SettingsError> {
        self.set_value(property.name(), value.into_value())
    }

    /// Untyped [`set`](Self::set). The value is checked against the schema
    /// first, and NaN or infinite floats are refused.
    pub fn set_value(&self, name: &str, value: Value) -> Result<bool, SettingsError> {
        self.set_value_with(name, value, SetOptions::default())
    }

    /// Like [`set_value`](Self::set_value). [`SetOptions::quiet`] skips the
    /// post-change listeners, and with them autosave.
    pub fn set_value_with(
        &self,
        name: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<bool, SettingsError> {
        self.shared.schema.check(name, &value)?;
        let ledger = &self.shared.ledger;
        Ok(self
            .shared
            .bag
            .set(name, value, options, |change| ledger.capture(change)))
    }

    /// Raise post-change for `name` without changing anything.
    pub fn notify_changed(&self, name: &str) {
        self.shared.bag.notify_changed(name);
    }

    /// Register a pre-change hook. Returning [`Verdict::Reject`] vetoes the
    /// change.
    ///
    /// Hooks run while writers are held off, so they may read this instance
    /// but must not set values on it.
    pub fn on_changing<F>(&self, hook: F) -> Subscription
    where
        F: Fn(&PropertyChange<'_>) -> Verdict + Send + Sync + 'static,
    {
        self.shared.bag.hooks().on_changing(hook)
    }

    /// Register a post-change listener. It runs on the thread that made the
    /// change, after the value is stored, in commit order.
    pub fn on_changed<F>(&self, hook: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared.bag.hooks().on_changed(hook)
    }

    /// Every current value, keyed by property name.
    pub fn values(&self) -> std::collections::BTreeMap<String, Value> {
        self.shared.bag.snapshot()
    }

    // --- undo ---

    /// Start capturing the first-seen value of every changed property.
    pub fn begin_recording(&self) {
        self.shared.ledger.begin_recording();
    }

    /// Stop capturing. Already captured values are kept.
    pub fn end_recording(&self) {
        self.shared.ledger.end_recording();
    }

    pub fn is_recording(&self) -> bool {
        self.shared.ledger.is_recording()
    }

    pub fn has_recorded_changes(&self) -> bool {
        !self.shared.ledger.is_empty()
    }

    /// Forget captured values so the current state becomes the baseline.
    pub fn reset_initial_state(&self) {
        self.shared.ledger.reset_initial_state();
    }

    /// Restore every captured original through the normal setter, so hooks
    /// and autosave observe the revert like any other change.
    pub fn revert_changes(&self) -> RevertReport {
        let schema = Arc::clone(&self.shared.schema);
        self.shared.ledger.revert_with(&schema, |name, original| {
            match self.set_value(name, original.clone()) {
                Ok(true) => RevertStep::Restored,
                Ok(false) if self.get_value(name) == original => RevertStep::AlreadyCurrent,
                Ok(false) => RevertStep::Rejected,
                Err(err) => {
                    warn!(settings = S::TYPE_NAME, property = name, %err, "revert failed");
                    RevertStep::Rejected
                }
            }
        })
    }

    // --- version ---

    /// [`Settings::CURRENT_VERSION`].
    pub fn current_version(&self) -> u64 {
        self.shared.version.current_version()
    }

    /// Version recorded in the payload this instance was loaded from, or
    /// the current version once saved.
    pub fn persisted_version(&self) -> u64 {
        self.shared.version.persisted_version()
    }

    /// The loaded payload came from an older schema version.
    pub fn disk_is_older(&self) -> bool {
        self.shared.version.disk_is_older()
    }

    pub fn set_disk_is_older(&self, value: bool) {
        self.shared.version.set_disk_is_older(value);
    }

    /// The loaded payload came from a newer schema version.
    pub fn disk_is_newer(&self) -> bool {
        self.shared.version.disk_is_newer()
    }

    pub fn set_disk_is_newer(&self, value: bool) {
        self.shared.version.set_disk_is_newer(value);
    }

    // --- saving ---

    /// Whether changes to declared properties save in the background.
    pub fn auto_save(&self) -> bool {
        self.shared.auto_save.load(Ordering::SeqCst)
    }

    /// Persisted with the values on the next save.
    pub fn set_auto_save(&self, enabled: bool) {
        self.shared.auto_save.store(enabled, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn changed_listener_count(&self) -> usize {
        self.shared.bag.hooks().changed_listener_count()
    }

    pub(crate) fn autosave_state(&self) -> &AutosaveState {
        &self.shared.autosave
    }

    pub fn autosave_in_flight(&self) -> bool {
        self.shared.autosave.in_flight()
    }

    /// Block until the most recently dispatched autosave finishes.
    /// `None` when no autosave was pending.
    pub fn wait_for_autosave(&self) -> Option<bool> {
        self.shared.autosave.wait()
    }

    /// [`save_with`](Self::save_with) with overwrite enabled.
    pub fn save(&self) -> SaveOutcome {
        self.save_with(SaveOptions::default())
    }

    /// Persist the current values.
    ///
    /// Failures are logged and reported as not saved. With persistence
    /// disabled nothing touches the disk and nothing is announced.
    pub fn save_with(&self, options: SaveOptions) -> SaveOutcome {
        let target = &self.shared.target;
        if target.persistence_disabled() {
            debug!(settings = S::TYPE_NAME, "persistence disabled, skipping save");
            return SaveOutcome::NOT_SAVED;
        }

        {
            let _quiet = self.shared.autosave.suppress();
            S::on_saving(self);
        }

        let path = target.path();
        let report = match self.write(&path, options) {
            Ok(report) => report,
            Err(err) => {
                warn!(settings = S::TYPE_NAME, path = %path.display(), %err, "settings save failed");
                return SaveOutcome {
                    saved: false,
                    existed_already: path.exists(),
                };
            }
        };

        if report.written {
            self.shared.version.mark_saved();
            let event = SavedEvent {
                type_name: S::TYPE_NAME.to_string(),
                marker: target.marker.clone(),
                path,
                existed_already: report.existed_already,
            };
            self.shared.broadcaster.emit(SettingsEvent::Saved, &event);
        }

        SaveOutcome {
            saved: report.written,
            existed_already: report.existed_already,
        }
    }

    fn write(&self, path: &std::path::Path, options: SaveOptions) -> Result<SaveReport, SettingsError> {
        let file_lock = self.shared.target.locks.for_path(path);
        let _guard = lock::hold(&file_lock);
        let document = self.document();
        self.shared.target.persistor().save(path, &document, options)
    }

    /// Snapshot of what a save would write right now.
    pub fn document(&self) -> SettingsDocument {
        SettingsDocument {
            type_name: S::TYPE_NAME.to_string(),
            persisted_version: S::CURRENT_VERSION,
            auto_save: self.auto_save(),
            properties: self.shared.bag.snapshot(),
        }
    }

    /// Listen for settings events. Dropping the token unsubscribes.
    pub fn subscribe<F>(&self, event: SettingsEvent, listener: F) -> Subscription
    where
        F: Fn(SavedEvent) + Send + Sync + 'static,
    {
        self.shared.broadcaster.subscribe(event, listener)
    }
}
