//! Lazy per-`(type, marker)` singletons.
//!
//! The first request for a key loads the instance from disk (or builds it
//! from defaults) and attaches autosave. Later requests return the same
//! instance until it is reloaded.

mod config;
mod entry;

use std::any::TypeId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::autosave::AutosaveController;
use crate::lock::SaveLocks;
use crate::persist;
use crate::schema::Schema;
use crate::settings::{build_schema, SaveTarget, Settings, SettingsInstance};

pub use config::{StoreConfig, DEFAULT_DIR_NAME};
use entry::{CacheEntry, ErasedSlot, Slot};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    type_id: TypeId,
    marker: Option<String>,
}

/// Blank and whitespace-only markers mean "no marker".
fn normalize_marker(marker: Option<&str>) -> Option<String> {
    marker
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Registry of live settings instances, one per settings type and marker.
///
/// Most applications use [`SettingsStore::global`]. Tests and tools that need
/// their own base directory build a store from a [`StoreConfig`].
pub struct SettingsStore {
    config: Arc<StoreConfig>,
    locks: Arc<SaveLocks>,
    entries: Mutex<HashMap<CacheKey, Arc<dyn ErasedSlot>>>,
    schemas: Mutex<HashMap<TypeId, Arc<Schema>>>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl SettingsStore {
    /// A store with an empty cache. Nothing is read until an instance is
    /// requested.
    pub fn new(config: StoreConfig) -> Self {
        SettingsStore {
            config: Arc::new(config),
            locks: Arc::new(SaveLocks::new()),
            entries: Mutex::new(HashMap::new()),
            schemas: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide store rooted at the platform data directory.
    pub fn global() -> &'static SettingsStore {
        static GLOBAL: OnceLock<SettingsStore> = OnceLock::new();
        GLOBAL.get_or_init(SettingsStore::default)
    }

    /// Shared with every instance, so changes apply to live instances.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<dyn ErasedSlot>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key<S: Settings>(marker: Option<&str>) -> CacheKey {
        CacheKey {
            type_id: TypeId::of::<S>(),
            marker: normalize_marker(marker),
        }
    }

    /// Built once per type and shared by every instance of it.
    pub fn schema<S: Settings>(&self) -> Arc<Schema> {
        let mut schemas = self.schemas.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            schemas
                .entry(TypeId::of::<S>())
                .or_insert_with(|| Arc::new(build_schema::<S>())),
        )
    }

    fn slot<S: Settings>(&self, key: CacheKey) -> Arc<Slot<S>> {
        let mut entries = self.lock_entries();
        let existing = entries
            .get(&key)
            .map(|slot| Arc::clone(slot).into_any().downcast::<Slot<S>>());
        match existing {
            Some(Ok(slot)) => slot,
            _ => {
                let slot = Arc::new(Slot::<S>::new());
                entries.insert(key, slot.clone());
                slot
            }
        }
    }

    fn cached<S: Settings>(&self, marker: Option<&str>) -> Option<Arc<Slot<S>>> {
        let entries = self.lock_entries();
        entries
            .get(&Self::key::<S>(marker))
            .and_then(|slot| Arc::clone(slot).into_any().downcast::<Slot<S>>().ok())
    }

    /// The shared instance for `(S, marker)`, loading it on first use.
    pub fn instance<S: Settings>(&self, marker: Option<&str>) -> SettingsInstance<S> {
        self.live_entry::<S, _>(marker, |entry| entry.instance.clone())
    }

    /// Initialise the registered slot for `(S, marker)` and read from it.
    ///
    /// A reload can unregister the slot while it is still loading. The entry
    /// it produced is then torn down and the lookup retried, so no handle
    /// to an unregistered instance keeps autosaving.
    fn live_entry<S: Settings, R>(
        &self,
        marker: Option<&str>,
        read: impl Fn(&CacheEntry<S>) -> R,
    ) -> R {
        let key = Self::key::<S>(marker);
        loop {
            let slot = self.slot::<S>(key.clone());
            let entry = slot.cell.get_or_init(|| self.create_entry::<S>(marker));
            if self.is_registered(&key, &slot) {
                return read(entry);
            }
            debug!(settings = S::TYPE_NAME, ?marker, "reloaded while loading, retrying");
            slot.teardown();
        }
    }

    fn is_registered<S: Settings>(&self, key: &CacheKey, slot: &Arc<Slot<S>>) -> bool {
        self.lock_entries().get(key).is_some_and(|current| {
            Arc::as_ptr(current) as *const () == Arc::as_ptr(slot) as *const ()
        })
    }

    fn create_entry<S: Settings>(&self, marker: Option<&str>) -> CacheEntry<S> {
        let (instance, found) = self.retrieve::<S>(marker);
        let autosave = AutosaveController::attach(&instance);
        debug!(
            settings = S::TYPE_NAME,
            marker = ?instance.marker(),
            is_new = !found,
            "settings instance created"
        );
        CacheEntry::new(instance, !found, autosave)
    }

    /// Drop the cached instance and load a fresh one. Handles to the old
    /// instance keep working but no longer autosave.
    ///
    /// Always `true`: a failed load still yields a default instance.
    pub fn reload<S: Settings>(&self, marker: Option<&str>) -> bool {
        let removed = self.lock_entries().remove(&Self::key::<S>(marker));
        if let Some(slot) = removed {
            slot.teardown();
        }
        let _ = self.instance::<S>(marker);
        true
    }

    /// Whether the cached instance started from defaults because nothing
    /// usable was on disk. Loads the instance if needed.
    pub fn is_new<S: Settings>(&self, marker: Option<&str>) -> bool {
        self.live_entry::<S, _>(marker, |entry| entry.is_new)
    }

    /// Save the cached instance. `false` when none is cached or the save did
    /// not write.
    pub fn save<S: Settings>(&self, marker: Option<&str>) -> bool {
        match self.cached::<S>(marker) {
            Some(slot) => match slot.cell.get() {
                Some(entry) => entry.instance.save().saved,
                None => false,
            },
            None => {
                debug!(settings = S::TYPE_NAME, ?marker, "no cached instance to save");
                false
            }
        }
    }

    /// Load `(S, marker)` from disk without touching the cache. The flag is
    /// `true` when a payload was found and decoded.
    pub fn retrieve<S: Settings>(&self, marker: Option<&str>) -> (SettingsInstance<S>, bool) {
        let (instance, found) = self.load::<S>(marker);
        S::on_loaded(&instance, found);
        (instance, found)
    }

    fn load<S: Settings>(&self, marker: Option<&str>) -> (SettingsInstance<S>, bool) {
        let target = SaveTarget::new::<S>(
            normalize_marker(marker),
            Arc::clone(&self.config),
            Arc::clone(&self.locks),
        );
        let schema = self.schema::<S>();

        if target.persistence_disabled() {
            return (SettingsInstance::load(schema, target, None), false);
        }

        let path = target.path();
        match target.persistor().retrieve(&path, S::TYPE_NAME) {
            Ok(Some(document)) => (SettingsInstance::load(schema, target, Some(document)), true),
            Ok(None) => (SettingsInstance::load(schema, target, None), false),
            Err(err) => {
                warn!(
                    settings = S::TYPE_NAME,
                    path = %path.display(),
                    %err,
                    "unreadable settings, using defaults"
                );
                (SettingsInstance::load(schema, target, None), false)
            }
        }
    }

    /// Where `(S, marker)` is stored under the current base directory.
    pub fn file_path<S: Settings>(&self, marker: Option<&str>) -> PathBuf {
        self.config
            .base_dir()
            .join(persist::file_name(S::TYPE_NAME, marker))
    }

    /// Tear down every cached instance.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock_entries().drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            slot.teardown();
        }
    }
}
