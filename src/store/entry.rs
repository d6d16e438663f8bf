use std::any::Any;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::debug;

use crate::settings::{Settings, SettingsInstance};
use crate::subscription::Subscription;

/// The cached instance for one `(type, marker)` and its autosave wiring.
pub(crate) struct CacheEntry<S: Settings> {
    pub(crate) instance: SettingsInstance<S>,
    pub(crate) is_new: bool,
    autosave: Mutex<Option<Subscription>>,
}

impl<S: Settings> CacheEntry<S> {
    pub(crate) fn new(instance: SettingsInstance<S>, is_new: bool, autosave: Subscription) -> Self {
        CacheEntry {
            instance,
            is_new,
            autosave: Mutex::new(Some(autosave)),
        }
    }

    /// Detach autosave and discard pending undo state.
    fn teardown(&self) {
        let autosave = self
            .autosave
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(autosave) = autosave {
            autosave.unsubscribe();
        }
        self.instance.end_recording();
        self.instance.reset_initial_state();
        debug!(
            settings = S::TYPE_NAME,
            marker = ?self.instance.marker(),
            "settings instance torn down"
        );
    }
}

/// A registry slot. Initialised at most once; concurrent callers for the
/// same key block on the cell while other keys proceed.
pub(crate) struct Slot<S: Settings> {
    pub(crate) cell: OnceLock<CacheEntry<S>>,
}

impl<S: Settings> Slot<S> {
    pub(crate) fn new() -> Self {
        Slot {
            cell: OnceLock::new(),
        }
    }
}

/// Type-erased view of a [`Slot`] so the registry can hold every settings
/// type in one map.
pub(crate) trait ErasedSlot: Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn teardown(&self);
}

impl<S: Settings> ErasedSlot for Slot<S> {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn teardown(&self) {
        if let Some(entry) = self.cell.get() {
            entry.teardown();
        }
    }
}
