//! Background save on property change.
//!
//! One save per instance may be in flight. Changes that arrive while it runs
//! are not queued: the running save already captures them unless they happen
//! after its snapshot, and the next change after it finishes saves again.
//!
//! Changes made while a save hook runs never start an autosave. The save
//! that ran the hook writes them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::settings::{Settings, SettingsInstance};
use crate::subscription::Subscription;

#[derive(Default)]
pub(crate) struct AutosaveState {
    in_flight: AtomicBool,
    pending: Mutex<Option<JoinHandle<bool>>>,
    suppressed: AtomicUsize,
}

impl AutosaveState {
    fn lock_pending(&self) -> MutexGuard<'_, Option<JoinHandle<bool>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn wait(&self) -> Option<bool> {
        let handle = self.lock_pending().take()?;
        Some(handle.join().unwrap_or(false))
    }

    /// Hold off autosave until the guard drops. Nests.
    pub(crate) fn suppress(&self) -> SuppressGuard<'_> {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
        SuppressGuard {
            suppressed: &self.suppressed,
        }
    }

    fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst) > 0
    }
}

pub(crate) struct SuppressGuard<'a> {
    suppressed: &'a AtomicUsize,
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.suppressed.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Clears the in-flight flag even when the save panics.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

pub struct AutosaveController;

impl AutosaveController {
    /// Save `settings` in the background after every change to a declared
    /// property, while its autosave flag is set. Dropping the token detaches.
    pub fn attach<S: Settings>(settings: &SettingsInstance<S>) -> Subscription {
        let weak = settings.downgrade();
        settings.on_changed(move |name| {
            if let Some(settings) = weak.upgrade() {
                Self::property_changed(&settings, name);
            }
        })
    }

    fn property_changed<S: Settings>(settings: &SettingsInstance<S>, name: &str) {
        if !settings.auto_save() || !settings.schema().contains(name) {
            return;
        }

        let state = settings.autosave_state();
        if state.is_suppressed() {
            debug!(settings = S::TYPE_NAME, property = name, "change made while saving");
            return;
        }
        if state
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(settings = S::TYPE_NAME, property = name, "autosave already in flight");
            return;
        }

        // Hold the slot across spawn so handles are stored in dispatch order.
        let mut pending = state.lock_pending();
        let worker = settings.clone();
        let spawned = thread::Builder::new()
            .name(format!("autosave-{}", S::TYPE_NAME))
            .spawn(move || {
                let _guard = InFlightGuard {
                    in_flight: &worker.autosave_state().in_flight,
                };
                worker.save().saved
            });

        match spawned {
            Ok(handle) => {
                debug!(settings = S::TYPE_NAME, property = name, "autosave dispatched");
                *pending = Some(handle);
            }
            Err(err) => {
                state.in_flight.store(false, Ordering::SeqCst);
                warn!(settings = S::TYPE_NAME, %err, "failed to spawn autosave");
            }
        }
    }
}
