//! Per-file save locks.
//!
//! Every instance writing to the same path shares one mutex, so two saves of
//! one file never interleave their temp-file writes. Different files never
//! contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub(crate) struct SaveLocks {
    by_path: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl SaveLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The lock for `path`, created on first use.
    pub(crate) fn for_path(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut by_path = self.by_path.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(by_path.entry(path.to_path_buf()).or_default())
    }
}

/// A save that panicked left nothing half-applied in memory, so a poisoned
/// lock is taken over rather than propagated.
pub(crate) fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
