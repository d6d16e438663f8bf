use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Tracks schema version skew between the running code and the loaded payload.
///
/// The guard only reports. Callers decide what a stale or newer payload means
/// (prompt, reset, ignore) and may clear the flags once handled.
#[derive(Debug)]
pub struct VersionGuard {
    current: u64,
    persisted: AtomicU64,
    disk_is_older: AtomicBool,
    disk_is_newer: AtomicBool,
}

impl VersionGuard {
    /// Nothing was loaded: the instance is already at the current version.
    pub fn fresh(current: u64) -> Self {
        VersionGuard {
            current,
            persisted: AtomicU64::new(current),
            disk_is_older: AtomicBool::new(false),
            disk_is_newer: AtomicBool::new(false),
        }
    }

    pub fn loaded(current: u64, persisted: u64) -> Self {
        VersionGuard {
            current,
            persisted: AtomicU64::new(persisted),
            disk_is_older: AtomicBool::new(persisted < current),
            disk_is_newer: AtomicBool::new(current < persisted),
        }
    }

    pub fn current_version(&self) -> u64 {
        self.current
    }

    pub fn persisted_version(&self) -> u64 {
        self.persisted.load(Ordering::SeqCst)
    }

    pub fn disk_is_older(&self) -> bool {
        self.disk_is_older.load(Ordering::SeqCst)
    }

    pub fn set_disk_is_older(&self, value: bool) {
        self.disk_is_older.store(value, Ordering::SeqCst);
    }

    pub fn disk_is_newer(&self) -> bool {
        self.disk_is_newer.load(Ordering::SeqCst)
    }

    pub fn set_disk_is_newer(&self, value: bool) {
        self.disk_is_newer.store(value, Ordering::SeqCst);
    }

    /// A successful save writes the current version.
    pub fn mark_saved(&self) {
        self.persisted.store(self.current, Ordering::SeqCst);
        self.disk_is_older.store(false, Ordering::SeqCst);
        self.disk_is_newer.store(false, Ordering::SeqCst);
    }
}
