use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Directory name used under the platform data directory.
pub const DEFAULT_DIR_NAME: &str = "settings_store";

/// Process-wide knobs shared by every instance of one store.
///
/// Both may change at runtime. Live instances resolve their file path on
/// each save, so a new base directory applies to the next save.
#[derive(Debug)]
pub struct StoreConfig {
    base_dir: RwLock<PathBuf>,
    no_persistence: AtomicBool,
}

impl StoreConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            base_dir: RwLock::new(base_dir.into()),
            no_persistence: AtomicBool::new(false),
        }
    }

    /// `<data dir>/<app>`, or `./<app>` when the platform has no data dir.
    pub fn for_application(app: &str) -> Self {
        Self::new(Self::platform_dir(app))
    }

    fn platform_dir(app: &str) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(app)
    }

    pub fn base_dir(&self) -> PathBuf {
        self.base_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_base_dir(&self, dir: impl AsRef<Path>) {
        *self
            .base_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dir.as_ref().to_path_buf();
    }

    /// When set, loads yield defaults and saves never touch the disk.
    pub fn no_persistence(&self) -> bool {
        self.no_persistence.load(Ordering::SeqCst)
    }

    pub fn set_no_persistence(&self, disabled: bool) {
        self.no_persistence.store(disabled, Ordering::SeqCst);
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::for_application(DEFAULT_DIR_NAME)
    }
}
