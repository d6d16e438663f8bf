use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use event_emitter_rs::EventEmitter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::subscription::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsEvent {
    Saved,
}

impl SettingsEvent {
    pub fn name(self) -> &'static str {
        match self {
            SettingsEvent::Saved => "Saved",
        }
    }
}

/// Payload delivered to `Saved` listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEvent {
    pub type_name: String,
    pub marker: Option<String>,
    pub path: PathBuf,
    pub existed_already: bool,
}

/// Announces settings events to any number of listeners.
///
/// Listeners run on emitter-spawned threads. [`SaveBroadcaster::emit`] joins
/// them before returning, so a save is only reported done once every listener
/// has seen it.
///
/// # Example
///
/// ```ignore
/// let token = settings.subscribe(SettingsEvent::Saved, |event| {
///     println!("saved {}", event.path.display());
/// });
///
/// // Later: stop listening.
/// drop(token);
/// ```
pub struct SaveBroadcaster {
    emitter: Arc<Mutex<EventEmitter>>,
}

impl Default for SaveBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveBroadcaster {
    pub fn new() -> Self {
        SaveBroadcaster {
            emitter: Arc::new(Mutex::new(EventEmitter::new())),
        }
    }

    fn lock(emitter: &Mutex<EventEmitter>) -> MutexGuard<'_, EventEmitter> {
        emitter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener. Dropping the returned token removes it.
    pub fn subscribe<F>(&self, event: SettingsEvent, listener: F) -> Subscription
    where
        F: Fn(SavedEvent) + Send + Sync + 'static,
    {
        let id = Self::lock(&self.emitter).on(event.name(), listener);

        let emitter = Arc::downgrade(&self.emitter);
        Subscription::new(move || {
            if let Some(emitter) = emitter.upgrade() {
                let _ = Self::lock(&emitter).remove_listener(&id);
            }
        })
    }

    pub fn emit(&self, event: SettingsEvent, payload: &SavedEvent) {
        let handles = Self::lock(&self.emitter).emit(event.name(), payload.clone());
        for handle in handles {
            if handle.join().is_err() {
                warn!(
                    event = event.name(),
                    settings = %payload.type_name,
                    "settings event listener panicked"
                );
            }
        }
    }
}
