mod broadcaster;

pub use broadcaster::{SaveBroadcaster, SavedEvent, SettingsEvent};
