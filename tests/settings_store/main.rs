mod concurrency;
mod persistence;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use settings_store::{SettingsEvent, SettingsStore, StoreConfig, Value, Verdict};
use types::{Example, Stamped};

fn store(dir: &std::path::Path) -> SettingsStore {
    SettingsStore::new(StoreConfig::new(dir))
}

#[test]
fn prod_marker_autosaves_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let settings = store.instance::<Example>(Some("prod"));
    assert!(store.is_new::<Example>(Some("prod")));
    assert_eq!(settings.get(Example::FIRST), "John");

    assert_eq!(settings.set(Example::FIRST, "Jane".to_string()), Ok(true));
    assert_eq!(settings.wait_for_autosave(), Some(true));

    let path = dir.path().join("Example.prod.settings");
    assert_eq!(store.file_path::<Example>(Some("prod")), path);
    assert!(path.exists());

    assert!(store.reload::<Example>(Some("prod")));
    let reloaded = store.instance::<Example>(Some("prod"));
    assert!(!store.is_new::<Example>(Some("prod")));
    assert_eq!(reloaded.get(Example::FIRST), "Jane");
    assert_eq!(reloaded.get(Example::LAST), "Doe");
    assert_eq!(reloaded.persisted_version(), 2);
}

#[test]
fn markers_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let prod = store.instance::<Example>(Some("prod"));
    let dev = store.instance::<Example>(Some("dev"));
    prod.set_auto_save(false);
    dev.set_auto_save(false);

    prod.set(Example::YEAR, 1999).unwrap();
    assert_eq!(dev.get(Example::YEAR), 2024);
    assert!(store.instance::<Example>(Some("prod")).ptr_eq(&prod));
}

#[test]
fn revert_restores_values_from_before_recording() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let settings = store.instance::<Example>(None);
    settings.set_auto_save(false);
    settings.set(Example::YEAR, 2000).unwrap();
    let before = settings.values();

    settings.begin_recording();
    settings.set(Example::YEAR, 2001).unwrap();
    settings.set(Example::YEAR, 2002).unwrap();
    settings
        .set(Example::TAGS, vec!["a".to_string(), "b".to_string()])
        .unwrap();
    settings.set(Example::FIRST, "Jane".to_string()).unwrap();

    let report = settings.revert_changes();
    assert!(report.is_complete());
    assert_eq!(report.restored.len(), 3);
    assert_eq!(settings.values(), before);
    assert!(!settings.has_recorded_changes());

    // Recording is still on, so a later change opens a new window.
    settings.set(Example::YEAR, 2010).unwrap();
    settings.revert_changes();
    assert_eq!(settings.get(Example::YEAR), 2000);
}

#[test]
fn revert_with_nothing_recorded_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let settings = store(dir.path()).instance::<Example>(None);
    let report = settings.revert_changes();
    assert!(report.restored.is_empty() && report.unchanged.is_empty());
}

#[test]
fn reset_initial_state_moves_the_undo_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let settings = store(dir.path()).instance::<Example>(None);
    settings.set_auto_save(false);

    settings.begin_recording();
    settings.set(Example::YEAR, 2001).unwrap();
    settings.reset_initial_state();
    settings.set(Example::YEAR, 2002).unwrap();
    settings.revert_changes();

    assert_eq!(settings.get(Example::YEAR), 2001);
}

#[test]
fn vetoed_change_leaves_value_and_skips_notification() {
    let dir = tempfile::tempdir().unwrap();
    let settings = store(dir.path()).instance::<Example>(None);
    settings.set_auto_save(false);

    let changed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changed);
    let _after = settings.on_changed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let _veto = settings.on_changing(|change| {
        if change.new == &Value::Int(0) {
            Verdict::Reject
        } else {
            Verdict::Accept
        }
    });

    assert_eq!(settings.set(Example::YEAR, 0), Ok(false));
    assert_eq!(settings.get(Example::YEAR), 2024);
    assert_eq!(changed.load(Ordering::SeqCst), 0);

    assert_eq!(settings.set(Example::YEAR, 1), Ok(true));
    assert_eq!(changed.load(Ordering::SeqCst), 1);
}

#[test]
fn save_hook_mutation_does_not_resave() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let settings = store.instance::<Stamped>(None);

    let saves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&saves);
    let _token = settings.subscribe(SettingsEvent::Saved, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    settings.set(Stamped::VALUE, "first".to_string()).unwrap();
    assert_eq!(settings.wait_for_autosave(), Some(true));
    assert_eq!(settings.wait_for_autosave(), None);

    assert_eq!(settings.get(Stamped::SAVES), 1);
    assert_eq!(saves.load(Ordering::SeqCst), 1);

    store.reload::<Stamped>(None);
    let reloaded = store.instance::<Stamped>(None);
    assert_eq!(reloaded.get(Stamped::SAVES), 1);
    assert_eq!(reloaded.get(Stamped::VALUE), "first");
}

#[test]
fn explicit_save_hook_mutation_does_not_autosave() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let settings = store.instance::<Stamped>(None);

    let saves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&saves);
    let _token = settings.subscribe(SettingsEvent::Saved, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(settings.save().saved);
    assert_eq!(settings.wait_for_autosave(), None);
    assert!(!settings.autosave_in_flight());

    assert_eq!(settings.get(Stamped::SAVES), 1);
    assert_eq!(saves.load(Ordering::SeqCst), 1);
    let (stored, found) = store.retrieve::<Stamped>(None);
    assert!(found);
    assert_eq!(stored.get(Stamped::SAVES), 1);
}

#[test]
fn before_hook_may_read_the_instance() {
    let dir = tempfile::tempdir().unwrap();
    let settings = store(dir.path()).instance::<Example>(None);
    settings.set_auto_save(false);

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let weak = settings.downgrade();
    let _hook = settings.on_changing(move |change| {
        let Some(settings) = weak.upgrade() else {
            return Verdict::Accept;
        };
        let year = settings.get(Example::YEAR);
        sink.lock().unwrap().push(format!("{:?}", settings));
        if change.name == "first" && year < 2000 {
            Verdict::Reject
        } else {
            Verdict::Accept
        }
    });

    assert_eq!(settings.set(Example::FIRST, "Jane".to_string()), Ok(true));
    assert_eq!(settings.set(Example::YEAR, 1999), Ok(true));
    assert_eq!(settings.set(Example::FIRST, "Joan".to_string()), Ok(false));
    assert_eq!(settings.get(Example::FIRST), "Jane");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    // The hook sees the values from before the change under review.
    assert!(seen[0].contains("John"));
}

#[test]
fn saved_listener_stops_after_unsubscribe() {
    let dir = tempfile::tempdir().unwrap();
    let settings = store(dir.path()).instance::<Example>(None);
    settings.set_auto_save(false);

    let saves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&saves);
    let token = settings.subscribe(SettingsEvent::Saved, move |event| {
        assert_eq!(event.type_name, "Example");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(settings.save().saved);
    token.unsubscribe();
    assert!(settings.save().saved);

    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn reload_detaches_autosave_from_old_handle() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let old = store.instance::<Example>(None);
    assert!(store.reload::<Example>(None));
    assert!(!store.instance::<Example>(None).ptr_eq(&old));

    old.set(Example::YEAR, 1990).unwrap();
    assert_eq!(old.wait_for_autosave(), None);
    assert!(!store.file_path::<Example>(None).exists());
}
