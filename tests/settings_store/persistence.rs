use std::fs;

use settings_store::{
    corrupt_path, FilePersistor, SaveOptions, SettingsDocument, SettingsError, SettingsStore,
    StorageFormat, StoreConfig, Value,
};

use crate::store;
use crate::types::{Example, ExampleV1, Gauge, Window};

#[test]
fn binary_values_survive_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let window = store.instance::<Window>(Some("main"));
    window.set(Window::WIDTH, 1920).unwrap();
    window.set(Window::MAXIMIZED, true).unwrap();
    window.set(Window::SCALE, 1.5).unwrap();
    assert!(store.save::<Window>(Some("main")));

    let (loaded, found) = store.retrieve::<Window>(Some("main"));
    assert!(found);
    assert_eq!(loaded.values(), window.values());
    assert_eq!(loaded.get(Window::WIDTH), 1920);
    assert!(loaded.get(Window::MAXIMIZED));
}

#[test]
fn json_payload_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let settings = store(dir.path()).instance::<Example>(None);
    settings.set_auto_save(false);
    settings.set(Example::LAST, "Smith".to_string()).unwrap();
    assert!(settings.save().saved);

    let text = fs::read_to_string(dir.path().join("Example.settings")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["type"], "Example");
    assert_eq!(json["persisted_version"], 2);
    assert_eq!(json["auto_save"], false);
    assert_eq!(json["properties"]["last"]["text"], "Smith");
}

#[test]
fn older_payload_sets_disk_is_older() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let old = store.instance::<ExampleV1>(None);
    old.set(Example::YEAR, 1984).unwrap();
    assert!(old.save().saved);

    let (current, found) = store.retrieve::<Example>(None);
    assert!(found);
    assert!(current.disk_is_older());
    assert!(!current.disk_is_newer());
    assert_eq!(current.persisted_version(), 1);
    assert_eq!(current.get(Example::YEAR), 1984);
    // Declared later, so absent from the old payload.
    assert!(current.get(Example::TAGS).is_empty());

    current.set_auto_save(false);
    assert!(current.save().saved);
    assert!(!current.disk_is_older());
    assert_eq!(current.persisted_version(), 2);
}

#[test]
fn newer_payload_sets_disk_is_newer() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let current = store.instance::<Example>(None);
    current.set_auto_save(false);
    current
        .set(Example::TAGS, vec!["beta".to_string()])
        .unwrap();
    assert!(current.save().saved);

    let (old, found) = store.retrieve::<ExampleV1>(None);
    assert!(found);
    assert!(old.disk_is_newer());
    assert!(!old.disk_is_older());
    // Names the older build does not declare are dropped.
    assert_eq!(old.get_value("tags"), Value::Null);
}

#[test]
fn undecodable_file_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let path = store.file_path::<Example>(None);
    fs::write(&path, b"{ not json").unwrap();

    let settings = store.instance::<Example>(None);
    assert!(store.is_new::<Example>(None));
    assert_eq!(settings.get(Example::FIRST), "John");
    assert!(!path.exists());
    assert_eq!(fs::read(corrupt_path(&path)).unwrap(), b"{ not json");
}

#[test]
fn empty_binary_file_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let path = store.file_path::<Window>(None);
    fs::write(&path, b"").unwrap();

    let (window, found) = store.retrieve::<Window>(None);
    assert!(!found);
    assert_eq!(window.get(Window::WIDTH), 800);
    assert!(corrupt_path(&path).exists());
}

#[test]
fn foreign_type_tag_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let path = store.file_path::<Example>(None);
    let foreign = SettingsDocument {
        type_name: "Window".into(),
        persisted_version: 0,
        auto_save: true,
        properties: Default::default(),
    };
    FilePersistor::new(StorageFormat::Json)
        .save(&path, &foreign, SaveOptions::default())
        .unwrap();

    let (_, found) = store.retrieve::<Example>(None);
    assert!(!found);
    assert!(corrupt_path(&path).exists());
}

#[test]
fn overwrite_disabled_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let settings = store.instance::<Example>(None);
    settings.set_auto_save(false);
    assert!(settings.save().saved);
    let before = fs::read(settings.file_path()).unwrap();

    settings.set(Example::YEAR, 3000).unwrap();
    let outcome = settings.save_with(SaveOptions { overwrite: false });
    assert!(!outcome.saved);
    assert!(outcome.existed_already);
    assert_eq!(fs::read(settings.file_path()).unwrap(), before);

    let outcome = settings.save();
    assert!(outcome.saved);
    assert!(outcome.existed_already);
}

#[test]
fn no_persistence_never_touches_disk() {
    let dir = tempfile::tempdir().unwrap();

    // A payload from an earlier run with persistence on.
    let seeded = store(dir.path()).instance::<Example>(None);
    seeded.set_auto_save(false);
    seeded.set(Example::YEAR, 1970).unwrap();
    assert!(seeded.save().saved);
    let path = seeded.file_path();
    let before = fs::read(&path).unwrap();

    let config = StoreConfig::new(dir.path());
    config.set_no_persistence(true);
    let store = SettingsStore::new(config);

    let settings = store.instance::<Example>(None);
    assert!(store.is_new::<Example>(None));
    assert_eq!(settings.get(Example::YEAR), 2024);

    settings.set(Example::YEAR, 2500).unwrap();
    assert_eq!(settings.wait_for_autosave(), Some(false));
    assert!(!settings.save().saved);
    assert!(!store.save::<Example>(None));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!dir.path().join("Example.settings.new").exists());
}

#[test]
fn base_dir_change_applies_to_live_instances() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let store = store(first.path());
    let settings = store.instance::<Window>(None);

    store.config().set_base_dir(second.path());
    assert!(settings.save().saved);

    assert!(second.path().join("Window.settings").exists());
    assert!(!first.path().join("Window.settings").exists());
}

#[test]
fn non_finite_float_is_refused_and_the_file_stays_loadable() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let gauge = store.instance::<Gauge>(None);
    gauge.set(Gauge::LABEL, "pressure".to_string()).unwrap();

    for bad in [f64::NAN, f64::INFINITY] {
        assert_eq!(
            gauge.set(Gauge::RATIO, bad),
            Err(SettingsError::NonFiniteFloat {
                name: "ratio".into()
            })
        );
    }
    assert_eq!(gauge.get(Gauge::RATIO), 0.5);

    gauge.set(Gauge::RATIO, 0.125).unwrap();
    assert!(gauge.save().saved);

    let path = store.file_path::<Gauge>(None);
    let (loaded, found) = store.retrieve::<Gauge>(None);
    assert!(found);
    assert!(!corrupt_path(&path).exists());
    assert_eq!(loaded.get(Gauge::RATIO), 0.125);
    assert_eq!(loaded.get(Gauge::LABEL), "pressure");
}
