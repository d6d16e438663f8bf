use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

use settings_store::{SettingsStore, Value};

use crate::store;
use crate::types::{Counted, Example, Grid, CELLS, COUNTED_LOADS};

const THREADS: usize = 8;

#[test]
fn one_instance_per_key_under_contention() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(store(dir.path()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.instance::<Counted>(Some("shared"))
            })
        })
        .collect();

    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for instance in &instances[1..] {
        assert!(instance.ptr_eq(&instances[0]));
    }
    assert_eq!(COUNTED_LOADS.load(Ordering::SeqCst), 1);

    // Cached from here on. Another marker is its own key.
    let _ = store.instance::<Counted>(Some("shared"));
    assert_eq!(COUNTED_LOADS.load(Ordering::SeqCst), 1);
    assert!(store.is_new::<Counted>(Some("other")));
    assert_eq!(COUNTED_LOADS.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_writes_to_distinct_names_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<SettingsStore> = Arc::new(store(dir.path()));
    let barrier = Arc::new(Barrier::new(CELLS.len()));

    let handles: Vec<_> = CELLS
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let grid = store.instance::<Grid>(None);
                barrier.wait();
                for round in 0..50 {
                    grid.set_value(name, Value::Int((i * 100 + round) as i64))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(store.save::<Grid>(None));
    let (loaded, found) = store.retrieve::<Grid>(None);
    assert!(found);
    for (i, name) in CELLS.iter().enumerate() {
        assert_eq!(loaded.get_value(name), Value::Int((i * 100 + 49) as i64));
    }
}

#[test]
fn concurrent_saves_leave_a_decodable_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(store(dir.path()));
    let settings = store.instance::<Example>(None);
    settings.set_auto_save(false);

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let settings = settings.clone();
            thread::spawn(move || {
                settings.set(Example::YEAR, 2000 + i as i64).unwrap();
                assert!(settings.save().saved);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let (loaded, found) = store.retrieve::<Example>(None);
    assert!(found);
    let year = loaded.get(Example::YEAR);
    assert!((2000..2000 + THREADS as i64).contains(&year));
    assert!(!dir.path().join("Example.settings.new").exists());
}
