use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use thumber::cache::CacheStore;
use thumber::source::SourceId;
use thumber::spec::{build_key, Operation, OutputFormat, ThumbnailSpec};

use crate::common::TestHarness;

const THREADS: usize = 8;

#[test]
fn test_single_flight_runs_producer_once() {
    let harness = TestHarness::new();
    let store = Arc::new(CacheStore::new(harness.cache_dir()).unwrap());
    let source = SourceId::Local(harness.image("400x400.png"));
    let spec = ThumbnailSpec::new(Operation::Resize, Some(50), None, OutputFormat::Png).unwrap();
    let key = build_key(&source, &spec);

    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            let (source, spec, key) = (source.clone(), spec.clone(), key.clone());
            thread::spawn(move || {
                barrier.wait();
                let entry = store
                    .create(&key, &source, &spec, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(b"thumbnail bytes".to_vec())
                    })
                    .unwrap();
                std::fs::read(&entry.file_path).unwrap()
            })
        })
        .collect();

    let results: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|bytes| bytes == b"thumbnail bytes"));
    assert_eq!(store.in_flight(), 0);
    assert_eq!(harness.cached_files(), 2);
}

#[test]
fn test_concurrent_engine_requests_share_one_file() {
    let harness = TestHarness::new();
    let engine = Arc::new(harness.engine());
    let spec = ThumbnailSpec::new(Operation::Fit, Some(80), Some(80), OutputFormat::Jpg).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let spec = spec.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let entry = engine.get_or_create("400x400.png", &spec).unwrap();
                (entry.created_at, std::fs::read(&entry.file_path).unwrap())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(harness.cached_files(), 2);
}

#[test]
fn test_distinct_keys_generate_in_parallel() {
    let harness = TestHarness::new();
    let engine = Arc::new(harness.engine());

    let handles: Vec<_> = (1..=THREADS as i64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let spec = ThumbnailSpec::new(Operation::Resize, Some(i * 10), None, OutputFormat::Png)
                    .unwrap();
                engine.get_or_create("400x400.png", &spec).unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(engine.store().entries(None).len(), THREADS);
}

#[test]
fn test_clear_during_generation_leaves_consistent_cache() {
    let harness = TestHarness::new();
    let engine = Arc::new(harness.engine());

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for w in 1..=10 {
                let spec = ThumbnailSpec::new(Operation::Resize, Some(w), None, OutputFormat::Png)
                    .unwrap();
                engine.get_or_create("400x400.png", &spec).unwrap();
            }
        })
    };
    for _ in 0..5 {
        engine.invalidator().clear("400x400.png").unwrap();
    }
    writer.join().unwrap();

    // Every remaining entry is complete: image and sidecar both present.
    let entries = engine.store().entries(None);
    assert!(entries.iter().all(|e| e.file_path.is_file()));
    engine.invalidator().clear_all().unwrap();
    assert!(engine.store().entries(None).is_empty());
}
