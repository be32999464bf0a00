use std::thread;
use std::time::{Duration, SystemTime};

use filetime::{set_file_mtime, FileTime};
use thumber::engine::ThumbEngine;
use thumber::error::ThumbError;
use thumber::spec::{Operation, OutputFormat, ThumbnailSpec};

use crate::common::TestHarness;

fn spec() -> ThumbnailSpec {
    ThumbnailSpec::new(Operation::Resize, Some(100), None, OutputFormat::Png).unwrap()
}

fn touch(path: &std::path::Path) {
    set_file_mtime(path, FileTime::from_system_time(SystemTime::now())).unwrap();
}

#[test]
fn test_modified_source_is_regenerated() {
    let harness = TestHarness::new();
    let engine = harness.engine();

    let first = engine.get_or_create("400x400.png", &spec()).unwrap();
    // Make sure the new mtime is strictly after the entry's creation time
    // even on filesystems with coarse timestamps.
    thread::sleep(Duration::from_millis(1100));
    touch(&harness.image("400x400.png"));

    assert!(engine.lookup(&first.key).is_none());
    let second = engine.get_or_create("400x400.png", &spec()).unwrap();
    assert_eq!(second.key, first.key);
    assert!(second.created_at > first.created_at);
    assert_eq!(engine.lookup(&second.key), Some(second));
}

#[test]
fn test_freshness_checks_can_be_disabled() {
    let harness = TestHarness::new();
    let mut config = harness.config();
    config.check_freshness = false;
    let engine = ThumbEngine::new(config).unwrap();

    let first = engine.get_or_create("400x400.png", &spec()).unwrap();
    thread::sleep(Duration::from_millis(1100));
    touch(&harness.image("400x400.png"));

    let second = engine.get_or_create("400x400.png", &spec()).unwrap();
    assert_eq!(second, first);
}

#[test]
fn test_deleted_source_is_not_served() {
    let harness = TestHarness::new();
    let engine = harness.engine();

    let entry = engine.get_or_create("400x400.png", &spec()).unwrap();
    std::fs::remove_file(harness.image("400x400.png")).unwrap();

    assert!(engine.lookup(&entry.key).is_none());
    assert!(matches!(
        engine.get_or_create("400x400.png", &spec()),
        Err(ThumbError::NotFound(_))
    ));
    // The stale file stays until it is cleared
    assert!(entry.file_path.exists());
    assert_eq!(engine.invalidator().clear("400x400.png").unwrap(), 1);
}

#[test]
fn test_older_mtime_keeps_entry() {
    let harness = TestHarness::new();
    let engine = harness.engine();

    let first = engine.get_or_create("400x400.png", &spec()).unwrap();
    let past = SystemTime::now() - Duration::from_secs(3600);
    set_file_mtime(harness.image("400x400.png"), FileTime::from_system_time(past)).unwrap();

    let second = engine.get_or_create("400x400.png", &spec()).unwrap();
    assert_eq!(second, first);
}

#[test]
fn test_source_modified_during_generation_is_stale() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let source = engine.resolver().identify("400x400.png").unwrap();
    let key = engine.key_for("400x400.png", &spec()).unwrap();

    let first = engine
        .store()
        .create(&key, &source, &spec(), || {
            thread::sleep(Duration::from_millis(1100));
            touch(&harness.image("400x400.png"));
            Ok(b"generated from the old content".to_vec())
        })
        .unwrap();

    assert!(!engine.is_fresh(&first));
    assert!(engine.lookup(&key).is_none());
    let second = engine.get_or_create("400x400.png", &spec()).unwrap();
    assert!(second.created_at > first.created_at);
    assert!(image::open(&second.file_path).is_ok());
}
