use std::fs;
use std::path::Path;

use thumber::error::ThumbError;
use thumber::spec::{Operation, OutputFormat, ThumbnailSpec};

use crate::common::{write_gradient, TestHarness};

fn spec(width: i64) -> ThumbnailSpec {
    ThumbnailSpec::new(Operation::Resize, Some(width), None, OutputFormat::Png).unwrap()
}

/// Swap a cached image for a non-empty directory so it cannot be removed
/// with a file deletion.
fn make_undeletable(file: &Path) {
    fs::remove_file(file).unwrap();
    fs::create_dir(file).unwrap();
    fs::write(file.join("keep"), "x").unwrap();
}

#[test]
fn test_clear_removes_only_that_source() {
    let harness = TestHarness::new();
    write_gradient(&harness.image("other.png"), 50, 50);
    let engine = harness.engine();

    for w in [10, 20, 30] {
        engine.get_or_create("400x400.png", &spec(w)).unwrap();
    }
    let kept = engine.get_or_create("other.png", &spec(10)).unwrap();

    assert_eq!(engine.invalidator().clear("400x400.png").unwrap(), 3);
    assert_eq!(engine.store().entries(None), vec![kept]);
}

#[test]
fn test_clear_twice() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    engine.get_or_create("400x400.png", &spec(10)).unwrap();

    assert_eq!(engine.invalidator().clear("400x400.png").unwrap(), 1);
    assert_eq!(engine.invalidator().clear("400x400.png").unwrap(), 0);
}

#[test]
fn test_clear_path_that_never_existed() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    assert_eq!(engine.invalidator().clear("missing/path.png").unwrap(), 0);
}

#[test]
fn test_clear_after_source_deleted() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    engine.get_or_create("400x400.png", &spec(10)).unwrap();
    fs::remove_file(harness.image("400x400.png")).unwrap();

    assert_eq!(engine.invalidator().clear("400x400.png").unwrap(), 1);
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_clear_tolerates_partially_removed_entries() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let a = engine.get_or_create("400x400.png", &spec(10)).unwrap();
    let b = engine.get_or_create("400x400.png", &spec(20)).unwrap();

    // Someone else removed one image and one whole entry.
    fs::remove_file(&a.file_path).unwrap();
    for entry in fs::read_dir(b.file_path.parent().unwrap()).unwrap() {
        let path = entry.unwrap().path();
        if path.file_name().unwrap().to_str().unwrap().starts_with(b.key.as_str()) {
            fs::remove_file(path).unwrap();
        }
    }

    let report = engine.invalidator().clear_report("400x400.png").unwrap();
    assert!(report.is_complete());
    assert_eq!(report.removed_count(), 1);
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_clear_all() {
    let harness = TestHarness::new();
    write_gradient(&harness.image("other.png"), 50, 50);
    let engine = harness.engine();
    engine.get_or_create("400x400.png", &spec(10)).unwrap();
    engine.get_or_create("other.png", &spec(10)).unwrap();

    assert_eq!(engine.invalidator().clear_all().unwrap(), 2);
    assert_eq!(harness.cached_files(), 0);
    assert!(harness.cache_dir().is_dir());
    assert_eq!(engine.invalidator().clear_all().unwrap(), 0);

    // The cache keeps working after being emptied
    engine.get_or_create("400x400.png", &spec(10)).unwrap();
    assert_eq!(engine.store().entries(None).len(), 1);
}

#[test]
fn test_clear_all_keeps_foreign_files() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    engine.get_or_create("400x400.png", &spec(10)).unwrap();
    fs::write(harness.cache_dir().join("README"), "not a thumbnail").unwrap();

    assert_eq!(engine.invalidator().clear_all().unwrap(), 1);
    assert!(harness.cache_dir().join("README").exists());
}

#[test]
fn test_clear_attempts_every_entry_before_failing() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let entries: Vec<_> = [10, 20, 30]
        .into_iter()
        .map(|w| engine.get_or_create("400x400.png", &spec(w)).unwrap())
        .collect();
    make_undeletable(&entries[1].file_path);

    let err = engine.invalidator().clear("400x400.png").unwrap_err();
    match err {
        ThumbError::PartialDeletion { removed, failed, .. } => {
            assert_eq!((removed, failed), (2, 1));
        }
        other => panic!("Expected PartialDeletion, got {other:?}"),
    }
    assert!(!entries[0].file_path.exists());
    assert!(!entries[2].file_path.exists());
    assert!(engine.store().entries(None).is_empty());
}

#[test]
fn test_clear_all_attempts_every_entry_before_failing() {
    let harness = TestHarness::new();
    write_gradient(&harness.image("other.png"), 50, 50);
    let engine = harness.engine();
    let broken = engine.get_or_create("400x400.png", &spec(10)).unwrap();
    let other = engine.get_or_create("other.png", &spec(10)).unwrap();
    make_undeletable(&broken.file_path);

    let report = engine.invalidator().clear_all_report();
    assert_eq!(report.removed_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert!(!other.file_path.exists());
    assert!(matches!(
        report.into_result(),
        Err(ThumbError::PartialDeletion { removed: 1, failed: 1, .. })
    ));
}
