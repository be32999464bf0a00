use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use image::GenericImageView;
use thumber::error::ThumbError;
use thumber::spec::{build_key, Operation, OutputFormat, ThumbnailSpec};

use crate::common::{write_gradient, TestHarness};

fn spec(op: Operation, w: Option<i64>, h: Option<i64>, format: OutputFormat) -> ThumbnailSpec {
    ThumbnailSpec::new(op, w, h, format).unwrap()
}

#[test]
fn test_resize_width_only() {
    let harness = TestHarness::new();
    let engine = harness.engine();

    let entry = engine
        .get_or_create("400x400.png", &spec(Operation::Resize, Some(200), None, OutputFormat::Png))
        .unwrap();

    assert!(entry.file_path.starts_with(harness.cache_dir()));
    assert_eq!(entry.file_path.extension().unwrap(), "png");
    let img = image::open(&entry.file_path).unwrap();
    assert_eq!(img.dimensions(), (200, 200));
}

#[test]
fn test_operation_output_sizes() {
    let harness = TestHarness::new();
    write_gradient(&harness.image("400x200.png"), 400, 200);
    let engine = harness.engine();

    let cases = [
        (Operation::Crop, Some(100), Some(50), (100, 50)),
        (Operation::Crop, Some(120), None, (120, 120)),
        (Operation::Fit, Some(100), Some(100), (100, 50)),
        (Operation::Resize, None, Some(100), (200, 100)),
        (Operation::Resize, Some(50), Some(300), (50, 300)),
        (Operation::ResizeCanvas, Some(500), Some(500), (500, 500)),
        (Operation::ResizeCanvas, None, None, (400, 200)),
    ];
    for (op, w, h, expected) in cases {
        let entry = engine
            .get_or_create("400x200.png", &spec(op, w, h, OutputFormat::Png))
            .unwrap();
        let img = image::open(&entry.file_path).unwrap();
        assert_eq!(img.dimensions(), expected, "{op} {w:?}x{h:?}");
    }
}

#[test]
fn test_second_request_is_a_hit() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let s = spec(Operation::Fit, Some(64), Some(64), OutputFormat::Webp);

    let first = engine.get_or_create("400x400.png", &s).unwrap();
    let bytes = std::fs::read(&first.file_path).unwrap();
    let second = engine.get_or_create("400x400.png", &s).unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read(&second.file_path).unwrap(), bytes);
    // One image, one sidecar
    assert_eq!(harness.cached_files(), 2);
}

#[test]
fn test_equivalent_references_share_entry() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let s = spec(Operation::Resize, Some(20), None, OutputFormat::Jpg);

    let relative = engine.get_or_create("400x400.png", &s).unwrap();
    let dotted = engine.get_or_create("./sub/../400x400.png", &s).unwrap();
    let absolute = engine
        .get_or_create(harness.image("400x400.png").to_str().unwrap(), &s)
        .unwrap();

    assert_eq!(relative.key, dotted.key);
    assert_eq!(relative.key, absolute.key);
    assert_eq!(engine.store().entries(None).len(), 1);
}

#[test]
fn test_distinct_specs_distinct_entries() {
    let harness = TestHarness::new();
    let engine = harness.engine();

    let a = engine
        .get_or_create("400x400.png", &spec(Operation::Resize, Some(20), None, OutputFormat::Jpg))
        .unwrap();
    let b = engine
        .get_or_create("400x400.png", &spec(Operation::Resize, Some(20), None, OutputFormat::Png))
        .unwrap();
    let c = engine
        .get_or_create(
            "400x400.png",
            &spec(Operation::Resize, Some(20), None, OutputFormat::Jpg)
                .with_option("quality", "50")
                .unwrap(),
        )
        .unwrap();

    assert_ne!(a.key, b.key);
    assert_ne!(a.key, c.key);
    assert_eq!(a.key.source_digest(), b.key.source_digest());
    assert_eq!(engine.store().entries(None).len(), 3);
}

#[test]
fn test_key_matches_builder() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let s = spec(Operation::Crop, Some(10), Some(10), OutputFormat::Gif);

    let entry = engine.get_or_create("400x400.png", &s).unwrap();
    let id = engine.resolver().identify("400x400.png").unwrap();
    assert_eq!(entry.key, build_key(&id, &s));
    assert_eq!(engine.key_for("400x400.png", &s).unwrap(), entry.key);
}

#[test]
fn test_missing_source_creates_nothing() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let result = engine.get_or_create(
        "missing/path.png",
        &spec(Operation::Resize, Some(10), None, OutputFormat::Png),
    );
    assert!(matches!(result, Err(ThumbError::NotFound(_))));
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_undecodable_source_creates_nothing() {
    let harness = TestHarness::new();
    std::fs::write(harness.image("text.png"), "plain text").unwrap();
    let engine = harness.engine();

    let result = engine.get_or_create(
        "text.png",
        &spec(Operation::Resize, Some(10), None, OutputFormat::Png),
    );
    assert!(matches!(result, Err(ThumbError::UnsupportedFormat(_))));
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_unreachable_remote_creates_nothing() {
    let harness = TestHarness::new();
    let mut config = harness.config();
    config.remote_timeout_secs = 2;
    let engine = thumber::engine::ThumbEngine::new(config).unwrap();

    let result = engine.get_or_create(
        "http://127.0.0.1:9/400x400.png",
        &spec(Operation::Resize, Some(10), None, OutputFormat::Png),
    );
    assert!(matches!(result, Err(ThumbError::UnreachableRemote { .. })));
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_oversized_remote_creates_nothing() {
    let harness = TestHarness::new();
    let body = std::fs::read(harness.image("400x400.png")).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/400x400.png", listener.local_addr().unwrap());
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&body);
    });

    let mut config = harness.config();
    config.remote_max_bytes = 100;
    let engine = thumber::engine::ThumbEngine::new(config).unwrap();
    let result = engine.get_or_create(
        &url,
        &spec(Operation::Resize, Some(10), None, OutputFormat::Png),
    );
    assert!(matches!(result, Err(ThumbError::UnreachableRemote { .. })));
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_ico_limit_is_encode_error() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let result = engine.get_or_create(
        "400x400.png",
        &spec(Operation::Resize, Some(300), None, OutputFormat::Ico),
    );
    assert!(matches!(result, Err(ThumbError::EncodeError { .. })));
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_entries_survive_new_engine() {
    let harness = TestHarness::new();
    let s = spec(Operation::Resize, Some(30), None, OutputFormat::Png);
    let first = harness.engine().get_or_create("400x400.png", &s).unwrap();

    let engine = harness.engine();
    assert_eq!(engine.lookup(&first.key), Some(first));
}
