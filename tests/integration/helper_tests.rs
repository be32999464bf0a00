use thumber::error::ThumbError;
use thumber::helper::{HelperError, ImageOptions, RenderMode, ThumbHelper, ThumbParams, ThumbUrls};
use thumber::spec::Operation;

use crate::common::TestHarness;

const METHODS: [&str; 4] = ["crop", "fit", "resize", "resizeCanvas"];

fn params() -> ThumbParams {
    ThumbParams::from_pairs([("width", "200")]).unwrap()
}

#[test]
fn test_call_url_and_image_methods() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);

    for method in METHODS {
        let url_method = format!("{method}Url");

        for options in [ImageOptions::default(), ImageOptions::new().full_base(false)] {
            let url = helper
                .call(&url_method, Some("400x400.png"), &params(), &options)
                .unwrap();
            if options.full_base {
                assert!(url.starts_with("http://localhost/thumb/"), "{url}");
            } else {
                assert!(url.starts_with("/thumb/"), "{url}");
            }

            let html = helper
                .call(method, Some("400x400.png"), &params(), &options)
                .unwrap();
            assert_eq!(html, format!("<img src=\"{url}\" alt=\"\"/>"));
        }

        // With the `url` option the image is wrapped in a link
        let url = helper
            .call(&url_method, Some("400x400.png"), &params(), &ImageOptions::default())
            .unwrap();
        let html = helper
            .call(
                method,
                Some("400x400.png"),
                &params(),
                &ImageOptions::new().url("http://example"),
            )
            .unwrap();
        assert_eq!(
            html,
            format!("<a href=\"http://example\"><img src=\"{url}\" alt=\"\"/></a>")
        );
    }
}

#[test]
fn test_no_existing_method() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);

    let err = helper
        .call("noExisting", Some("400x400.png"), &params(), &ImageOptions::default())
        .unwrap_err();
    assert!(matches!(err, HelperError::MethodNotFound(_)));
    assert_eq!(
        err.to_string(),
        "Method `ThumbHelper::noExisting()` does not exist"
    );
}

#[test]
fn test_missing_path() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);

    for path in [None, Some(""), Some("  ")] {
        let err = helper
            .call("crop", path, &params(), &ImageOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Thumbnail path is missing");
    }
    assert_eq!(harness.cached_files(), 0);
}

#[test]
fn test_crop_without_dimensions() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);

    let err = helper
        .call("crop", Some("400x400.png"), &ThumbParams::new(), &ImageOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        HelperError::Thumb(ThumbError::InvalidDimensions(_))
    ));
}

#[test]
fn test_default_format_is_jpg() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);

    let url = helper
        .url(Operation::Resize, Some("400x400.png"), &params(), &ImageOptions::default())
        .unwrap();
    let entry = ThumbUrls::new(&engine).locate(&url).unwrap();
    assert_eq!(entry.file_path.extension().unwrap(), "jpg");
}

#[test]
fn test_render_matches_call() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);
    let options = ImageOptions::new().alt("A <thumb>");

    let typed = helper
        .render(Operation::Fit, RenderMode::Image, Some("400x400.png"), &params(), &options)
        .unwrap();
    let named = helper
        .call("fit", Some("400x400.png"), &params(), &options)
        .unwrap();
    assert_eq!(typed, named);
    assert!(typed.contains("alt=\"A &lt;thumb&gt;\""));
}

#[test]
fn test_extra_attributes_rendered() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);
    let options = ImageOptions::from_pairs([("class", "thumb"), ("width", "200")]).unwrap();

    let html = helper
        .call("resize", Some("400x400.png"), &params(), &options)
        .unwrap();
    assert!(html.ends_with(" class=\"thumb\" width=\"200\"/>"), "{html}");
}

#[test]
fn test_helper_url_locates_cached_file() {
    let harness = TestHarness::new();
    let engine = harness.engine();
    let helper = ThumbHelper::new(&engine);

    let url = helper
        .call("resizeCanvasUrl", Some("400x400.png"), &params(), &ImageOptions::default())
        .unwrap();
    let entry = ThumbUrls::new(&engine).locate(&url).unwrap();
    let img = image::open(&entry.file_path).unwrap();
    assert_eq!((img.width(), img.height()), (200, 400));
}
