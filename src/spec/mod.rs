//! Thumbnail specifications and cache keys.
//!
//! A [`ThumbnailSpec`] describes one transformation of a source image:
//! the [`Operation`], target width/height, [`OutputFormat`] and a sorted map
//! of operation options. Specs are validated on construction and immutable
//! afterwards, so every spec that exists can be generated.
//!
//! The [`key`] submodule turns a source identifier plus a spec into the
//! deterministic [`CacheKey`] that names the cached file.
//!
//! # Example
//!
//! ```
//! use thumber::spec::{Operation, OutputFormat, ThumbnailSpec};
//!
//! let spec = ThumbnailSpec::new(Operation::Resize, Some(200), None, OutputFormat::Png)
//!     .unwrap();
//! assert_eq!(spec.width(), Some(200));
//! assert_eq!(spec.height(), None);
//! ```

pub mod key;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ThumbError, ThumbResult};

pub use key::{build_key, source_digest, spec_digest, CacheKey};

/// Largest width or height a thumbnail may request.
pub const MAX_DIMENSION: u32 = 10_000;

/// Transformation applied to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Cut an exact-size region out of the source.
    Crop,
    /// Scale to fit inside the box, preserving aspect ratio.
    Fit,
    /// Scale to the exact size; a missing side follows the aspect ratio.
    Resize,
    /// Change the canvas size without scaling the image.
    ResizeCanvas,
}

impl Operation {
    /// All operations, in helper order.
    pub const ALL: [Operation; 4] = [
        Operation::Crop,
        Operation::Fit,
        Operation::Resize,
        Operation::ResizeCanvas,
    ];

    /// Name used by the helper surface and in cache keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Crop => "crop",
            Self::Fit => "fit",
            Self::Resize => "resize",
            Self::ResizeCanvas => "resizeCanvas",
        }
    }

    /// Whether the operation is meaningful with neither width nor height,
    /// in which case the source size passes through.
    #[must_use]
    pub fn allows_passthrough(self) -> bool {
        matches!(self, Self::ResizeCanvas)
    }

    /// Option names accepted by this operation (besides `quality`).
    #[must_use]
    pub fn option_names(self) -> &'static [&'static str] {
        match self {
            Self::Crop => &["x", "y"],
            Self::Fit | Self::Resize => &[],
            Self::ResizeCanvas => &["anchor", "bgcolor", "relative"],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crop" => Ok(Self::Crop),
            "fit" => Ok(Self::Fit),
            "resize" => Ok(Self::Resize),
            "resizeCanvas" | "resize_canvas" | "resize-canvas" => Ok(Self::ResizeCanvas),
            other => Err(format!("unknown operation '{other}'")),
        }
    }
}

/// Encoded format of a generated thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG, the default.
    #[default]
    #[serde(alias = "jpeg")]
    Jpg,
    /// PNG
    Png,
    /// GIF (single frame)
    Gif,
    /// Windows bitmap
    Bmp,
    /// TIFF
    #[serde(alias = "tif")]
    Tiff,
    /// WebP (lossless)
    Webp,
    /// Windows icon (at most 256x256)
    Ico,
}

impl OutputFormat {
    /// Canonical file extension, also used in cache keys.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Webp => "webp",
            Self::Ico => "ico",
        }
    }

    /// MIME type to serve the thumbnail with.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Webp => "image/webp",
            Self::Ico => "image/x-icon",
        }
    }

    /// Matching `image` crate format.
    #[must_use]
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Gif => image::ImageFormat::Gif,
            Self::Bmp => image::ImageFormat::Bmp,
            Self::Tiff => image::ImageFormat::Tiff,
            Self::Webp => image::ImageFormat::WebP,
            Self::Ico => image::ImageFormat::Ico,
        }
    }

    /// Whether the format can store an alpha channel.
    #[must_use]
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpg | Self::Bmp)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ThumbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            "webp" => Ok(Self::Webp),
            "ico" => Ok(Self::Ico),
            _ => Err(ThumbError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Where the source sits on a resized canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    /// Horizontal and vertical placement factors: 0 = start, 1 = middle,
    /// 2 = end.
    #[must_use]
    pub fn factors(self) -> (u8, u8) {
        match self {
            Self::TopLeft => (0, 0),
            Self::Top => (1, 0),
            Self::TopRight => (2, 0),
            Self::Left => (0, 1),
            Self::Center => (1, 1),
            Self::Right => (2, 1),
            Self::BottomLeft => (0, 2),
            Self::Bottom => (1, 2),
            Self::BottomRight => (2, 2),
        }
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(Self::TopLeft),
            "top" => Ok(Self::Top),
            "top-right" => Ok(Self::TopRight),
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom" => Ok(Self::Bottom),
            "bottom-right" => Ok(Self::BottomRight),
            other => Err(format!("unknown anchor '{other}'")),
        }
    }
}

/// An immutable, validated thumbnail request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    operation: Operation,
    width: Option<u32>,
    height: Option<u32>,
    format: OutputFormat,
    options: BTreeMap<String, String>,
}

impl ThumbnailSpec {
    /// Create a spec, validating the dimensions.
    ///
    /// Dimensions are taken as signed integers so that zero and negative
    /// requests are reported rather than wrapped.
    ///
    /// # Errors
    ///
    /// `InvalidDimensions` if a dimension is zero, negative or above
    /// [`MAX_DIMENSION`], or if both are missing for an operation that needs
    /// at least one.
    pub fn new(
        operation: Operation,
        width: Option<i64>,
        height: Option<i64>,
        format: OutputFormat,
    ) -> ThumbResult<Self> {
        let width = width.map(|w| check_dimension("width", w)).transpose()?;
        let height = height.map(|h| check_dimension("height", h)).transpose()?;

        if width.is_none() && height.is_none() && !operation.allows_passthrough() {
            return Err(ThumbError::InvalidDimensions(format!(
                "{operation} requires a width or a height"
            )));
        }

        Ok(Self {
            operation,
            width,
            height,
            format,
            options: BTreeMap::new(),
        })
    }

    /// Add an operation option, validating its name and value.
    ///
    /// # Errors
    ///
    /// `InvalidOption` if the operation does not accept `name` or the value
    /// does not parse.
    pub fn with_option(mut self, name: &str, value: &str) -> ThumbResult<Self> {
        let value = value.trim();
        if name != "quality" && !self.operation.option_names().contains(&name) {
            return Err(invalid_option(
                name,
                format!("not supported by {}", self.operation),
            ));
        }

        match name {
            "x" | "y" => {
                value
                    .parse::<u32>()
                    .map_err(|_| invalid_option(name, format!("'{value}' is not a pixel offset")))?;
            }
            "quality" => match value.parse::<u8>() {
                Ok(q) if (1..=100).contains(&q) => {}
                _ => return Err(invalid_option(name, format!("'{value}' is not in 1..=100"))),
            },
            "anchor" => {
                value.parse::<Anchor>().map_err(|e| invalid_option(name, e))?;
            }
            "bgcolor" => {
                parse_color(value).map_err(|e| invalid_option(name, e))?;
            }
            "relative" => {
                parse_bool(value).map_err(|e| invalid_option(name, e))?;
            }
            _ => {}
        }

        self.options.insert(name.to_string(), value.to_string());
        Ok(self)
    }

    /// The operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Requested width, if any.
    #[must_use]
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    /// Requested height, if any.
    #[must_use]
    pub fn height(&self) -> Option<u32> {
        self.height
    }

    /// Output format.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Operation options, sorted by name.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Raw option value.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Crop origin from the `x`/`y` options.
    #[must_use]
    pub fn crop_origin(&self) -> (Option<u32>, Option<u32>) {
        let parse = |name| self.option(name).and_then(|v| v.parse().ok());
        (parse("x"), parse("y"))
    }

    /// JPEG quality override.
    #[must_use]
    pub fn quality(&self) -> Option<u8> {
        self.option("quality").and_then(|v| v.parse().ok())
    }

    /// Canvas anchor, `center` when unset.
    #[must_use]
    pub fn anchor(&self) -> Anchor {
        self.option("anchor")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Canvas background color as RGBA, white when unset.
    #[must_use]
    pub fn background(&self) -> [u8; 4] {
        self.option("bgcolor")
            .and_then(|v| parse_color(v).ok())
            .unwrap_or([0xff, 0xff, 0xff, 0xff])
    }

    /// Whether canvas dimensions are relative to the source size.
    #[must_use]
    pub fn relative(&self) -> bool {
        self.option("relative")
            .and_then(|v| parse_bool(v).ok())
            .unwrap_or(false)
    }

    /// Short human-readable description, e.g. `resize 200x~ png`.
    #[must_use]
    pub fn describe(&self) -> String {
        let dim = |d: Option<u32>| d.map_or_else(|| "~".to_string(), |v| v.to_string());
        let mut out = format!(
            "{} {}x{} {}",
            self.operation,
            dim(self.width),
            dim(self.height),
            self.format
        );
        for (k, v) in &self.options {
            out.push_str(&format!(" {k}={v}"));
        }
        out
    }
}

fn check_dimension(name: &str, value: i64) -> ThumbResult<u32> {
    if value <= 0 {
        return Err(ThumbError::InvalidDimensions(format!(
            "{name} must be a positive integer, got {value}"
        )));
    }
    match u32::try_from(value) {
        Ok(v) if v <= MAX_DIMENSION => Ok(v),
        _ => Err(ThumbError::InvalidDimensions(format!(
            "{name} must not exceed {MAX_DIMENSION}, got {value}"
        ))),
    }
}

/// Parse a dimension given as text (CLI flags, template attributes).
///
/// Accepts positive integers only; `1.5`, `-3`, `0` and non-numbers fail
/// with `InvalidDimensions`.
///
/// # Errors
///
/// `InvalidDimensions` for anything but a positive integer.
pub fn parse_dimension(name: &str, raw: &str) -> ThumbResult<i64> {
    let raw = raw.trim();
    let value: i64 = raw.parse().map_err(|_| {
        ThumbError::InvalidDimensions(format!("{name} must be an integer, got '{raw}'"))
    })?;
    check_dimension(name, value)?;
    Ok(value)
}

fn invalid_option(name: &str, message: impl Into<String>) -> ThumbError {
    ThumbError::InvalidOption {
        name: name.to_string(),
        message: message.into(),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
fn parse_color(value: &str) -> Result<[u8; 4], String> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    let err = || format!("'{value}' is not a hex color");
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(err());
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
    match hex.len() {
        3 => {
            let mut rgba = [0xff; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(err)? as u8;
                rgba[i] = v * 17;
            }
            Ok(rgba)
        }
        6 => Ok([byte(0)?, byte(2)?, byte(4)?, 0xff]),
        8 => Ok([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => Err(err()),
    }
}
