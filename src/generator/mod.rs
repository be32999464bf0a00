//! Thumbnail Generator: decodes a source image, applies a
//! [`ThumbnailSpec`] and encodes the result.
//!
//! # Operations
//!
//! | Operation      | Behavior                                                  |
//! |----------------|-----------------------------------------------------------|
//! | `crop`         | exact region, centered unless `x`/`y` are given           |
//! | `fit`          | scale to fit inside the box, aspect preserved             |
//! | `resize`       | exact size; a missing side follows the aspect ratio       |
//! | `resizeCanvas` | change canvas size without scaling, anchored, padded      |
//!
//! Sizing rules live in [`geometry`]; this module only moves pixels.

pub mod geometry;

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageError, ImageReader, Rgba, RgbaImage};

use crate::error::{ThumbError, ThumbResult};
use crate::source::SourceImage;
use crate::spec::{Operation, OutputFormat, ThumbnailSpec, MAX_DIMENSION};

/// Resampling filter used for every scaling operation.
const FILTER: FilterType = FilterType::Lanczos3;

/// Produces encoded thumbnails.
#[derive(Debug, Clone)]
pub struct Generator {
    default_quality: u8,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(90)
    }
}

impl Generator {
    /// Create a generator using `default_quality` for JPEG output when a
    /// spec does not set `quality`.
    #[must_use]
    pub fn new(default_quality: u8) -> Self {
        Self {
            default_quality: default_quality.clamp(1, 100),
        }
    }

    /// Generate the encoded thumbnail bytes for `spec` applied to `source`.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` or `DecodeError` if the source cannot be read,
    /// `EncodeError` if the target format rejects the result.
    pub fn generate(&self, source: &SourceImage, spec: &ThumbnailSpec) -> ThumbResult<Vec<u8>> {
        let img = decode(source.path())?;
        let (src_w, src_h) = img.dimensions();
        let thumb = transform(img, spec)?;
        log::debug!(
            "Transformed {} ({}x{}) with {} -> {}x{}",
            source.id(),
            src_w,
            src_h,
            spec.describe(),
            thumb.width(),
            thumb.height()
        );
        self.encode(&thumb, spec)
    }

    /// Encode `img` in the spec's format.
    ///
    /// # Errors
    ///
    /// `EncodeError` if the encoder fails (e.g. ICO larger than 256px).
    pub fn encode(&self, img: &DynamicImage, spec: &ThumbnailSpec) -> ThumbResult<Vec<u8>> {
        let format = spec.format();
        let mut buf = Cursor::new(Vec::new());
        let result = match format {
            OutputFormat::Jpg => {
                let quality = spec.quality().unwrap_or(self.default_quality);
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
            }
            OutputFormat::Bmp => {
                DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buf, format.image_format())
            }
            _ => DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, format.image_format()),
        };
        result.map_err(|e| ThumbError::EncodeError {
            format: format.extension().to_string(),
            message: e.to_string(),
        })?;
        Ok(buf.into_inner())
    }
}

/// Decode the image at `path`, sniffing the format from its content. The
/// file extension is ignored.
///
/// # Errors
///
/// `UnsupportedFormat` if the data is not a known image format,
/// `DecodeError` if it is corrupt or unreadable.
pub fn decode(path: &Path) -> ThumbResult<DynamicImage> {
    let decode_error = |message: String| ThumbError::DecodeError {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| decode_error(e.to_string()))?;
    let reader = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|e| decode_error(e.to_string()))?;

    if reader.format().is_none() {
        return Err(ThumbError::UnsupportedFormat(format!(
            "unrecognized image data in {}",
            path.display()
        )));
    }

    reader.decode().map_err(|e| match e {
        ImageError::Unsupported(u) => ThumbError::UnsupportedFormat(u.to_string()),
        other => decode_error(other.to_string()),
    })
}

/// Apply the spec's operation to a decoded image.
///
/// # Errors
///
/// `InvalidDimensions` if a side of the output, including one derived from
/// the aspect ratio, would exceed [`MAX_DIMENSION`].
pub fn transform(img: DynamicImage, spec: &ThumbnailSpec) -> ThumbResult<DynamicImage> {
    let src = img.dimensions();
    let out = match spec.operation() {
        Operation::Crop => {
            let region = geometry::crop_region(src, spec.width(), spec.height(), spec.crop_origin());
            img.crop_imm(region.x, region.y, region.width, region.height)
        }
        Operation::Fit => {
            let (w, h) = check_output(src, geometry::fit_within(src, spec.width(), spec.height()))?;
            img.resize_exact(w, h, FILTER)
        }
        Operation::Resize => {
            let (w, h) = check_output(src, geometry::resize_to(src, spec.width(), spec.height()))?;
            img.resize_exact(w, h, FILTER)
        }
        Operation::ResizeCanvas => {
            let canvas = geometry::canvas_size(src, spec.width(), spec.height(), spec.relative());
            if canvas == src {
                return Ok(img);
            }
            let canvas = check_output(src, canvas)?;
            let (x, y) = geometry::canvas_offset(src, canvas, spec.anchor());
            let mut out = RgbaImage::from_pixel(canvas.0, canvas.1, Rgba(spec.background()));
            imageops::overlay(&mut out, &img.to_rgba8(), x, y);
            DynamicImage::ImageRgba8(out)
        }
    };
    Ok(out)
}

fn check_output(src: (u32, u32), (w, h): (u32, u32)) -> ThumbResult<(u32, u32)> {
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(ThumbError::InvalidDimensions(format!(
            "output {w}x{h} for a {}x{} source exceeds {MAX_DIMENSION} pixels per side",
            src.0, src.1
        )));
    }
    Ok((w, h))
}
