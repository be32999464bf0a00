//! Embeddable helper for templating layers.
//!
//! [`ThumbHelper::render`] is the typed entry point. [`ThumbHelper::call`]
//! dispatches by method name for layers that only have strings, using a
//! fixed table of the eight names `crop`, `fit`, `resize`, `resizeCanvas`
//! and their `...Url` variants.
//!
//! ```no_run
//! use thumber::config::Config;
//! use thumber::engine::ThumbEngine;
//! use thumber::helper::{ImageOptions, ThumbHelper, ThumbParams};
//!
//! let engine = ThumbEngine::new(Config::default())?;
//! let helper = ThumbHelper::new(&engine);
//! let params = ThumbParams::new().width(200);
//! let html = helper.call("resize", Some("400x400.png"), &params, &ImageOptions::default())?;
//! // <img src="http://localhost/thumb/..." alt=""/>
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod params;
pub mod urls;

use askama::Template;
use thiserror::Error;

use crate::engine::ThumbEngine;
use crate::error::ThumbError;
use crate::spec::Operation;

pub use params::{ImageOptions, ThumbParams};
pub use urls::ThumbUrls;

/// What a helper call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// An `<img>` element (optionally wrapped in a link).
    Image,
    /// The bare thumbnail URL.
    Url,
}

/// Name table for [`ThumbHelper::call`].
const METHODS: [(&str, Operation, RenderMode); 8] = [
    ("crop", Operation::Crop, RenderMode::Image),
    ("cropUrl", Operation::Crop, RenderMode::Url),
    ("fit", Operation::Fit, RenderMode::Image),
    ("fitUrl", Operation::Fit, RenderMode::Url),
    ("resize", Operation::Resize, RenderMode::Image),
    ("resizeUrl", Operation::Resize, RenderMode::Url),
    ("resizeCanvas", Operation::ResizeCanvas, RenderMode::Image),
    ("resizeCanvasUrl", Operation::ResizeCanvas, RenderMode::Url),
];

/// Errors returned by the helper.
#[derive(Debug, Error)]
pub enum HelperError {
    /// The method name is not in the dispatch table.
    #[error("Method `ThumbHelper::{0}()` does not exist")]
    MethodNotFound(String),

    /// No image path was given.
    #[error("Thumbnail path is missing")]
    MissingPath,

    /// Resolution, generation or caching failed.
    #[error(transparent)]
    Thumb(#[from] ThumbError),

    /// The image element could not be rendered.
    #[error("HTML template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Template)]
#[template(path = "img.html")]
struct ImgTag<'a> {
    src: &'a str,
    alt: &'a str,
    link: Option<&'a str>,
    attributes: Vec<(&'a str, &'a str)>,
}

/// Produces thumbnail URLs and image elements.
#[derive(Debug, Clone, Copy)]
pub struct ThumbHelper<'a> {
    engine: &'a ThumbEngine,
}

impl<'a> ThumbHelper<'a> {
    #[must_use]
    pub fn new(engine: &'a ThumbEngine) -> Self {
        Self { engine }
    }

    /// Look up a method name in the dispatch table.
    #[must_use]
    pub fn method(name: &str) -> Option<(Operation, RenderMode)> {
        METHODS
            .iter()
            .find(|(method, _, _)| *method == name)
            .map(|&(_, op, mode)| (op, mode))
    }

    /// Dispatch by method name.
    ///
    /// # Errors
    ///
    /// `MissingPath` if `path` is absent or empty (checked first),
    /// `MethodNotFound` for names outside the table, and any error of
    /// [`render`](Self::render).
    pub fn call(
        &self,
        name: &str,
        path: Option<&str>,
        params: &ThumbParams,
        options: &ImageOptions,
    ) -> Result<String, HelperError> {
        let path = require_path(path)?;
        let (operation, mode) =
            Self::method(name).ok_or_else(|| HelperError::MethodNotFound(name.to_string()))?;
        self.render(operation, mode, Some(path), params, options)
    }

    /// Generate (or reuse) the thumbnail and return its URL or `<img>`
    /// element.
    ///
    /// # Errors
    ///
    /// `MissingPath` before any I/O if `path` is absent or empty, `Thumb`
    /// for invalid params or generation failures, `Template` if rendering
    /// fails.
    pub fn render(
        &self,
        operation: Operation,
        mode: RenderMode,
        path: Option<&str>,
        params: &ThumbParams,
        options: &ImageOptions,
    ) -> Result<String, HelperError> {
        let path = require_path(path)?;
        let spec = params.to_spec(operation, self.engine.config().default_format)?;
        let entry = self.engine.get_or_create(path, &spec)?;
        let url = ThumbUrls::new(self.engine).url_for(&entry, options.full_base);

        match mode {
            RenderMode::Url => Ok(url),
            RenderMode::Image => {
                let tag = ImgTag {
                    src: &url,
                    alt: &options.alt,
                    link: options.url.as_deref(),
                    attributes: options
                        .attributes
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str()))
                        .collect(),
                };
                Ok(tag.render()?.trim_end().to_string())
            }
        }
    }

    /// Shorthand for [`render`](Self::render) in [`RenderMode::Url`].
    ///
    /// # Errors
    ///
    /// As for [`render`](Self::render).
    pub fn url(
        &self,
        operation: Operation,
        path: Option<&str>,
        params: &ThumbParams,
        options: &ImageOptions,
    ) -> Result<String, HelperError> {
        self.render(operation, RenderMode::Url, path, params, options)
    }
}

fn require_path(path: Option<&str>) -> Result<&str, HelperError> {
    path.map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(HelperError::MissingPath)
}
