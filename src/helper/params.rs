//! Parameters and HTML options accepted by the helper.

use std::collections::BTreeMap;

use crate::error::{ThumbError, ThumbResult};
use crate::spec::{parse_dimension, Operation, OutputFormat, ThumbnailSpec};

/// Thumbnail parameters: size, format and operation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbParams {
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// `None` uses the configured default format.
    pub format: Option<OutputFormat>,
    /// Extra operation options (`quality`, `anchor`, ...).
    pub options: BTreeMap<String, String>,
}

impl ThumbParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn width(mut self, width: i64) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn height(mut self, height: i64) -> Self {
        self.height = Some(height);
        self
    }

    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Parse string pairs as they come from templates or query strings.
    ///
    /// `width`, `height` and `format` are recognized; everything else is an
    /// operation option, validated later against the operation.
    ///
    /// # Errors
    ///
    /// `InvalidDimensions` for non-integer sizes, `UnsupportedFormat` for
    /// unknown formats.
    pub fn from_pairs<I, K, V>(pairs: I) -> ThumbResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::new();
        for (name, value) in pairs {
            let (name, value) = (name.as_ref(), value.as_ref());
            match name {
                "width" => params.width = Some(parse_dimension(name, value)?),
                "height" => params.height = Some(parse_dimension(name, value)?),
                "format" => params.format = Some(value.trim().parse()?),
                _ => {
                    params.options.insert(name.to_string(), value.to_string());
                }
            }
        }
        Ok(params)
    }

    /// Build the spec for `operation`.
    ///
    /// # Errors
    ///
    /// `InvalidDimensions` or `InvalidOption` from spec validation.
    pub fn to_spec(
        &self,
        operation: Operation,
        default_format: OutputFormat,
    ) -> ThumbResult<ThumbnailSpec> {
        let format = self.format.unwrap_or(default_format);
        let mut spec = ThumbnailSpec::new(operation, self.width, self.height, format)?;
        for (name, value) in &self.options {
            spec = spec.with_option(name, value)?;
        }
        Ok(spec)
    }
}

/// HTML options for the rendered image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    /// Absolute URL (with the configured base) rather than a path.
    pub full_base: bool,
    /// Wrap the image in a link to this URL.
    pub url: Option<String>,
    pub alt: String,
    /// Additional `img` attributes.
    pub attributes: BTreeMap<String, String>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            full_base: true,
            url: None,
            alt: String::new(),
            attributes: BTreeMap::new(),
        }
    }
}

impl ImageOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn full_base(mut self, full_base: bool) -> Self {
        self.full_base = full_base;
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }

    /// Add an `img` attribute.
    ///
    /// # Errors
    ///
    /// `InvalidOption` if `name` is not a plain attribute name or is one the
    /// helper sets itself.
    pub fn attribute(mut self, name: &str, value: impl Into<String>) -> ThumbResult<Self> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
        if !valid || matches!(name, "src" | "alt") {
            return Err(ThumbError::InvalidOption {
                name: name.to_string(),
                message: "not a valid image attribute".to_string(),
            });
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Parse string pairs: `fullBase`, `url` and `alt` are recognized,
    /// anything else becomes an attribute.
    ///
    /// # Errors
    ///
    /// `InvalidOption` for a `fullBase` value that is not a boolean or an
    /// invalid attribute name.
    pub fn from_pairs<I, K, V>(pairs: I) -> ThumbResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::new();
        for (name, value) in pairs {
            let (name, value) = (name.as_ref(), value.as_ref());
            options = match name {
                "fullBase" => match value {
                    "true" | "1" => options.full_base(true),
                    "false" | "0" => options.full_base(false),
                    other => {
                        return Err(ThumbError::InvalidOption {
                            name: name.to_string(),
                            message: format!("'{other}' is not a boolean"),
                        })
                    }
                },
                "url" => options.url(value),
                "alt" => options.alt(value),
                _ => options.attribute(name, value)?,
            };
        }
        Ok(options)
    }
}
