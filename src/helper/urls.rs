//! Served thumbnail URLs.
//!
//! A thumbnail is served at `<base_url><route_prefix>/<token>`, where the
//! token is the URL-safe, unpadded base64 encoding of the cached file name
//! `<key>.<ext>`. The token carries everything needed to find the file, so
//! serving needs no lookup table.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::cache::CacheEntry;
use crate::engine::ThumbEngine;
use crate::error::{ThumbError, ThumbResult};
use crate::spec::{CacheKey, OutputFormat};

/// Builds and resolves served thumbnail URLs.
#[derive(Debug, Clone, Copy)]
pub struct ThumbUrls<'a> {
    engine: &'a ThumbEngine,
}

impl<'a> ThumbUrls<'a> {
    #[must_use]
    pub fn new(engine: &'a ThumbEngine) -> Self {
        Self { engine }
    }

    fn prefix(&self) -> &str {
        self.engine.config().route_prefix.trim_end_matches('/')
    }

    /// URL of `entry`, absolute when `full_base` is set.
    #[must_use]
    pub fn url_for(&self, entry: &CacheEntry, full_base: bool) -> String {
        let token = encode_token(&entry.file_name());
        let path = format!("{}/{}", self.prefix(), token);
        if full_base {
            format!(
                "{}{}",
                self.engine.config().base_url.trim_end_matches('/'),
                path
            )
        } else {
            path
        }
    }

    /// Map a served URL (absolute or path-only) back to its cache entry.
    ///
    /// # Errors
    ///
    /// `InvalidPath` if the URL is not a thumbnail URL, `NotFound` if the
    /// thumbnail is not cached or its source changed since.
    pub fn locate(&self, url: &str) -> ThumbResult<CacheEntry> {
        let (key, format) = self.parse(url)?;
        match self.engine.lookup(&key) {
            Some(entry) if entry.format() == format => Ok(entry),
            _ => Err(ThumbError::NotFound(
                self.engine.store().path_for(&key, format),
            )),
        }
    }

    /// Extract the key and format from a served URL.
    ///
    /// # Errors
    ///
    /// `InvalidPath` if the URL does not end in `<route_prefix>/<token>` or
    /// the token does not decode to a cache file name.
    pub fn parse(&self, url: &str) -> ThumbResult<(CacheKey, OutputFormat)> {
        let invalid = || ThumbError::InvalidPath(format!("not a thumbnail URL: {url}"));

        let path = url.split(['?', '#']).next().unwrap_or(url);
        let (dir, token) = path.rsplit_once('/').ok_or_else(invalid)?;
        if !dir.ends_with(self.prefix()) {
            return Err(invalid());
        }

        let name = URL_SAFE_NO_PAD
            .decode(token)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(invalid)?;
        let (stem, ext) = name.split_once('.').ok_or_else(invalid)?;
        let key = CacheKey::parse(stem).ok_or_else(invalid)?;
        let format: OutputFormat = ext.parse().map_err(|_| invalid())?;
        if format.extension() != ext {
            return Err(invalid());
        }
        Ok((key, format))
    }
}

fn encode_token(file_name: &str) -> String {
    URL_SAFE_NO_PAD.encode(file_name.as_bytes())
}
