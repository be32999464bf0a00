//! Download of remote source images.
//!
//! The response body is streamed into a [`NamedTempFile`]. The file is
//! removed when the returned handle is dropped, and on every error path the
//! partially written file is dropped before the error is returned.
//!
//! Downloads larger than the configured limit are rejected, both up front
//! from `Content-Length` and while streaming.

use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use tempfile::NamedTempFile;

use crate::error::{ThumbError, ThumbResult};

/// Default cap on a downloaded source image.
pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Lazily built HTTP client with a fixed timeout.
#[derive(Debug)]
pub struct RemoteFetcher {
    timeout: Duration,
    max_bytes: u64,
    client: OnceLock<Client>,
}

impl RemoteFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_bytes: DEFAULT_MAX_BYTES,
            client: OnceLock::new(),
        }
    }

    /// Reject downloads larger than `max_bytes`.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn client(&self, url: &str) -> ThumbResult<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
            .map_err(|e| unreachable(url, e))?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Download `url` into a temporary file.
    ///
    /// # Errors
    ///
    /// `UnreachableRemote` for connection failures, timeouts, non-2xx
    /// responses and bodies over the size limit; `CacheIo` if the temporary
    /// file cannot be created.
    pub fn fetch(&self, url: &str) -> ThumbResult<NamedTempFile> {
        let client = self.client(url)?;
        log::debug!("Fetching remote image: {}", url);

        let mut response = client.get(url).send().map_err(|e| unreachable(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ThumbError::UnreachableRemote {
                url: url.to_string(),
                message: format!("HTTP status {status}"),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(self.too_large(url));
            }
        }

        let mut file = tempfile::Builder::new()
            .prefix("thumber-remote-")
            .tempfile()
            .map_err(|e| ThumbError::cache_io(std::env::temp_dir(), e))?;

        // One byte over the limit is enough to tell an oversized body.
        let mut body = response.by_ref().take(self.max_bytes.saturating_add(1));
        let bytes = io::copy(&mut body, &mut file).map_err(|e| ThumbError::UnreachableRemote {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if bytes > self.max_bytes {
            return Err(self.too_large(url));
        }
        file.flush()
            .map_err(|e| ThumbError::cache_io(file.path(), e))?;

        log::debug!("Fetched {} bytes from {}", bytes, url);
        Ok(file)
    }

    fn too_large(&self, url: &str) -> ThumbError {
        ThumbError::UnreachableRemote {
            url: url.to_string(),
            message: format!("image is larger than {} bytes", self.max_bytes),
        }
    }
}

fn unreachable(url: &str, err: reqwest::Error) -> ThumbError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    ThumbError::UnreachableRemote {
        url: url.to_string(),
        message,
    }
}
