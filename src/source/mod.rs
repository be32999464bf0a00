//! Path Resolver: turns image references into source identifiers and
//! readable files.
//!
//! A reference is one of:
//!
//! - a path relative to the configured image directory (`400x400.png`),
//! - an absolute filesystem path (`/srv/img/400x400.png`),
//! - an `http://` or `https://` URL.
//!
//! Resolution happens in two steps so that cache hits never touch the
//! network:
//!
//! 1. [`PathResolver::identify`] produces a canonical [`SourceId`] (and
//!    checks that local files exist);
//! 2. [`PathResolver::open`] makes the source readable, downloading remote
//!    images into a temporary file owned by the returned [`SourceImage`].
//!
//! [`PathResolver::resolve`] does both.

pub mod path_utils;
pub mod remote;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use url::Url;

use crate::error::{ThumbError, ThumbResult};
use path_utils::canonicalize_lexically;
use remote::RemoteFetcher;

/// Canonical identifier of a source image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum SourceId {
    /// Absolute, lexically normalized, NFC path on the local filesystem.
    Local(PathBuf),
    /// Normalized `http`/`https` URL.
    Remote(String),
}

impl SourceId {
    /// String hashed into cache keys.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Local(path) => format!("file:{}", path.to_string_lossy()),
            Self::Remote(url) => url.clone(),
        }
    }

    /// Local path, if this is a local source.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    /// Whether the source must be downloaded.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// Where the bytes of a [`SourceImage`] live.
#[derive(Debug)]
enum SourceFile {
    Local(PathBuf),
    Downloaded(NamedTempFile),
}

/// A source image that can be read from disk.
///
/// For remote sources the downloaded copy is deleted when this value is
/// dropped.
#[derive(Debug)]
pub struct SourceImage {
    id: SourceId,
    file: SourceFile,
    modified: Option<SystemTime>,
}

impl SourceImage {
    /// Wrap an existing local file.
    ///
    /// # Errors
    ///
    /// `NotFound` if `path` is not a readable file.
    pub fn local(path: &Path) -> ThumbResult<Self> {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let path = canonicalize_lexically(&absolute);
        let metadata =
            std::fs::metadata(&path).map_err(|_| ThumbError::NotFound(path.clone()))?;
        if !metadata.is_file() {
            return Err(ThumbError::NotFound(path));
        }
        Ok(Self {
            id: SourceId::Local(path.clone()),
            file: SourceFile::Local(path),
            modified: metadata.modified().ok(),
        })
    }

    /// The canonical identifier.
    #[must_use]
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    /// Path of a readable copy of the image.
    #[must_use]
    pub fn path(&self) -> &Path {
        match &self.file {
            SourceFile::Local(path) => path,
            SourceFile::Downloaded(tmp) => tmp.path(),
        }
    }

    /// Modification time of a local source; `None` for downloads.
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }
}

/// Resolves image references against a base directory.
#[derive(Debug)]
pub struct PathResolver {
    image_dir: PathBuf,
    fetcher: RemoteFetcher,
}

impl PathResolver {
    /// Create a resolver for `image_dir`, downloading remote images with
    /// the given timeout.
    #[must_use]
    pub fn new(image_dir: &Path, remote_timeout: Duration) -> Self {
        let absolute = std::path::absolute(image_dir).unwrap_or_else(|_| image_dir.to_path_buf());
        Self {
            image_dir: canonicalize_lexically(&absolute),
            fetcher: RemoteFetcher::new(remote_timeout),
        }
    }

    /// Reject remote images larger than `max_bytes`.
    #[must_use]
    pub fn with_remote_max_bytes(mut self, max_bytes: u64) -> Self {
        self.fetcher = self.fetcher.with_max_bytes(max_bytes);
        self
    }

    /// The directory relative references resolve against.
    #[must_use]
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Canonical identifier for `reference` without checking that it exists.
    ///
    /// # Errors
    ///
    /// `InvalidPath` for empty references, NUL bytes, unparsable URLs and
    /// URL schemes other than `http`/`https`.
    pub fn canonical_id(&self, reference: &str) -> ThumbResult<SourceId> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ThumbError::InvalidPath("empty image reference".to_string()));
        }
        if reference.contains('\0') {
            return Err(ThumbError::InvalidPath(format!(
                "reference contains a NUL byte: {:?}",
                reference
            )));
        }

        if reference.contains("://") {
            let url = Url::parse(reference)
                .map_err(|e| ThumbError::InvalidPath(format!("{reference}: {e}")))?;
            return match url.scheme() {
                "http" | "https" => Ok(SourceId::Remote(url.to_string())),
                scheme => Err(ThumbError::InvalidPath(format!(
                    "unsupported URL scheme '{scheme}' in {reference}"
                ))),
            };
        }

        let path = Path::new(reference);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.image_dir.join(path)
        };
        Ok(SourceId::Local(canonicalize_lexically(&joined)))
    }

    /// Canonical identifier for `reference`, checking that local files exist.
    ///
    /// Remote sources are not contacted here.
    ///
    /// # Errors
    ///
    /// `InvalidPath` as for [`canonical_id`](Self::canonical_id), `NotFound`
    /// if a local file does not exist or is not a regular file.
    pub fn identify(&self, reference: &str) -> ThumbResult<SourceId> {
        let id = self.canonical_id(reference)?;
        if let SourceId::Local(path) = &id {
            if !path.is_file() {
                return Err(ThumbError::NotFound(path.clone()));
            }
        }
        Ok(id)
    }

    /// Make an identified source readable.
    ///
    /// # Errors
    ///
    /// `NotFound` if a local file disappeared, `UnreachableRemote` if a
    /// download failed.
    pub fn open(&self, id: &SourceId) -> ThumbResult<SourceImage> {
        match id {
            SourceId::Local(path) => SourceImage::local(path),
            SourceId::Remote(url) => {
                let tmp = self.fetcher.fetch(url)?;
                Ok(SourceImage {
                    id: id.clone(),
                    file: SourceFile::Downloaded(tmp),
                    modified: None,
                })
            }
        }
    }

    /// Identify and open `reference` in one step.
    ///
    /// # Errors
    ///
    /// Any error of [`identify`](Self::identify) or [`open`](Self::open).
    pub fn resolve(&self, reference: &str) -> ThumbResult<SourceImage> {
        let id = self.identify(reference)?;
        self.open(&id)
    }
}
