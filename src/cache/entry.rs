//! Cache entry definitions.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::SourceId;
use crate::spec::{CacheKey, OutputFormat, ThumbnailSpec};

/// Version written into every sidecar.
pub const SIDECAR_VERSION: u32 = 1;

/// A generated thumbnail stored in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Cache key the entry is stored under
    pub key: CacheKey,
    /// Source the thumbnail was derived from
    pub source: SourceId,
    /// Transformation that produced it
    pub spec: ThumbnailSpec,
    /// Location of the encoded thumbnail
    pub file_path: PathBuf,
    /// When the thumbnail was written
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Encoded format of the thumbnail.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.spec.format()
    }

    /// File name of the thumbnail (`<key>.<ext>`), used in served URLs.
    #[must_use]
    pub fn file_name(&self) -> String {
        file_name(&self.key, self.format())
    }

    /// Size of the thumbnail file, 0 if it cannot be read.
    #[must_use]
    pub fn size_on_disk(&self) -> u64 {
        std::fs::metadata(&self.file_path).map_or(0, |m| m.len())
    }

    /// Whether the entry was written no earlier than `source_modified`.
    #[must_use]
    pub fn is_newer_than(&self, source_modified: SystemTime) -> bool {
        self.created_at >= DateTime::<Utc>::from(source_modified)
    }

    pub(crate) fn to_sidecar(&self) -> Sidecar {
        Sidecar {
            version: SIDECAR_VERSION,
            key: self.key.to_string(),
            source: self.source.clone(),
            spec: self.spec.clone(),
            created_at: self.created_at,
        }
    }
}

/// File name of the thumbnail stored under `key`.
#[must_use]
pub fn file_name(key: &CacheKey, format: OutputFormat) -> String {
    format!("{}.{}", key, format.extension())
}

/// JSON document stored next to each thumbnail as `<key>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Sidecar {
    pub version: u32,
    pub key: String,
    pub source: SourceId,
    pub spec: ThumbnailSpec,
    pub created_at: DateTime<Utc>,
}

impl Sidecar {
    /// Turn a sidecar read for `key` into an entry whose image lives in
    /// `dir`. Returns `None` if the sidecar describes another key.
    pub fn into_entry(self, key: &CacheKey, dir: &Path) -> Option<CacheEntry> {
        if self.key != key.as_str() || self.version != SIDECAR_VERSION {
            return None;
        }
        let file_path = dir.join(file_name(key, self.spec.format()));
        Some(CacheEntry {
            key: key.clone(),
            source: self.source,
            spec: self.spec,
            file_path,
            created_at: self.created_at,
        })
    }
}
