//! Filesystem-backed thumbnail store.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use walkdir::WalkDir;

use super::entry::{file_name, CacheEntry, Sidecar};
use super::locks::KeyLocks;
use crate::error::{ThumbError, ThumbResult};
use crate::source::SourceId;
use crate::spec::key::KEY_LEN;
use crate::spec::{source_digest, CacheKey, OutputFormat, ThumbnailSpec};

/// Prefix of in-progress writes. Never a valid key prefix.
const TEMP_PREFIX: &str = ".tmp-";

/// Temporary files older than this are leftovers of a crashed writer.
const STALE_TEMP_AGE: Duration = Duration::from_secs(300);

/// Outcome of a bulk deletion.
#[derive(Debug, Clone, Default)]
pub struct DeletionReport {
    /// Entries removed by this call.
    pub removed: usize,
    /// Files that could not be removed, with the error message.
    pub failures: Vec<(PathBuf, String)>,
}

impl DeletionReport {
    /// Number of entries removed.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed
    }

    /// Number of entries that could not be fully removed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether every matched entry was removed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(mut self, other: Self) -> Self {
        self.removed += other.removed;
        self.failures.extend(other.failures);
        self
    }

    /// Convert into the number of removed entries.
    ///
    /// # Errors
    ///
    /// `PartialDeletion` if any entry could not be removed.
    pub fn into_result(self) -> ThumbResult<usize> {
        match self.failures.first() {
            None => Ok(self.removed),
            Some((path, message)) => Err(ThumbError::PartialDeletion {
                removed: self.removed,
                failed: self.failures.len(),
                first: format!("{}: {}", path.display(), message),
            }),
        }
    }
}

/// Thumbnail cache rooted at one directory.
///
/// Layout: `<root>/<shard>/<key>.<ext>` with a `<key>.json` sidecar, where
/// the shard is the first two hex characters of the key. All thumbnails of
/// one source share a shard because the key starts with the source digest.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    locks: KeyLocks,
}

impl CacheStore {
    /// Open (and create if needed) a cache rooted at `root`.
    ///
    /// # Errors
    ///
    /// `CacheIo` if the directory cannot be created.
    pub fn new(root: &Path) -> ThumbResult<Self> {
        fs::create_dir_all(root).map_err(|e| ThumbError::cache_io(root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            locks: KeyLocks::new(),
        })
    }

    /// The cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.shard())
    }

    fn sidecar_path(&self, key: &CacheKey) -> PathBuf {
        self.shard_dir(key).join(format!("{key}.json"))
    }

    /// Where the thumbnail for `key` lives (whether or not it exists).
    #[must_use]
    pub fn path_for(&self, key: &CacheKey, format: OutputFormat) -> PathBuf {
        self.shard_dir(key).join(file_name(key, format))
    }

    /// Find the entry stored under `key`.
    ///
    /// An entry exists only if both its sidecar and its image are present.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let sidecar_path = self.sidecar_path(key);
        let bytes = match fs::read(&sidecar_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Unreadable cache sidecar {}: {}", sidecar_path.display(), e);
                }
                return None;
            }
        };

        let sidecar: Sidecar = match serde_json::from_slice(&bytes) {
            Ok(sidecar) => sidecar,
            Err(e) => {
                log::warn!("Corrupt cache sidecar {}: {}", sidecar_path.display(), e);
                return None;
            }
        };

        let entry = sidecar.into_entry(key, &self.shard_dir(key))?;
        entry.file_path.is_file().then_some(entry)
    }

    /// Return the entry for `key`, producing it if absent.
    ///
    /// # Errors
    ///
    /// Any error of `producer`, or `CacheIo` if the entry cannot be written.
    pub fn create<F>(
        &self,
        key: &CacheKey,
        source: &SourceId,
        spec: &ThumbnailSpec,
        producer: F,
    ) -> ThumbResult<CacheEntry>
    where
        F: FnOnce() -> ThumbResult<Vec<u8>>,
    {
        self.create_if(key, source, spec, |_| true, producer)
    }

    /// Like [`create`](Self::create), but an existing entry is reused only
    /// if `accept` returns true for it; otherwise it is regenerated and
    /// replaced.
    ///
    /// At most one caller per key runs `producer` at a time. Callers that
    /// waited on the lock see the freshly written entry and reuse it.
    ///
    /// The entry's `created_at` is taken before `producer` runs, so a source
    /// modified during generation makes the new entry stale.
    ///
    /// # Errors
    ///
    /// Any error of `producer`, or `CacheIo` if the entry cannot be written.
    pub fn create_if<A, F>(
        &self,
        key: &CacheKey,
        source: &SourceId,
        spec: &ThumbnailSpec,
        accept: A,
        producer: F,
    ) -> ThumbResult<CacheEntry>
    where
        A: Fn(&CacheEntry) -> bool,
        F: FnOnce() -> ThumbResult<Vec<u8>>,
    {
        self.locks.with_lock(key.as_str(), || {
            if let Some(entry) = self.lookup(key) {
                if accept(&entry) {
                    log::debug!("Cache hit for {}", key);
                    return Ok(entry);
                }
                log::debug!("Replacing stale cache entry {}", key);
            } else {
                log::debug!("Cache miss for {}", key);
            }

            let started = Utc::now();
            let bytes = producer()?;
            self.write_entry(key, source, spec, &bytes, started)
        })
    }

    fn write_entry(
        &self,
        key: &CacheKey,
        source: &SourceId,
        spec: &ThumbnailSpec,
        bytes: &[u8],
        created_at: DateTime<Utc>,
    ) -> ThumbResult<CacheEntry> {
        let dir = self.shard_dir(key);
        fs::create_dir_all(&dir).map_err(|e| ThumbError::cache_io(&dir, e))?;

        let entry = CacheEntry {
            key: key.clone(),
            source: source.clone(),
            spec: spec.clone(),
            file_path: self.path_for(key, spec.format()),
            created_at,
        };

        // Image first: an entry is only visible once its sidecar exists.
        write_atomic(&dir, &entry.file_path, bytes)?;
        let sidecar = serde_json::to_vec_pretty(&entry.to_sidecar())
            .map_err(|e| ThumbError::cache_io(&dir, io::Error::other(e)))?;
        write_atomic(&dir, &self.sidecar_path(key), &sidecar)?;

        log::info!(
            "Cached {} for {} ({} bytes)",
            entry.file_name(),
            source,
            bytes.len()
        );
        Ok(entry)
    }

    /// Remove every entry derived from `source`.
    ///
    /// Files that disappeared in the meantime are not failures.
    #[must_use]
    pub fn delete_for_source(&self, source: &SourceId) -> DeletionReport {
        let digest = source_digest(source);
        let dir = self.root.join(&digest[..2]);
        let files = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&digest))
                })
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return DeletionReport {
                    removed: 0,
                    failures: vec![(dir, e.to_string())],
                }
            }
        };

        let report = delete_grouped(group_by_key(files));
        log::info!(
            "Deleted {} thumbnails for {} ({} failures)",
            report.removed,
            source,
            report.failure_count()
        );
        report
    }

    /// Remove every entry in the cache, plus stale temporary files.
    #[must_use]
    pub fn delete_all(&self) -> DeletionReport {
        let mut files = Vec::new();
        let mut report = DeletionReport::default();

        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            match entry {
                // Not only regular files: anything named like an entry must go.
                Ok(entry) => files.push(entry.into_path()),
                Err(e) => {
                    let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                    if e.io_error().map(io::Error::kind) != Some(io::ErrorKind::NotFound) {
                        report.failures.push((path, e.to_string()));
                    }
                }
            }
        }

        let (temps, keyed): (Vec<_>, Vec<_>) = files.into_iter().partition(|p| is_temp_file(p));
        for temp in temps.iter().filter(|p| is_stale(p)) {
            if let Err(e) = fs::remove_file(temp) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Could not remove {}: {}", temp.display(), e);
                }
            }
        }

        report = report.merge(delete_grouped(group_by_key(keyed)));

        // Empty shards only; anything unexpected stays.
        if let Ok(read_dir) = fs::read_dir(&self.root) {
            for shard in read_dir.filter_map(Result::ok) {
                let _ = fs::remove_dir(shard.path());
            }
        }

        log::info!(
            "Deleted {} thumbnails from {} ({} failures)",
            report.removed,
            self.root.display(),
            report.failure_count()
        );
        report
    }

    /// Enumerate stored entries, all of them or those derived from `source`,
    /// ordered by key.
    #[must_use]
    pub fn entries(&self, source: Option<&SourceId>) -> Vec<CacheEntry> {
        let prefix = source.map(source_digest);
        let walker = match &prefix {
            Some(digest) => WalkDir::new(self.root.join(&digest[..2])).min_depth(1).max_depth(1),
            None => WalkDir::new(&self.root).min_depth(2).max_depth(2),
        };

        let mut keys: Vec<CacheKey> = walker
            .into_iter()
            .filter_map(Result::ok)
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(".json"))
                    .and_then(CacheKey::parse)
            })
            .filter(|key| prefix.as_deref().map_or(true, |d| key.source_digest() == d))
            .collect();
        keys.sort();

        keys.iter().filter_map(|key| self.lookup(key)).collect()
    }

    /// Number of keys currently being generated.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.locks.in_flight()
    }
}

fn write_atomic(dir: &Path, dest: &Path, bytes: &[u8]) -> ThumbResult<()> {
    let builder = || tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir);
    let mut tmp = match builder() {
        // The shard may have been removed by a concurrent `delete_all`.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| ThumbError::cache_io(dir, e))?;
            builder()
        }
        other => other,
    }
    .map_err(|e| ThumbError::cache_io(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| ThumbError::cache_io(tmp.path(), e))?;
    tmp.persist(dest)
        .map_err(|e| ThumbError::cache_io(dest, e.error))?;
    Ok(())
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_TEMP_AGE)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(TEMP_PREFIX))
}

/// Group cache files by the key their name starts with. Files that do not
/// look like cache files are ignored.
fn group_by_key(files: Vec<PathBuf>) -> BTreeMap<CacheKey, Vec<PathBuf>> {
    let mut groups: BTreeMap<CacheKey, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| n.as_bytes().get(KEY_LEN) == Some(&b'.'))
            .and_then(|n| CacheKey::parse(&n[..KEY_LEN]));
        if let Some(key) = key {
            groups.entry(key).or_default().push(path);
        }
    }
    groups
}

enum Removal {
    Removed,
    Gone,
    Failed(PathBuf, String),
}

/// Remove every file of one entry, continuing past failures. The first
/// failure is reported.
fn remove_entry_files(files: &[PathBuf]) -> Removal {
    let mut removed_any = false;
    let mut failure = None;
    for path in files {
        match fs::remove_file(path) {
            Ok(()) => removed_any = true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                failure.get_or_insert_with(|| (path.clone(), e.to_string()));
            }
        }
    }
    match failure {
        Some((path, message)) => Removal::Failed(path, message),
        None if removed_any => Removal::Removed,
        None => Removal::Gone,
    }
}

fn delete_grouped(groups: BTreeMap<CacheKey, Vec<PathBuf>>) -> DeletionReport {
    let groups: Vec<_> = groups.into_iter().collect();
    groups
        .par_iter()
        .map(|(key, files)| match remove_entry_files(files) {
            Removal::Removed => DeletionReport {
                removed: 1,
                failures: Vec::new(),
            },
            Removal::Gone => {
                log::debug!("Cache entry {} already removed", key);
                DeletionReport::default()
            }
            Removal::Failed(path, message) => {
                log::warn!("Failed to delete {}: {}", path.display(), message);
                DeletionReport {
                    removed: 0,
                    failures: vec![(path, message)],
                }
            }
        })
        .reduce(DeletionReport::default, DeletionReport::merge)
}
