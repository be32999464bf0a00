//! The thumbnail engine: resolves a source, builds its key, and serves the
//! cached thumbnail or generates it.
//!
//! # Example
//!
//! ```no_run
//! use thumber::config::Config;
//! use thumber::engine::ThumbEngine;
//! use thumber::spec::{Operation, OutputFormat, ThumbnailSpec};
//!
//! let engine = ThumbEngine::new(Config::default())?;
//! let spec = ThumbnailSpec::new(Operation::Resize, Some(200), None, OutputFormat::Png)?;
//! let entry = engine.get_or_create("400x400.png", &spec)?;
//! println!("{}", entry.file_path.display());
//! # Ok::<(), thumber::error::ThumbError>(())
//! ```

use std::fs;

use crate::cache::{CacheEntry, CacheStore};
use crate::config::Config;
use crate::error::ThumbResult;
use crate::generator::Generator;
use crate::invalidate::Invalidator;
use crate::source::{PathResolver, SourceId};
use crate::spec::{build_key, CacheKey, ThumbnailSpec};

/// Ties the Path Resolver, Key Builder, Cache Store, Generator and
/// Invalidation Manager together. Shareable across threads.
#[derive(Debug)]
pub struct ThumbEngine {
    config: Config,
    resolver: PathResolver,
    store: CacheStore,
    generator: Generator,
}

impl ThumbEngine {
    /// Build an engine from an explicit configuration.
    ///
    /// # Errors
    ///
    /// `CacheIo` if the cache directory cannot be created.
    pub fn new(config: Config) -> ThumbResult<Self> {
        let resolver = PathResolver::new(&config.image_dir, config.remote_timeout())
            .with_remote_max_bytes(config.remote_max_bytes);
        let store = CacheStore::new(&config.cache_dir)?;
        let generator = Generator::new(config.jpeg_quality);
        log::debug!(
            "Engine ready: images in {}, cache in {}",
            resolver.image_dir().display(),
            store.root().display()
        );
        Ok(Self {
            config,
            resolver,
            store,
            generator,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    #[must_use]
    pub fn invalidator(&self) -> Invalidator<'_> {
        Invalidator::new(&self.resolver, &self.store)
    }

    /// Cache key for `spec` applied to `reference`.
    ///
    /// # Errors
    ///
    /// `InvalidPath` or `NotFound` from source identification.
    pub fn key_for(&self, reference: &str, spec: &ThumbnailSpec) -> ThumbResult<CacheKey> {
        let id = self.resolver.identify(reference)?;
        Ok(build_key(&id, spec))
    }

    /// Return the cached thumbnail for `spec` applied to `reference`,
    /// generating it on a miss or when the cached copy is stale.
    ///
    /// Remote sources are downloaded only when generation is needed.
    ///
    /// # Errors
    ///
    /// Any resolver, generator or cache error.
    pub fn get_or_create(&self, reference: &str, spec: &ThumbnailSpec) -> ThumbResult<CacheEntry> {
        let id = self.resolver.identify(reference)?;
        let key = build_key(&id, spec);
        self.store.create_if(
            &key,
            &id,
            spec,
            |entry| self.is_fresh(entry),
            || {
                let image = self.resolver.open(&id)?;
                self.generator.generate(&image, spec)
            },
        )
    }

    /// Look up a fresh entry by key without generating anything.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.store.lookup(key).filter(|entry| self.is_fresh(entry))
    }

    /// Whether `entry` may be served.
    ///
    /// A local source must still exist and must not have been modified after
    /// the entry was written. Remote sources are not re-fetched and always
    /// count as fresh.
    #[must_use]
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        if !self.config.check_freshness {
            return true;
        }
        match &entry.source {
            SourceId::Remote(_) => true,
            SourceId::Local(path) => match fs::metadata(path) {
                Ok(meta) => meta
                    .modified()
                    .map_or(true, |modified| entry.is_newer_than(modified)),
                Err(_) => {
                    log::debug!("Source of {} is gone: {}", entry.key, path.display());
                    false
                }
            },
        }
    }
}
