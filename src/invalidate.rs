//! Invalidation Manager: removes thumbnails when their source changes or
//! on operator request.
//!
//! Invalidation never checks that the source still exists, so thumbnails of
//! a deleted image can be cleared, and clearing a path with no thumbnails
//! succeeds with a count of zero.

use crate::cache::{CacheStore, DeletionReport};
use crate::error::ThumbResult;
use crate::source::PathResolver;

/// Clears cache entries by source or wholesale.
#[derive(Debug, Clone, Copy)]
pub struct Invalidator<'a> {
    resolver: &'a PathResolver,
    store: &'a CacheStore,
}

impl<'a> Invalidator<'a> {
    #[must_use]
    pub fn new(resolver: &'a PathResolver, store: &'a CacheStore) -> Self {
        Self { resolver, store }
    }

    /// Remove every thumbnail derived from `reference`, attempting all of
    /// them before reporting failures.
    ///
    /// # Errors
    ///
    /// `InvalidPath` if the reference is malformed.
    pub fn clear_report(&self, reference: &str) -> ThumbResult<DeletionReport> {
        let id = self.resolver.canonical_id(reference)?;
        log::debug!("Clearing thumbnails of {}", id);
        Ok(self.store.delete_for_source(&id))
    }

    /// Remove every thumbnail derived from `reference` and return how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// `InvalidPath` if the reference is malformed, `PartialDeletion` if
    /// some thumbnails could not be removed.
    pub fn clear(&self, reference: &str) -> ThumbResult<usize> {
        self.clear_report(reference)?.into_result()
    }

    /// Remove every thumbnail in the cache.
    #[must_use]
    pub fn clear_all_report(&self) -> DeletionReport {
        self.store.delete_all()
    }

    /// Remove every thumbnail in the cache and return how many were removed.
    ///
    /// # Errors
    ///
    /// `PartialDeletion` if some thumbnails could not be removed.
    pub fn clear_all(&self) -> ThumbResult<usize> {
        self.clear_all_report().into_result()
    }
}
