//! Cache Store: content-addressed thumbnail storage on the filesystem.
//!
//! # Architecture
//!
//! * [`store`]: layout, lookup, single-flight creation and bulk deletion.
//! * [`entry`]: the entry model and its JSON sidecar.
//! * [`locks`]: per-key locks used for single-flight generation.
//!
//! # Consistency
//!
//! Every file is written to a temporary name in its final directory and
//! renamed into place, so readers never see partial thumbnails. An entry is
//! visible once both its image and its sidecar exist.

pub mod entry;
pub mod locks;
pub mod store;

pub use entry::CacheEntry;
pub use store::{CacheStore, DeletionReport};
