//! Deterministic cache keys.
//!
//! A key has the form `<source digest>_<spec digest>`, each half being the
//! first [`DIGEST_LEN`] hex characters of a BLAKE3 hash:
//!
//! - the source digest hashes the canonical source identifier, so every
//!   thumbnail derived from one source shares a key prefix and can be found
//!   by prefix for invalidation;
//! - the spec digest hashes a canonical serialization of the spec
//!   (`op=..;w=..;h=..;f=..;k=v..`), where a missing dimension is `~`.
//!
//! Keys are fixed-length lowercase hex plus one `_`, safe as file names and
//! URL segments, and stable across processes.

use std::fmt;

use crate::source::SourceId;
use crate::spec::ThumbnailSpec;

/// Hex characters kept from each BLAKE3 digest.
pub const DIGEST_LEN: usize = 32;

/// Total key length: two digests and the separator.
pub const KEY_LEN: usize = DIGEST_LEN * 2 + 1;

/// A validated cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Parse a key string, returning `None` unless it has the exact key shape.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != KEY_LEN || bytes[DIGEST_LEN] != b'_' {
            return None;
        }
        let hex_ok = bytes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != DIGEST_LEN)
            .all(|(_, b)| b.is_ascii_digit() || (b'a'..=b'f').contains(b));
        hex_ok.then(|| Self(s.to_string()))
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The source half of the key.
    #[must_use]
    pub fn source_digest(&self) -> &str {
        &self.0[..DIGEST_LEN]
    }

    /// The spec half of the key.
    #[must_use]
    pub fn spec_digest(&self) -> &str {
        &self.0[DIGEST_LEN + 1..]
    }

    /// Shard directory name (first two hex characters).
    #[must_use]
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn digest(input: &str) -> String {
    let hash = blake3::hash(input.as_bytes());
    hash.to_hex()[..DIGEST_LEN].to_string()
}

/// Digest of a canonical source identifier.
#[must_use]
pub fn source_digest(source: &SourceId) -> String {
    digest(&source.canonical())
}

/// Canonical serialization of a spec. Separators inside option names and
/// values are escaped so distinct specs never serialize identically.
#[must_use]
pub fn canonical_spec(spec: &ThumbnailSpec) -> String {
    let dim = |d: Option<u32>| d.map_or_else(|| "~".to_string(), |v| v.to_string());
    let mut out = format!(
        "op={};w={};h={};f={}",
        spec.operation().name(),
        dim(spec.width()),
        dim(spec.height()),
        spec.format().extension()
    );
    for (name, value) in spec.options() {
        out.push(';');
        out.push_str(&escape(name));
        out.push('=');
        out.push_str(&escape(value));
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Digest of a spec's canonical serialization.
#[must_use]
pub fn spec_digest(spec: &ThumbnailSpec) -> String {
    digest(&canonical_spec(spec))
}

/// Build the cache key for `spec` applied to `source`.
#[must_use]
pub fn build_key(source: &SourceId, spec: &ThumbnailSpec) -> CacheKey {
    CacheKey(format!("{}_{}", source_digest(source), spec_digest(spec)))
}
