//! Path canonicalization for source identifiers.
//!
//! Cache keys hash the source path, so two spellings of the same image must
//! canonicalize to the same string. This module provides:
//!
//! - Unicode NFC normalization. macOS stores file names in NFD while Linux
//!   and Windows typically use NFC, so `café.png` can have two byte
//!   representations.
//! - Lexical normalization that removes `.` components and resolves `..`
//!   without touching the filesystem, so paths that no longer exist still
//!   canonicalize (needed to clear thumbnails of deleted images).
//!
//! # Example
//!
//! ```
//! use std::path::{Path, PathBuf};
//! use thumber::source::path_utils::canonicalize_lexically;
//!
//! let path = canonicalize_lexically(Path::new("/img/./photos/../cafe\u{0301}.png"));
//! assert_eq!(path, PathBuf::from("/img/café.png"));
//! ```

use std::path::{Component, Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
///
/// # Example
///
/// ```
/// use thumber::source::path_utils::normalize_path_str;
///
/// let nfd = "cafe\u{0301}.png"; // NFD form
/// assert_eq!(normalize_path_str(nfd), "café.png");
/// ```
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Normalize a [`Path`] to NFC form.
///
/// If the path contains invalid UTF-8, returns the original path unchanged.
#[must_use]
pub fn normalize_pathbuf(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(normalize_path_str(s)),
        None => path.to_path_buf(),
    }
}

/// Remove `.` components and resolve `..` lexically.
///
/// A `..` at the root is dropped, as the filesystem would do. Symlinks are
/// not followed.
#[must_use]
pub fn normalize_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
                    _ => false,
                };
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Full canonical form used for source identifiers: lexical normalization
/// followed by NFC.
#[must_use]
pub fn canonicalize_lexically(path: &Path) -> PathBuf {
    normalize_pathbuf(&normalize_components(path))
}
