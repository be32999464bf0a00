//! Error types and exit codes.
//!
//! [`ThumbError`] is the single error type of the thumbnail engine. The CLI
//! maps it onto an [`ExitCode`] and reports it either as one plain line or
//! as a [`StructuredError`] JSON object.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors produced by path resolution, generation and the cache.
#[derive(Debug, Error)]
pub enum ThumbError {
    /// The image reference is empty, malformed or uses an unsupported scheme.
    #[error("Invalid image path: {0}")]
    InvalidPath(String),

    /// A local source image does not exist.
    #[error("Image not found: {0}")]
    NotFound(PathBuf),

    /// A remote source could not be downloaded.
    #[error("Unable to fetch remote image {url}: {message}")]
    UnreachableRemote {
        /// The URL that was requested
        url: String,
        /// Why the fetch failed
        message: String,
    },

    /// The requested target format (or the source's format) is not supported.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The source image could not be decoded.
    #[error("Unable to decode {path}: {message}")]
    DecodeError {
        /// Path of the file being decoded
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// The thumbnail could not be encoded in the target format.
    #[error("Unable to encode thumbnail as {format}: {message}")]
    EncodeError {
        /// Target format extension
        format: String,
        /// Encoder message
        message: String,
    },

    /// Width/height are missing, zero, negative or not integers.
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// An operation option has an unknown name or an invalid value.
    #[error("Invalid option {name}: {message}")]
    InvalidOption {
        /// Option name
        name: String,
        /// What is wrong with it
        message: String,
    },

    /// A single cache file operation failed.
    #[error("Cache I/O error for {path}: {source}")]
    CacheIo {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Bulk deletion finished but some entries could not be removed.
    #[error("Error deleting thumbnails: {removed} deleted, {failed} failed (first failure: {first})")]
    PartialDeletion {
        /// Entries that were removed
        removed: usize,
        /// Entries that could not be removed
        failed: usize,
        /// Message of the first failure
        first: String,
    },
}

impl ThumbError {
    /// Build a `CacheIo` error for `path`.
    pub fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was caused by bad user input rather than the
    /// environment.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath(_)
                | Self::UnsupportedFormat(_)
                | Self::InvalidDimensions(_)
                | Self::InvalidOption { .. }
        )
    }
}

/// Result alias used throughout the engine.
pub type ThumbResult<T> = Result<T, ThumbError>;

/// Exit codes for the thumber CLI.
///
/// - 0: Success (including commands that matched nothing)
/// - 1: General error (I/O, decode, remote failures)
/// - 2: Invalid input (bad path, dimensions or format)
/// - 3: Partial failure (bulk deletion left some thumbnails behind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed.
    Success = 0,
    /// General error: an unexpected failure occurred.
    GeneralError = 1,
    /// Invalid input: the arguments were rejected.
    InvalidInput = 2,
    /// Partial failure: some thumbnails could not be deleted.
    PartialFailure = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "TH000",
            Self::GeneralError => "TH001",
            Self::InvalidInput => "TH002",
            Self::PartialFailure => "TH003",
        }
    }

    /// Pick the exit code for an application error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<ThumbError>() {
            Some(ThumbError::PartialDeletion { .. }) => Self::PartialFailure,
            Some(e) if e.is_invalid_input() => Self::InvalidInput,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "TH001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
