//! Error types for the cv-adapter library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CvAdaptError`]: the requested operation failed (invalid upload,
//!   disallowed job URL, backend rejected the request, nothing to download).
//!   Returned as `Err(CvAdaptError)` and surfaced to the user as one message.
//!
//! * [`CacheError`]: the local content cache could not be read or written.
//!   The cache is a convenience layer, so these are logged and swallowed by
//!   [`crate::cache::ContentCache`]; callers only ever see "not cached".

use std::path::PathBuf;
use thiserror::Error;

/// All operation errors returned by the cv-adapter library.
///
/// `Display` is the message shown to the user, verbatim.
#[derive(Debug, Error)]
pub enum CvAdaptError {
    // ── Input validation ──────────────────────────────────────────────────
    /// The upload's MIME type is not on the allow-list.
    #[error("Please select a PDF or TXT file.")]
    UnsupportedFileType { file_name: String, mime_type: String },

    /// The upload exceeds the configured size ceiling.
    #[error("File size must be less than {}MB.", .max_bytes / (1024 * 1024))]
    FileTooLarge {
        file_name: String,
        size_bytes: u64,
        max_bytes: u64,
    },

    /// Local file does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// No cached document with that file name (or it expired).
    #[error("No cached document named '{file_name}'")]
    NotCached { file_name: String },

    /// `process` was triggered without a file or without a valid job URL.
    #[error("Please provide both a CV file and job URL.")]
    MissingInputs,

    /// The job URL is empty or not an absolute http(s) URL.
    #[error("Invalid job URL '{url}'")]
    InvalidJobUrl { url: String },

    /// The job URL's host is not on the allow-list.
    #[error("Job postings from '{host}' are not supported. Use one of: {}", .allowed.join(", "))]
    DisallowedJobDomain { host: String, allowed: Vec<String> },

    /// The general-purpose action needs instructions to steer it.
    #[error("Please describe what you want done in the additional instructions before processing.")]
    MissingInstructions,

    // ── Backend ───────────────────────────────────────────────────────────
    /// The service answered with a non-2xx status.
    #[error("{message}")]
    Backend { status: u16, message: String },

    /// The request never produced a response (connection refused, timeout…).
    #[error("Could not reach the adaptation service: {message}")]
    Transport { message: String },

    /// A 2xx response did not have the expected shape.
    #[error("Unexpected response from the adaptation service: {detail}")]
    MalformedResponse { detail: String },

    // ── Preconditions ─────────────────────────────────────────────────────
    /// A download was requested before any content exists.
    #[error("No adapted CV available for download.")]
    NoContent,

    /// A second `process` was triggered while one is still running.
    #[error("A request is already in progress. Please wait for it to finish.")]
    RequestInFlight,

    // ── Local storage ─────────────────────────────────────────────────────
    /// A cached payload is not valid base64.
    #[error("Cached document '{file_name}' is corrupt and cannot be restored")]
    CorruptCacheEntry { file_name: String },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Could not create or write an exported file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to decide how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caught before any network call; the user can fix the input.
    Validation,
    /// The service or the network failed.
    Backend,
    /// Local cache problems.
    Storage,
    /// The operation was called in a state where it cannot run.
    Precondition,
    /// Writing an exported file failed.
    Io,
    /// Misconfiguration or bugs.
    Internal,
}

impl CvAdaptError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CvAdaptError::UnsupportedFileType { .. }
            | CvAdaptError::FileTooLarge { .. }
            | CvAdaptError::FileNotFound { .. }
            | CvAdaptError::PermissionDenied { .. }
            | CvAdaptError::NotCached { .. }
            | CvAdaptError::MissingInputs
            | CvAdaptError::InvalidJobUrl { .. }
            | CvAdaptError::DisallowedJobDomain { .. }
            | CvAdaptError::MissingInstructions => ErrorCategory::Validation,
            CvAdaptError::Backend { .. }
            | CvAdaptError::Transport { .. }
            | CvAdaptError::MalformedResponse { .. } => ErrorCategory::Backend,
            CvAdaptError::CorruptCacheEntry { .. } => ErrorCategory::Storage,
            CvAdaptError::NoContent | CvAdaptError::RequestInFlight => {
                ErrorCategory::Precondition
            }
            CvAdaptError::OutputWriteFailed { .. } => ErrorCategory::Io,
            CvAdaptError::InvalidConfig(_) | CvAdaptError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// True when the failure happened before anything left the machine.
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }
}

/// A non-fatal error from the local content cache.
///
/// Never returned from the public cache API; logged at `warn` level and
/// turned into "nothing stored" / "nothing found".
#[derive(Debug, Error)]
pub enum CacheError {
    /// The storage key could not be read.
    #[error("cache read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The storage key could not be written.
    #[error("cache write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The stored JSON does not parse.
    #[error("cache contents are corrupt: {0}")]
    Corrupt(String),

    /// The write would exceed the store's quota.
    #[error("cache quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
}
