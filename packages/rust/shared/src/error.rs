//! Error types for the content-list tools.
//!
//! Library crates use [`ContentListError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Heading extraction and outline rendering never fail; these variants cover
//! configuration, the preference store, and the admin update path.

use std::path::PathBuf;

/// Top-level error type for all content-list operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentListError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown key, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A preference update refused by the write policy. Nothing was written.
    #[error("update rejected: {reason}")]
    Rejected { reason: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentListError>;

impl ContentListError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a rejection for a preference update.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
