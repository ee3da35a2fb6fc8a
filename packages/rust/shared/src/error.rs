//! Error types for the research pipeline.
//!
//! Library crates use [`ResearchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside the per-URL fetch boundary.
    #[error("network error: {0}")]
    Network(String),

    /// Response or content parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Document store error other than corruption.
    #[error("storage error: {0}")]
    Storage(String),

    /// A persisted log line could not be decoded. Never auto-repaired.
    #[error("corrupt store {path:?} at line {line}: {message}")]
    CorruptStore {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Text-generation service failure (missing credential, HTTP, bad payload).
    #[error("service error: {0}")]
    Service(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (missing keywords/URLs, empty results, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ResearchError>;

impl ResearchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Report a malformed line in a persisted log.
    pub fn corrupt(path: impl Into<PathBuf>, line: usize, msg: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            line,
            message: msg.into(),
        }
    }
}
