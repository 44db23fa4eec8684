//! Error types for nbmend.
//!
//! Library crates use [`NbmendError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only conditions that abort an operation live here. Unclassified blocks,
//! validation findings and assembly advisories are returned as data.

use std::path::PathBuf;

/// Top-level error type for all nbmend operations.
#[derive(Debug, thiserror::Error)]
pub enum NbmendError {
    /// Configuration or repair profile loading/validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The input cannot be read as a well-formed notebook document.
    #[error("structural error: {message}")]
    Structural { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failure while serializing a document or report.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NbmendError>;

impl NbmendError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a structural (unparseable document) error.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural {
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

    /// Whether this error means the input document itself is malformed.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = NbmendError::config("duplicate section role 'summary'");
        assert_eq!(err.to_string(), "config error: duplicate section role 'summary'");

        let err = NbmendError::structural("cells must be an array");
        assert!(err.to_string().contains("cells must be an array"));
        assert!(err.is_structural());
    }

    #[test]
    fn io_error_carries_path() {
        let err = NbmendError::io(
            "/tmp/missing.ipynb",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("missing.ipynb"));
        assert!(!err.is_structural());
    }
}
