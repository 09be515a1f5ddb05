//! Error types for the card tree store

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while reading or writing the card tree
#[derive(Debug, Error)]
pub enum StoreError {
    /// A facet was requested but its file is not on disk
    #[error("missing file: {path}")]
    MissingFile { path: PathBuf },

    /// `save` was called with neither or both of content and metadata
    #[error("cannot save card '{key}': {message}")]
    InvalidSave { key: String, message: String },

    /// Metadata carries a field that is derived from the directory tree
    #[error("metadata must not contain structural field '{field}'")]
    StructuralField { field: String },

    /// Failed to read file
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata file is not valid JSON for a card
    #[error("invalid metadata in '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a read error, turning `NotFound` into [`StoreError::MissingFile`]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::MissingFile { path }
        } else {
            Self::Read { path, source }
        }
    }

    /// Create a write error
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid save error
    pub fn invalid_save(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSave {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_becomes_missing_file() {
        let err = StoreError::read(
            "/tmp/x/index.json",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, StoreError::MissingFile { .. }));
        assert_eq!(err.to_string(), "missing file: /tmp/x/index.json");
    }

    #[test]
    fn test_other_read_errors_keep_source() {
        let err = StoreError::read(
            "/tmp/x",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn test_invalid_save_display() {
        let err = StoreError::invalid_save("proj_abc", "nothing to save");
        assert_eq!(
            err.to_string(),
            "cannot save card 'proj_abc': nothing to save"
        );
    }
}
