//! Error types for resource resolution

use cardsmith_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Errors that can occur while resolving or naming resources
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Identifier breaks the naming grammar
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// Resource name is not `<prefix>/<kind>/<identifier>`
    #[error("invalid resource name '{name}'")]
    InvalidName { name: String },

    /// Unknown resource kind
    #[error("unknown resource kind '{kind}'")]
    UnknownKind { kind: String },

    /// Project prefix breaks the prefix grammar
    #[error("invalid card key prefix '{prefix}': must be 3-10 lowercase letters")]
    InvalidPrefix { prefix: String },

    /// No project configuration at the given path
    #[error("project configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// A resource file is not valid JSON for its kind
    #[error("invalid resource file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Card tree store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResourceError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }
}
