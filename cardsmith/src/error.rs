//! Error types for project operations

use cardsmith_resources::ResourceError;
use cardsmith_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for project operations
pub type Result<T> = std::result::Result<T, CardsmithError>;

/// Errors that can occur in project operations
#[derive(Debug, Error)]
pub enum CardsmithError {
    /// A project already exists at the given path
    #[error("project already exists at {path}")]
    AlreadyExists { path: PathBuf },

    /// Card not found
    #[error("card not found: {key}")]
    CardNotFound { key: String },

    /// Template not found
    #[error("template not found: {name}")]
    TemplateNotFound { name: String },

    /// Template has no cards to instantiate
    #[error("template '{name}' is empty")]
    EmptyTemplate { name: String },

    /// Card type does not resolve
    #[error("card type not found: {name}")]
    CardTypeNotFound { name: String },

    /// Workflow does not resolve
    #[error("workflow not found: {name}")]
    WorkflowNotFound { name: String },

    /// Workflow has no transition into the workflow
    #[error("workflow '{workflow}' has no initial state")]
    NoInitialState { workflow: String },

    /// Could not find enough unused card keys
    #[error("could not allocate {count} unique card keys in {attempts} attempts")]
    KeyAllocation { count: usize, attempts: usize },

    /// Card failed validation; nothing was written
    #[error("card '{key}' is invalid: {message}")]
    Validation { key: String, message: String },

    /// `rank_card` was given a card that is not a sibling
    #[error("card '{after}' is not a sibling of '{key}'")]
    NotSibling { key: String, after: String },

    /// Resource already exists
    #[error("resource already exists: {name}")]
    ResourceExists { name: String },

    /// Resource not found
    #[error("resource not found: {name}")]
    ResourceNotFound { name: String },

    /// Module with this prefix is already imported
    #[error("module '{prefix}' is already imported")]
    ModuleExists { prefix: String },

    /// Source project cannot be imported as a module
    #[error("cannot import module from {path}: {message}")]
    InvalidModule { path: PathBuf, message: String },

    /// Card tree store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Resource resolution error
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Blocking task failed
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CardsmithError {
    /// Create a card not found error
    pub fn card_not_found(key: impl Into<String>) -> Self {
        Self::CardNotFound { key: key.into() }
    }

    /// Create a validation error
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an invalid module error
    pub fn invalid_module(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidModule {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for errors that mean "the thing asked for does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CardNotFound { .. }
                | Self::TemplateNotFound { .. }
                | Self::ResourceNotFound { .. }
                | Self::CardTypeNotFound { .. }
                | Self::WorkflowNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CardsmithError::EmptyTemplate {
            name: "test/templates/page".into(),
        };
        assert_eq!(err.to_string(), "template 'test/templates/page' is empty");
    }

    #[test]
    fn test_not_found() {
        assert!(CardsmithError::card_not_found("test_abc").is_not_found());
        assert!(!CardsmithError::validation("test_abc", "bad").is_not_found());
    }
}
