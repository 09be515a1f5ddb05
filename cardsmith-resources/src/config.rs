//! Project configuration stored in `cardsConfig.json`

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::error::{ResourceError, Result};
use cardsmith_store::{atomic_write, StoreError};

/// An imported module as recorded in the project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSetting {
    /// The module's card key prefix
    pub name: String,
    /// Where the module was imported from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub card_key_prefix: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modules: Vec<ModuleSetting>,
}

impl ProjectConfig {
    /// New configuration; fails if `prefix` breaks the prefix grammar.
    pub fn new(prefix: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let config = Self {
            card_key_prefix: prefix.into(),
            name: name.into(),
            modules: Vec::new(),
        };
        validate_prefix(&config.card_key_prefix)?;
        Ok(config)
    }

    /// Load and validate `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let json = match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResourceError::ConfigNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(StoreError::read(path, e).into()),
        };
        let config: Self = serde_json::from_str(&json).map_err(|source| ResourceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        validate_prefix(&config.card_key_prefix)?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes()).await?;
        Ok(())
    }

    pub fn has_module(&self, prefix: &str) -> bool {
        self.modules.iter().any(|m| m.name == prefix)
    }
}

/// 3 to 10 lowercase ASCII letters
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let valid = (3..=10).contains(&prefix.len()) && prefix.bytes().all(|b| b.is_ascii_lowercase());
    if valid {
        Ok(())
    } else {
        Err(ResourceError::InvalidPrefix {
            prefix: prefix.to_string(),
        })
    }
}
