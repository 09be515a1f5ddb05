//! Resource kinds and resolution scopes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ResourceError;

/// The closed set of resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    CardTypes,
    FieldTypes,
    Workflows,
    LinkTypes,
    Templates,
    Reports,
    Calculations,
    GraphModels,
    GraphViews,
}

impl ResourceKind {
    /// Every kind, in listing order
    pub const ALL: [ResourceKind; 9] = [
        Self::CardTypes,
        Self::FieldTypes,
        Self::Workflows,
        Self::LinkTypes,
        Self::Templates,
        Self::Reports,
        Self::Calculations,
        Self::GraphModels,
        Self::GraphViews,
    ];

    /// Plural name used in resource names and as the folder name
    pub fn plural(self) -> &'static str {
        match self {
            Self::CardTypes => "cardTypes",
            Self::FieldTypes => "fieldTypes",
            Self::Workflows => "workflows",
            Self::LinkTypes => "linkTypes",
            Self::Templates => "templates",
            Self::Reports => "reports",
            Self::Calculations => "calculations",
            Self::GraphModels => "graphModels",
            Self::GraphViews => "graphViews",
        }
    }

    /// Folder kinds are a directory per resource; the rest are one JSON file.
    pub fn is_folder(self) -> bool {
        matches!(
            self,
            Self::Templates | Self::Reports | Self::GraphModels | Self::GraphViews
        )
    }

    /// Metadata file inside a folder resource
    pub fn metadata_file(self) -> Option<&'static str> {
        match self {
            Self::Templates => Some("template.json"),
            Self::Reports => Some("report.json"),
            Self::GraphModels => Some("model.json"),
            Self::GraphViews => Some("view.json"),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

impl FromStr for ResourceKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.plural() == s)
            .ok_or_else(|| ResourceError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Which resource layer a query considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Resources owned by the project
    Local,
    /// Resources from imported modules
    Imported,
    /// Local and imported
    #[default]
    All,
}

impl Scope {
    pub fn includes_local(self) -> bool {
        matches!(self, Self::Local | Self::All)
    }

    pub fn includes_imported(self) -> bool {
        matches!(self, Self::Imported | Self::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.plural().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("widgets".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_folder_kinds_have_metadata_files() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.is_folder(), kind.metadata_file().is_some(), "{kind}");
        }
    }

    #[test]
    fn test_scope_layers() {
        assert!(Scope::All.includes_local() && Scope::All.includes_imported());
        assert!(!Scope::Local.includes_imported());
        assert!(!Scope::Imported.includes_local());
    }
}
