//! On-disk layout of a project
//!
//! ```text
//! <project>/
//! ├── .cards/
//! │   ├── local/
//! │   │   ├── cardsConfig.json
//! │   │   ├── cardTypes/<id>.json
//! │   │   └── templates/<id>/{template.json, c/}
//! │   └── modules/<prefix>/     # same layout as local/
//! └── cardRoot/
//! ```

use std::path::{Path, PathBuf};

use crate::kind::ResourceKind;

pub const CARDS_DIR: &str = ".cards";
pub const LOCAL_DIR: &str = "local";
pub const MODULES_DIR: &str = "modules";
pub const CONFIG_FILE: &str = "cardsConfig.json";
pub const CARD_ROOT_DIR: &str = "cardRoot";

/// Paths derived from a project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.cards`
    pub fn cards_dir(&self) -> PathBuf {
        self.root.join(CARDS_DIR)
    }

    /// `.cards/local`
    pub fn local_dir(&self) -> PathBuf {
        self.cards_dir().join(LOCAL_DIR)
    }

    /// `.cards/modules`
    pub fn modules_dir(&self) -> PathBuf {
        self.cards_dir().join(MODULES_DIR)
    }

    /// `.cards/modules/<prefix>`
    pub fn module_dir(&self, prefix: &str) -> PathBuf {
        self.modules_dir().join(prefix)
    }

    pub fn config_file(&self) -> PathBuf {
        self.local_dir().join(CONFIG_FILE)
    }

    pub fn card_root(&self) -> PathBuf {
        self.root.join(CARD_ROOT_DIR)
    }

    /// Folder holding local resources of `kind`
    pub fn resource_dir(&self, kind: ResourceKind) -> PathBuf {
        kind_dir(&self.local_dir(), kind)
    }

    /// Location of a local resource: the JSON file for single-file kinds,
    /// the resource folder for folder kinds.
    pub fn resource_path(&self, kind: ResourceKind, identifier: &str) -> PathBuf {
        resource_path_in(&self.local_dir(), kind, identifier)
    }
}

/// `<layer>/<kindPlural>`
pub fn kind_dir(layer: &Path, kind: ResourceKind) -> PathBuf {
    layer.join(kind.plural())
}

/// Resource location inside a layer directory (`.cards/local` or a module dir)
pub fn resource_path_in(layer: &Path, kind: ResourceKind, identifier: &str) -> PathBuf {
    if kind.is_folder() {
        kind_dir(layer, kind).join(identifier)
    } else {
        kind_dir(layer, kind).join(format!("{identifier}.json"))
    }
}

/// Card root of a template folder: `<template>/c`
pub fn template_card_root(template_dir: &Path) -> PathBuf {
    template_dir.join(cardsmith_store::CHILDREN_DIR)
}
