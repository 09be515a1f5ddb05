//! Card types: Card, CardMetadata, CardAttachment, CardDetails

use cardsmith_rank::{Rank, Ranked};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::scan::is_card_key;

/// Metadata file inside a card directory
pub const METADATA_FILE: &str = "index.json";

/// Content file inside a card directory
pub const CONTENT_FILE: &str = "index.adoc";

/// Child cards directory
pub const CHILDREN_DIR: &str = "c";

/// Attachments directory
pub const ATTACHMENTS_DIR: &str = "a";

/// Reserved marker file, never a card
pub const SCHEMA_MARKER: &str = ".schema";

/// Parent marker for cards at the top of a card root
pub const ROOT_PARENT: &str = "root";

/// Fields derived from the directory tree. Never stored in metadata.
pub const STRUCTURAL_FIELDS: [&str; 6] =
    ["key", "path", "children", "parent", "attachments", "content"];

static UNRANKED: Rank = Rank::EMPTY;

/// A link from one card to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub card_key: String,
    pub link_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_description: Option<String>,
}

/// Contents of a card's `index.json`.
///
/// Custom fields declared by the card type are flattened into `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub card_type: String,
    #[serde(default)]
    pub workflow_state: String,
    #[serde(default)]
    pub rank: Rank,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_card_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CardMetadata {
    /// Create metadata for a card of the given type and state
    pub fn new(card_type: impl Into<String>, workflow_state: impl Into<String>) -> Self {
        Self {
            card_type: card_type.into(),
            workflow_state: workflow_state.into(),
            ..Default::default()
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the rank
    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    /// Set a custom field
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Stamp `lastUpdated` with the current time
    pub fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }

    /// Structural field names that have leaked into the custom fields
    pub fn structural_fields(&self) -> Vec<&str> {
        STRUCTURAL_FIELDS
            .iter()
            .copied()
            .filter(|field| self.fields.contains_key(*field))
            .collect()
    }

    /// Set any field by its JSON name, typed or custom.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let mut object = match serde_json::to_value(&*self)? {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        object.insert(name.to_string(), value);
        *self = serde_json::from_value(Value::Object(object))?;
        Ok(())
    }

    /// Get any field by its JSON name
    pub fn get(&self, name: &str) -> Option<Value> {
        match serde_json::to_value(self).ok()? {
            Value::Object(mut object) => object.remove(name),
            _ => None,
        }
    }
}

/// A file in a card's `a/` directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAttachment {
    /// Key of the owning card
    pub card: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub path: PathBuf,
}

impl CardAttachment {
    pub(crate) fn from_path(card: &str, path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let mime_type = mime_guess::from_path(&path)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Some(Self {
            card: card.to_string(),
            file_name,
            mime_type,
            path,
        })
    }
}

/// Which facets of a card to read from disk.
///
/// Everything defaults to `false`; unrequested facets are never read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub content: bool,
    pub metadata: bool,
    pub children: bool,
    pub attachments: bool,
    pub parent: bool,
    pub html: bool,
}

impl CardDetails {
    /// Only the key and path
    pub fn none() -> Self {
        Self::default()
    }

    /// Every facet, children included
    pub fn all() -> Self {
        Self {
            content: true,
            metadata: true,
            children: true,
            attachments: true,
            parent: true,
            html: false,
        }
    }

    pub fn with_content(mut self) -> Self {
        self.content = true;
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.metadata = true;
        self
    }

    pub fn with_children(mut self) -> Self {
        self.children = true;
        self
    }

    pub fn with_attachments(mut self) -> Self {
        self.attachments = true;
        self
    }

    pub fn with_parent(mut self) -> Self {
        self.parent = true;
        self
    }

    pub fn with_html(mut self) -> Self {
        self.html = true;
        self
    }
}

/// A node in the card tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub key: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CardMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Card>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<CardAttachment>>,
    /// Parent card key, or [`ROOT_PARENT`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl Card {
    /// Create a card with no facets loaded
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            content: None,
            metadata: None,
            children: None,
            attachments: None,
            parent: None,
            html: None,
        }
    }

    /// Set the content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the metadata
    pub fn with_metadata(mut self, metadata: CardMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// True when the card sits directly in a card root
    pub fn is_top_level(&self) -> bool {
        parent_key(&self.path) == ROOT_PARENT
    }

    /// Directory holding this card's children
    pub fn children_dir(&self) -> PathBuf {
        self.path.join(CHILDREN_DIR)
    }

    /// Directory holding this card's attachments
    pub fn attachments_dir(&self) -> PathBuf {
        self.path.join(ATTACHMENTS_DIR)
    }
}

impl Ranked for Card {
    fn rank(&self) -> &Rank {
        self.metadata
            .as_ref()
            .map(|metadata| &metadata.rank)
            .unwrap_or(&UNRANKED)
    }
}

/// Folder that template resources live in. A template's `c/` is a card root,
/// even when the template identifier happens to look like a card key.
const TEMPLATES_DIR: &str = "templates";

/// Parent key derived from a card path: `<parent>/c/<key>` yields `<parent>`,
/// anything else is [`ROOT_PARENT`].
pub(crate) fn parent_key(card_path: &Path) -> String {
    card_path
        .parent()
        .filter(|dir| dir_name(dir) == Some(CHILDREN_DIR))
        .and_then(Path::parent)
        .filter(|owner| owner.parent().and_then(dir_name) != Some(TEMPLATES_DIR))
        .and_then(dir_name)
        .filter(|name| is_card_key(name))
        .unwrap_or(ROOT_PARENT)
        .to_string()
}

fn dir_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}
