//! CardStore - directory ⇄ card tree translation
//!
//! The store is not bound to a single root. Every read takes the root to
//! search, so the same store serves the project card root and every
//! template's private card tree.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use crate::card::{
    parent_key, Card, CardAttachment, CardDetails, CardMetadata, ATTACHMENTS_DIR, CHILDREN_DIR,
    CONTENT_FILE, METADATA_FILE,
};
use crate::error::{Result, StoreError};
use crate::scan::{is_card_key, list_directories, list_files};

/// Renders card content for the `html` facet. Export formats are produced
/// outside the store; this is only the seam.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, card_key: &str, content: &str) -> String;
}

/// Reads and writes cards laid out as directories.
#[derive(Clone, Default)]
pub struct CardStore {
    renderer: Option<Arc<dyn ContentRenderer>>,
}

impl std::fmt::Debug for CardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardStore")
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

impl CardStore {
    /// Create a store without a content renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `renderer` to fill the `html` facet
    pub fn with_renderer(mut self, renderer: Arc<dyn ContentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Find the card named `key` anywhere below `root`.
    ///
    /// Returns `Ok(None)` when no such card exists. Card keys are unique, so
    /// the search stops at the first match.
    pub async fn find(
        &self,
        root: &Path,
        key: &str,
        details: &CardDetails,
    ) -> Result<Option<Card>> {
        self.find_in(root.to_path_buf(), key, details).await
    }

    fn find_in<'a>(
        &'a self,
        dir: PathBuf,
        key: &'a str,
        details: &'a CardDetails,
    ) -> BoxFuture<'a, Result<Option<Card>>> {
        async move {
            let entries = list_directories(&dir).await?;

            if let Some((_, path)) = entries.iter().find(|(name, _)| name == key) {
                return self.read_card(path, details).await.map(Some);
            }

            for (name, path) in entries {
                if name == ATTACHMENTS_DIR {
                    continue;
                }
                if let Some(card) = self.find_in(path, key, details).await? {
                    return Ok(Some(card));
                }
            }

            Ok(None)
        }
        .boxed()
    }

    /// Collect every card below `root`.
    ///
    /// With `direct_children_only`, recursion stops at the first level where
    /// card directories are found. Pass a card's own directory to get its
    /// immediate children.
    pub async fn collect(
        &self,
        root: &Path,
        details: &CardDetails,
        direct_children_only: bool,
    ) -> Result<Vec<Card>> {
        let cards = self
            .collect_in(root.to_path_buf(), details, direct_children_only)
            .await?;
        debug!(root = %root.display(), count = cards.len(), "collected cards");
        Ok(cards)
    }

    fn collect_in<'a>(
        &'a self,
        dir: PathBuf,
        details: &'a CardDetails,
        direct_children_only: bool,
    ) -> BoxFuture<'a, Result<Vec<Card>>> {
        async move {
            let (cards, others): (Vec<_>, Vec<_>) = list_directories(&dir)
                .await?
                .into_iter()
                .partition(|(name, _)| is_card_key(name));

            if !cards.is_empty() {
                let mut found =
                    try_join_all(cards.iter().map(|(_, path)| self.read_card(path, details)))
                        .await?;

                if !direct_children_only {
                    let nested = try_join_all(cards.iter().map(|(_, path)| {
                        self.collect_in(path.join(CHILDREN_DIR), details, false)
                    }))
                    .await?;
                    found.extend(nested.into_iter().flatten());
                }
                return Ok(found);
            }

            let nested = try_join_all(
                others
                    .into_iter()
                    .filter(|(name, _)| name != ATTACHMENTS_DIR)
                    .map(|(_, path)| self.collect_in(path, details, direct_children_only)),
            )
            .await?;
            Ok(nested.into_iter().flatten().collect())
        }
        .boxed()
    }

    /// Every attachment of every card below `root`. Attachment folders are
    /// leaves and are never searched for cards.
    pub async fn collect_attachments(&self, root: &Path) -> Result<Vec<CardAttachment>> {
        let details = CardDetails::none().with_attachments();
        let cards = self.collect_in(root.to_path_buf(), &details, false).await?;
        Ok(cards
            .into_iter()
            .flat_map(|card| card.attachments.unwrap_or_default())
            .collect())
    }

    /// Read the card stored at `path` with the requested facets.
    ///
    /// Facets are fetched concurrently. A requested facet whose file is
    /// missing is an error; missing `a/` or `c/` directories mean "none".
    pub async fn read_card(&self, path: &Path, details: &CardDetails) -> Result<Card> {
        let key = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        let (content, metadata, children, attachments) = tokio::try_join!(
            async {
                if details.content || details.html {
                    read_content(path).await.map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if details.metadata {
                    read_metadata(path).await.map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if details.children {
                    self.collect_in(path.join(CHILDREN_DIR), details, true)
                        .await
                        .map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if details.attachments {
                    read_attachments(path, &key).await.map(Some)
                } else {
                    Ok(None)
                }
            },
        )?;

        let html = match (&self.renderer, &content) {
            (Some(renderer), Some(content)) if details.html => {
                Some(renderer.render(&key, content))
            }
            _ => None,
        };

        let mut card = Card::new(key, path);
        card.content = if details.content { content } else { None };
        card.metadata = metadata;
        card.children = children;
        card.attachments = attachments;
        card.html = html;
        if details.parent {
            card.parent = Some(parent_key(path));
        }
        Ok(card)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist a card. Exactly one of `content` or `metadata` must be set.
    pub async fn save(&self, card: &Card) -> Result<()> {
        match (&card.content, &card.metadata) {
            (Some(content), None) => self.save_content(&card.path, content).await,
            (None, Some(metadata)) => self.save_metadata(&card.path, metadata).await,
            (None, None) => Err(StoreError::invalid_save(
                &card.key,
                "neither content nor metadata is set",
            )),
            (Some(_), Some(_)) => Err(StoreError::invalid_save(
                &card.key,
                "both content and metadata are set; save them separately",
            )),
        }
    }

    /// Write `index.json` for the card at `card_path`
    pub async fn save_metadata(&self, card_path: &Path, metadata: &CardMetadata) -> Result<()> {
        if let Some(field) = metadata.structural_fields().first() {
            return Err(StoreError::StructuralField {
                field: field.to_string(),
            });
        }
        let json = serde_json::to_string_pretty(metadata)?;
        atomic_write(&card_path.join(METADATA_FILE), json.as_bytes()).await
    }

    /// Write `index.adoc` for the card at `card_path`
    pub async fn save_content(&self, card_path: &Path, content: &str) -> Result<()> {
        atomic_write(&card_path.join(CONTENT_FILE), content.as_bytes()).await
    }

    /// Delete a card directory with everything below it
    pub async fn remove(&self, card_path: &Path) -> Result<()> {
        fs::remove_dir_all(card_path)
            .await
            .map_err(|e| StoreError::write(card_path, e))?;
        debug!(path = %card_path.display(), "removed card directory");
        Ok(())
    }
}

async fn read_content(card_path: &Path) -> Result<String> {
    let path = card_path.join(CONTENT_FILE);
    fs::read_to_string(&path)
        .await
        .map_err(|e| StoreError::read(&path, e))
}

async fn read_metadata(card_path: &Path) -> Result<CardMetadata> {
    let path = card_path.join(METADATA_FILE);
    let json = fs::read_to_string(&path)
        .await
        .map_err(|e| StoreError::read(&path, e))?;
    serde_json::from_str(&json).map_err(|source| StoreError::Metadata { path, source })
}

async fn read_attachments(card_path: &Path, key: &str) -> Result<Vec<CardAttachment>> {
    Ok(list_files(&card_path.join(ATTACHMENTS_DIR), None)
        .await?
        .into_iter()
        .filter_map(|path| CardAttachment::from_path(key, path))
        .collect())
}

/// Atomic write via temp file and rename
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::write(parent, e))?;
    }

    // Write to temp file in same directory. The suffix is appended so that
    // index.json and index.adoc never share a temp file.
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, content)
        .await
        .map_err(|e| StoreError::write(&temp_path, e))?;

    // Rename (atomic on same filesystem)
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| StoreError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{ROOT_PARENT, SCHEMA_MARKER};
    use cardsmith_rank::Rank;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_card(dir: &Path, key: &str, title: &str) -> PathBuf {
        let path = dir.join(key);
        std::fs::create_dir_all(&path).unwrap();
        let metadata = json!({
            "title": title,
            "cardType": "proj/cardTypes/simple",
            "workflowState": "Draft",
            "rank": "0|a",
        });
        std::fs::write(path.join(METADATA_FILE), metadata.to_string()).unwrap();
        std::fs::write(path.join(CONTENT_FILE), format!("= {title}")).unwrap();
        path
    }

    /// cardRoot/proj_aaa (+ child proj_bbb with grandchild proj_ccc, attachment), proj_ddd
    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("cardRoot");
        let aaa = write_card(&root, "proj_aaa", "A");
        let bbb = write_card(&aaa.join(CHILDREN_DIR), "proj_bbb", "B");
        write_card(&bbb.join(CHILDREN_DIR), "proj_ccc", "C");
        write_card(&root, "proj_ddd", "D");
        std::fs::create_dir_all(bbb.join(ATTACHMENTS_DIR)).unwrap();
        std::fs::write(bbb.join(ATTACHMENTS_DIR).join("photo.png"), b"png").unwrap();
        std::fs::write(root.join(SCHEMA_MARKER), "{}").unwrap();
        (temp, root)
    }

    #[tokio::test]
    async fn test_find_nested_card() {
        let (_temp, root) = setup();
        let store = CardStore::new();

        let card = store
            .find(&root, "proj_ccc", &CardDetails::none().with_metadata().with_parent())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(card.key, "proj_ccc");
        assert_eq!(card.metadata.unwrap().title, "C");
        assert_eq!(card.parent.as_deref(), Some("proj_bbb"));
        assert!(card.content.is_none(), "content was not requested");
        assert!(card.children.is_none());
    }

    #[tokio::test]
    async fn test_find_missing_card_is_none() {
        let (_temp, root) = setup();
        let store = CardStore::new();
        let card = store
            .find(&root, "proj_zzz", &CardDetails::all())
            .await
            .unwrap();
        assert!(card.is_none());
    }

    #[tokio::test]
    async fn test_find_missing_requested_file_is_error() {
        let (_temp, root) = setup();
        std::fs::remove_file(root.join("proj_ddd").join(CONTENT_FILE)).unwrap();
        let store = CardStore::new();

        // Not requested: fine
        assert!(store
            .find(&root, "proj_ddd", &CardDetails::none().with_metadata())
            .await
            .unwrap()
            .is_some());

        // Requested: hard error
        let err = store
            .find(&root, "proj_ddd", &CardDetails::none().with_content())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingFile { .. }));
    }

    #[tokio::test]
    async fn test_collect_all_cards() {
        let (_temp, root) = setup();
        let store = CardStore::new();

        let mut keys: Vec<String> = store
            .collect(&root, &CardDetails::none(), false)
            .await
            .unwrap()
            .into_iter()
            .map(|card| card.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["proj_aaa", "proj_bbb", "proj_ccc", "proj_ddd"]);
    }

    #[tokio::test]
    async fn test_collect_direct_children_only() {
        let (_temp, root) = setup();
        let store = CardStore::new();

        let mut top: Vec<String> = store
            .collect(&root, &CardDetails::none(), true)
            .await
            .unwrap()
            .into_iter()
            .map(|card| card.key)
            .collect();
        top.sort();
        assert_eq!(top, vec!["proj_aaa", "proj_ddd"]);

        let children = store
            .collect(&root.join("proj_aaa"), &CardDetails::none().with_parent(), true)
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].key, "proj_bbb");
        assert_eq!(children[0].parent.as_deref(), Some("proj_aaa"));
    }

    #[tokio::test]
    async fn test_children_facet_builds_tree() {
        let (_temp, root) = setup();
        let store = CardStore::new();

        let card = store
            .find(&root, "proj_aaa", &CardDetails::none().with_children())
            .await
            .unwrap()
            .unwrap();
        let children = card.children.unwrap();
        assert_eq!(children.len(), 1);
        let grandchildren = children[0].children.as_ref().unwrap();
        assert_eq!(grandchildren[0].key, "proj_ccc");
        assert!(grandchildren[0].children.as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collect_attachments() {
        let (_temp, root) = setup();
        let store = CardStore::new();

        let attachments = store.collect_attachments(&root).await.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].card, "proj_bbb");
        assert_eq!(attachments[0].file_name, "photo.png");
        assert_eq!(attachments[0].mime_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_attachment_folders_are_not_cards() {
        let (_temp, root) = setup();
        // A key-shaped file name inside a/ must not turn into a card
        let a_dir = root.join("proj_aaa").join(ATTACHMENTS_DIR).join("proj_eee");
        std::fs::create_dir_all(&a_dir).unwrap();
        let store = CardStore::new();

        assert!(store
            .find(&root, "proj_eee", &CardDetails::none())
            .await
            .unwrap()
            .is_none());
        let all = store.collect(&root, &CardDetails::none(), false).await.unwrap();
        assert!(all.iter().all(|card| card.key != "proj_eee"));
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("cardRoot");
        let store = CardStore::new();

        let mut metadata = CardMetadata::new("proj/cardTypes/simple", "Draft")
            .with_title("Round trip")
            .with_rank(Rank::first())
            .with_field("proj/fieldTypes/owner", json!("alice"));
        metadata.touch();

        let card = Card::new("proj_abc", root.join("proj_abc")).with_metadata(metadata.clone());
        store.save(&card).await.unwrap();

        let loaded = store
            .find(&root, "proj_abc", &CardDetails::none().with_metadata())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.metadata.as_ref(), Some(&metadata));

        let raw: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(root.join("proj_abc").join(METADATA_FILE)).unwrap(),
        )
        .unwrap();
        for field in crate::card::STRUCTURAL_FIELDS {
            assert!(raw.get(field).is_none(), "{field} leaked into metadata");
        }
    }

    #[tokio::test]
    async fn test_save_requires_exactly_one_facet() {
        let temp = TempDir::new().unwrap();
        let store = CardStore::new();
        let path = temp.path().join("proj_abc");

        let err = store.save(&Card::new("proj_abc", &path)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidSave { .. }));

        let both = Card::new("proj_abc", &path)
            .with_content("x")
            .with_metadata(CardMetadata::default());
        assert!(matches!(
            store.save(&both).await.unwrap_err(),
            StoreError::InvalidSave { .. }
        ));

        store
            .save(&Card::new("proj_abc", &path).with_content("hello"))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(path.join(CONTENT_FILE)).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_save_rejects_structural_fields() {
        let temp = TempDir::new().unwrap();
        let store = CardStore::new();
        let metadata = CardMetadata::default().with_field("parent", json!("proj_x"));
        let err = store
            .save_metadata(&temp.path().join("proj_abc"), &metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StructuralField { field } if field == "parent"));
    }

    #[tokio::test]
    async fn test_html_facet_uses_renderer() {
        struct Upper;
        impl ContentRenderer for Upper {
            fn render(&self, _card_key: &str, content: &str) -> String {
                format!("<p>{}</p>", content.to_uppercase())
            }
        }

        let (_temp, root) = setup();
        let store = CardStore::new().with_renderer(Arc::new(Upper));
        let card = store
            .find(&root, "proj_ddd", &CardDetails::none().with_html())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.html.as_deref(), Some("<p>= D</p>"));
        assert!(card.content.is_none());
    }

    #[tokio::test]
    async fn test_remove_card() {
        let (_temp, root) = setup();
        let store = CardStore::new();
        store.remove(&root.join("proj_aaa")).await.unwrap();

        let all = store.collect(&root, &CardDetails::none(), false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "proj_ddd");
        assert_eq!(
            store
                .find(&root, "proj_ddd", &CardDetails::none().with_parent())
                .await
                .unwrap()
                .unwrap()
                .parent
                .as_deref(),
            Some(ROOT_PARENT)
        );
    }
}
