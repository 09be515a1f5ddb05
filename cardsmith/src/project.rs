//! Project - the entry point to a card project on disk
//!
//! A project owns the on-disk layout, its configuration, the resource
//! resolver and the card store. Every operation goes through it.

use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use cardsmith_rank::{sort_by_rank, Rank, Ranked};
use cardsmith_resources::paths::template_card_root;
use cardsmith_resources::{
    validate_identifier, ModuleSetting, ProjectConfig, ProjectPaths, ResourceContent,
    ResourceError, ResourceKind, ResourceName, ResourceResolver, Scope,
};
use cardsmith_store::{
    atomic_write, Card, CardDetails, CardMetadata, CardStore, ContentRenderer, StoreError,
    ROOT_PARENT, STRUCTURAL_FIELDS,
};

use crate::error::{CardsmithError, Result};
use crate::template::Template;
use crate::validator::{CardValidator, StructuralValidator};

/// Files every new report folder starts with
const REPORT_FILES: [&str; 2] = ["index.adoc.hbs", "query.lp.hbs"];

/// A card project rooted at a directory
pub struct Project {
    paths: ProjectPaths,
    config: ProjectConfig,
    resolver: ResourceResolver,
    store: CardStore,
    validator: Arc<dyn CardValidator>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.paths.root())
            .field("prefix", &self.config.card_key_prefix)
            .finish()
    }
}

impl Project {
    /// Open the project at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let paths = ProjectPaths::new(root);
        let config = ProjectConfig::load(&paths.config_file()).await?;
        let resolver =
            ResourceResolver::new(paths.clone(), config.card_key_prefix.clone()).await?;
        debug!(root = %paths.root().display(), prefix = %config.card_key_prefix, "project opened");
        Ok(Self {
            paths,
            config,
            resolver,
            store: CardStore::new(),
            validator: Arc::new(StructuralValidator),
        })
    }

    /// Initialize a new project at `root` and open it
    pub async fn create(root: impl Into<PathBuf>, prefix: &str, name: &str) -> Result<Self> {
        let paths = ProjectPaths::new(root);
        let config_file = paths.config_file();
        if path_exists(&config_file).await? {
            return Err(CardsmithError::AlreadyExists {
                path: paths.root().to_path_buf(),
            });
        }
        let config = ProjectConfig::new(prefix, name)?;

        let dirs: Vec<PathBuf> = ResourceKind::ALL
            .into_iter()
            .map(|kind| paths.resource_dir(kind))
            .chain([paths.modules_dir(), paths.card_root()])
            .collect();
        try_join_all(dirs.iter().map(|dir| async move {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::write(dir, e))
        }))
        .await?;
        config.save(&config_file).await?;

        info!(root = %paths.root().display(), prefix = %prefix, "project created");
        Self::open(paths.root()).await
    }

    /// Use `validator` for card updates
    pub fn with_validator(mut self, validator: Arc<dyn CardValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Use `renderer` to fill the `html` facet of cards
    pub fn with_renderer(mut self, renderer: Arc<dyn ContentRenderer>) -> Self {
        self.store = self.store.with_renderer(renderer);
        self
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Card key prefix of this project
    pub fn prefix(&self) -> &str {
        &self.config.card_key_prefix
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    // =========================================================================
    // Card reads
    // =========================================================================

    /// Find a card by key, live cards first, then template cards
    pub async fn card(&self, key: &str, details: &CardDetails) -> Result<Option<Card>> {
        if let Some(card) = self.live_card(key, details).await? {
            return Ok(Some(card));
        }
        for root in self.template_roots().await {
            if let Some(card) = self.store.find(&root, key, details).await? {
                return Ok(Some(card));
            }
        }
        Ok(None)
    }

    /// Find a card under the card root only
    pub async fn live_card(&self, key: &str, details: &CardDetails) -> Result<Option<Card>> {
        Ok(self
            .store
            .find(&self.paths.card_root(), key, details)
            .await?)
    }

    /// Every live card
    pub async fn cards(&self, details: &CardDetails) -> Result<Vec<Card>> {
        Ok(self
            .store
            .collect(&self.paths.card_root(), details, false)
            .await?)
    }

    /// Every card of every local and imported template
    pub async fn template_cards(&self, details: &CardDetails) -> Result<Vec<Card>> {
        let roots = self.template_roots().await;
        let nested =
            try_join_all(roots.iter().map(|root| self.store.collect(root, details, false)))
                .await?;
        Ok(nested.into_iter().flatten().collect())
    }

    /// Every key in use: live cards and template cards
    pub async fn card_keys(&self) -> Result<HashSet<String>> {
        let details = CardDetails::none();
        let (live, templates) =
            tokio::try_join!(self.cards(&details), self.template_cards(&details))?;
        Ok(live.into_iter().chain(templates).map(|card| card.key).collect())
    }

    async fn template_roots(&self) -> Vec<PathBuf> {
        self.resolver
            .resources(ResourceKind::Templates, Scope::All)
            .await
            .into_iter()
            .map(|resource| template_card_root(&resource.path))
            .collect()
    }

    async fn require_card(&self, key: &str, details: &CardDetails) -> Result<Card> {
        self.card(key, details)
            .await?
            .ok_or_else(|| CardsmithError::card_not_found(key))
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// View of a local or imported template
    pub async fn template(&self, name: &str) -> Result<Template<'_>> {
        let resource = self
            .resolver
            .find(ResourceKind::Templates, name, Scope::All)
            .await
            .ok_or_else(|| CardsmithError::TemplateNotFound {
                name: name.to_string(),
            })?;
        Ok(Template::new(self, resource))
    }

    /// Instantiate `template_name` under `parent_key`, or at the top of the
    /// card root when no parent is given.
    pub async fn create_card(
        &self,
        template_name: &str,
        parent_key: Option<&str>,
    ) -> Result<Vec<Card>> {
        self.template(template_name)
            .await?
            .create_cards(parent_key)
            .await
    }

    // =========================================================================
    // Card updates
    // =========================================================================

    /// Set one metadata field
    pub async fn update_card_metadata_key(
        &self,
        key: &str,
        field: &str,
        value: Value,
        skip_validation: bool,
    ) -> Result<Card> {
        if STRUCTURAL_FIELDS.contains(&field) {
            return Err(StoreError::StructuralField {
                field: field.to_string(),
            }
            .into());
        }
        let mut card = self
            .require_card(key, &CardDetails::none().with_metadata())
            .await?;
        let mut metadata = card.metadata.take().unwrap_or_default();
        metadata.set(field, value)?;
        card.metadata = Some(metadata);
        self.commit(card, skip_validation).await
    }

    /// Replace the whole metadata of a card
    pub async fn update_card_metadata(
        &self,
        key: &str,
        metadata: CardMetadata,
        skip_validation: bool,
    ) -> Result<Card> {
        if let Some(field) = metadata.structural_fields().first() {
            return Err(StoreError::StructuralField {
                field: field.to_string(),
            }
            .into());
        }
        let mut card = self.require_card(key, &CardDetails::none()).await?;
        card.metadata = Some(metadata);
        self.commit(card, skip_validation).await
    }

    /// Replace the content of a card
    pub async fn update_card_content(
        &self,
        key: &str,
        content: &str,
        skip_validation: bool,
    ) -> Result<Card> {
        let mut card = self
            .require_card(key, &CardDetails::none().with_metadata())
            .await?;
        card.content = Some(content.to_string());
        self.commit(card, skip_validation).await
    }

    /// Stamp, validate and persist whichever facets `card` carries
    async fn commit(&self, mut card: Card, skip_validation: bool) -> Result<Card> {
        if let Some(metadata) = card.metadata.as_mut() {
            metadata.touch();
        }

        if !skip_validation {
            let message = self.validator.validate_card(self, &card).await?;
            if !message.is_empty() {
                return Err(CardsmithError::validation(&card.key, message));
            }
        }

        tokio::try_join!(
            async {
                match &card.metadata {
                    Some(metadata) => self.store.save_metadata(&card.path, metadata).await,
                    None => Ok(()),
                }
            },
            async {
                match &card.content {
                    Some(content) => self.store.save_content(&card.path, content).await,
                    None => Ok(()),
                }
            },
        )?;
        debug!(key = %card.key, "card updated");
        Ok(card)
    }

    /// Move a card among its siblings: first when `after_key` is `None`,
    /// otherwise directly after that sibling. Returns the card's new rank.
    ///
    /// Only the moved card is rewritten, unless there is no room between its
    /// new neighbours; then the whole sibling list is re-ranked.
    pub async fn rank_card(&self, key: &str, after_key: Option<&str>) -> Result<Rank> {
        let details = CardDetails::none().with_metadata();
        let card = self.require_card(key, &details).await?;
        let siblings_dir = card
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.paths.card_root());

        let mut siblings: Vec<Card> = self
            .store
            .collect(&siblings_dir, &details, true)
            .await?
            .into_iter()
            .filter(|sibling| sibling.key != card.key)
            .collect();
        sort_by_rank(&mut siblings);

        let position = match after_key {
            None => 0,
            Some(after) => {
                siblings
                    .iter()
                    .position(|sibling| sibling.key == after)
                    .ok_or_else(|| CardsmithError::NotSibling {
                        key: key.to_string(),
                        after: after.to_string(),
                    })?
                    + 1
            }
        };

        let before = match position.checked_sub(1).and_then(|i| siblings.get(i)) {
            Some(sibling) => sibling.rank().clone(),
            None => Rank::EMPTY,
        };
        let rank = match siblings.get(position) {
            Some(next) => Rank::between(&before, next.rank()),
            None => Some(Rank::after(&before)),
        };

        match rank {
            Some(rank) => {
                let mut card = card;
                if let Some(metadata) = card.metadata.as_mut() {
                    metadata.rank = rank.clone();
                }
                self.commit(card, true).await?;
                Ok(rank)
            }
            None => {
                siblings.insert(position, card);
                self.rerank(siblings, key).await
            }
        }
    }

    /// Give `ordered` fresh evenly spaced ranks in their current order
    async fn rerank(&self, ordered: Vec<Card>, key: &str) -> Result<Rank> {
        debug!(count = ordered.len(), "re-ranking siblings");
        let mut rank = Rank::EMPTY;
        let mut moved = Rank::EMPTY;
        let mut updated = Vec::with_capacity(ordered.len());
        for mut sibling in ordered {
            rank = Rank::after(&rank);
            if sibling.key == key {
                moved = rank.clone();
            }
            if let Some(metadata) = sibling.metadata.as_mut() {
                metadata.rank = rank.clone();
            }
            updated.push(sibling);
        }
        try_join_all(updated.into_iter().map(|sibling| self.commit(sibling, true))).await?;
        Ok(moved)
    }

    /// Delete a card and everything below it
    pub async fn remove_card(&self, key: &str) -> Result<()> {
        let card = self.require_card(key, &CardDetails::none()).await?;
        self.store.remove(&card.path).await?;
        info!(key = %key, "card removed");
        Ok(())
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Create a local resource from a JSON object. The `name` field is always
    /// set from the project prefix, kind and identifier.
    pub async fn create_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
        content: Value,
    ) -> Result<ResourceName> {
        validate_identifier(identifier)?;
        let name = ResourceName::new(self.prefix(), kind, identifier);
        let path = self.paths.resource_path(kind, identifier);

        if self.resolver.exists(kind, &name.to_string()).await
            || path_exists(&path).await?
        {
            return Err(CardsmithError::ResourceExists {
                name: name.to_string(),
            });
        }

        let mut object: Map<String, Value> = serde_json::from_value(content)?;
        object.insert("name".into(), Value::String(name.to_string()));
        let json = Value::Object(object);
        ResourceContent::parse(kind, json.clone()).map_err(|source| ResourceError::Parse {
            path: path.clone(),
            source,
        })?;
        let text = serde_json::to_string_pretty(&json)?;

        match kind.metadata_file() {
            None => atomic_write(&path, text.as_bytes()).await?,
            Some(file) => {
                atomic_write(&path.join(file), text.as_bytes()).await?;
                match kind {
                    ResourceKind::Templates => {
                        let cards = template_card_root(&path);
                        fs::create_dir_all(&cards)
                            .await
                            .map_err(|e| StoreError::write(&cards, e))?;
                    }
                    ResourceKind::Reports => {
                        for file in REPORT_FILES {
                            atomic_write(&path.join(file), b"").await?;
                        }
                    }
                    _ => {}
                }
            }
        }

        self.resolver.changed().await?;
        info!(name = %name, "resource created");
        Ok(name)
    }

    /// Delete a local resource
    pub async fn remove_resource(&self, kind: ResourceKind, name: &str) -> Result<()> {
        let resource = self
            .resolver
            .find(kind, name, Scope::Local)
            .await
            .ok_or_else(|| CardsmithError::ResourceNotFound {
                name: name.to_string(),
            })?;

        let removed = if kind.is_folder() {
            fs::remove_dir_all(&resource.path).await
        } else {
            fs::remove_file(&resource.path).await
        };
        removed.map_err(|e| StoreError::write(&resource.path, e))?;

        self.resolver.changed().await?;
        info!(name = %resource.name, "resource removed");
        Ok(())
    }

    // =========================================================================
    // Modules
    // =========================================================================

    /// Import the project at `source_root` as a module. Its local resources
    /// are copied under `.cards/modules/<prefix>`. Returns the module prefix.
    pub async fn import_module(&mut self, source_root: &Path) -> Result<String> {
        let source = ProjectPaths::new(source_root);
        let source_config = ProjectConfig::load(&source.config_file())
            .await
            .map_err(|e| CardsmithError::invalid_module(source_root, e.to_string()))?;
        let prefix = source_config.card_key_prefix;

        if prefix == self.config.card_key_prefix {
            return Err(CardsmithError::invalid_module(
                source_root,
                format!("module prefix '{prefix}' is the project's own prefix"),
            ));
        }
        let destination = self.paths.module_dir(&prefix);
        if self.config.has_module(&prefix) || path_exists(&destination).await? {
            return Err(CardsmithError::ModuleExists { prefix });
        }

        let from = source.local_dir();
        let to = destination.clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&from, &to)).await?;
        let files = match copied {
            Ok(files) => files,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&destination).await {
                    warn!(
                        path = %destination.display(),
                        error = %cleanup,
                        "could not clean up partial module import"
                    );
                }
                return Err(e.into());
            }
        };

        self.config.modules.push(ModuleSetting {
            name: prefix.clone(),
            location: Some(source_root.display().to_string()),
        });
        self.config.save(&self.paths.config_file()).await?;
        self.resolver.module_imported().await?;

        info!(module = %prefix, files, "module imported");
        Ok(prefix)
    }

    /// Prefixes of imported modules
    pub async fn modules(&self) -> Vec<String> {
        self.resolver.modules().await
    }
}

/// Whether `path` exists. Errors other than "not found" are reported.
async fn path_exists(path: &Path) -> Result<bool> {
    Ok(fs::try_exists(path)
        .await
        .map_err(|e| StoreError::read(path, e))?)
}

/// Copy the directory tree `from` into `to`, returning the number of files
fn copy_tree(from: &Path, to: &Path) -> cardsmith_store::Result<usize> {
    let mut files = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf());
            StoreError::read(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| StoreError::write(&target, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| StoreError::write(&target, e))?;
            files += 1;
        }
    }
    Ok(files)
}

/// True when `key` names the top of a card root rather than a card
pub(crate) fn is_root_marker(key: &str) -> bool {
    key == ROOT_PARENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{init_project, TEST_PREFIX};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_lays_out_project() {
        let temp = TempDir::new().unwrap();
        let project = Project::create(temp.path(), "demo", "Demo").await.unwrap();

        assert_eq!(project.prefix(), "demo");
        assert!(project.paths().card_root().is_dir());
        assert!(project.paths().modules_dir().is_dir());
        for kind in ResourceKind::ALL {
            assert!(project.paths().resource_dir(kind).is_dir(), "{kind}");
        }

        let err = Project::create(temp.path(), "demo", "Demo").await.unwrap_err();
        assert!(matches!(err, CardsmithError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_prefix() {
        let temp = TempDir::new().unwrap();
        let err = Project::create(temp.path(), "No", "Demo").await.unwrap_err();
        assert!(matches!(
            err,
            CardsmithError::Resource(ResourceError::InvalidPrefix { .. })
        ));
        assert!(!temp.path().join(".cards").exists());
    }

    #[tokio::test]
    async fn test_create_reports_unreadable_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("not-a-dir");
        std::fs::write(&root, "file").unwrap();

        let err = Project::create(&root, "demo", "Demo").await.unwrap_err();
        assert!(
            matches!(err, CardsmithError::Store(StoreError::Read { .. })),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_open_missing_project() {
        let temp = TempDir::new().unwrap();
        let err = Project::open(temp.path()).await.unwrap_err();
        assert!(matches!(
            err,
            CardsmithError::Resource(ResourceError::ConfigNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_resource_rejects_bad_identifier_before_writing() {
        let temp = TempDir::new().unwrap();
        let project = init_project(temp.path()).await.unwrap();
        let before = project
            .resolver()
            .resources(ResourceKind::LinkTypes, Scope::Local)
            .await
            .len();

        let err = project
            .create_resource(ResourceKind::LinkTypes, "bad name", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CardsmithError::Resource(ResourceError::InvalidIdentifier { .. })
        ));
        assert!(!project
            .paths()
            .resource_dir(ResourceKind::LinkTypes)
            .join("bad name.json")
            .exists());
        assert_eq!(
            project
                .resolver()
                .resources(ResourceKind::LinkTypes, Scope::Local)
                .await
                .len(),
            before
        );
    }

    #[tokio::test]
    async fn test_create_report_scaffolds_folder() {
        let temp = TempDir::new().unwrap();
        let project = init_project(temp.path()).await.unwrap();
        let name = project
            .create_resource(
                ResourceKind::Reports,
                "summary",
                serde_json::json!({"displayName": "Summary"}),
            )
            .await
            .unwrap();
        assert_eq!(name.to_string(), format!("{TEST_PREFIX}/reports/summary"));

        let folder = project.paths().resource_path(ResourceKind::Reports, "summary");
        assert!(folder.join("report.json").is_file());
        for file in REPORT_FILES {
            assert!(folder.join(file).is_file(), "{file}");
        }
    }

    #[test]
    fn test_copy_tree() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("from");
        std::fs::create_dir_all(from.join("nested/deeper")).unwrap();
        std::fs::write(from.join("top.json"), "{}").unwrap();
        std::fs::write(from.join("nested/deeper/leaf.json"), "{}").unwrap();

        let to = temp.path().join("to");
        assert_eq!(copy_tree(&from, &to).unwrap(), 2);
        assert!(to.join("top.json").is_file());
        assert!(to.join("nested/deeper/leaf.json").is_file());
    }
}
