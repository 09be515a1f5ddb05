//! ResourceResolver - layered lookup over local and imported resources
//!
//! Resource listings are cached per layer. Directory scans run without the
//! lock held; the finished listing is swapped in under a short write lock, so
//! readers always see one complete snapshot.

use futures::future::try_join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use cardsmith_store::scan::{list_directories, list_files};
use cardsmith_store::StoreError;

use crate::config::ProjectConfig;
use crate::content::{CardType, FieldType, FolderMetadata, ResourceContent, Workflow};
use crate::error::{ResourceError, Result};
use crate::kind::{ResourceKind, Scope};
use crate::name::{validate_identifier, ResourceName};
use crate::paths::{kind_dir, ProjectPaths, CONFIG_FILE};

/// Which layer a resource came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    Local,
    Imported { module: String },
}

/// A resource located on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: ResourceName,
    /// JSON file for single-file kinds, folder for folder kinds
    pub path: PathBuf,
    pub source: ResourceSource,
}

impl Resource {
    /// File holding the resource's JSON document
    pub fn document_path(&self) -> PathBuf {
        match self.name.kind.metadata_file() {
            Some(file) => self.path.join(file),
            None => self.path.clone(),
        }
    }
}

type Listing = HashMap<ResourceKind, Vec<Resource>>;

#[derive(Debug, Default)]
struct ResourceCache {
    local: Listing,
    imported: Listing,
    /// Prefixes of imported modules
    modules: Vec<String>,
}

/// Resolves resources by kind and name across the project and its modules.
#[derive(Debug)]
pub struct ResourceResolver {
    paths: ProjectPaths,
    prefix: String,
    cache: RwLock<ResourceCache>,
}

impl ResourceResolver {
    /// Create a resolver for the project at `paths`, scanning both layers.
    pub async fn new(paths: ProjectPaths, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        let (local, (imported, modules)) = tokio::try_join!(
            scan_layer(paths.local_dir(), &prefix, ResourceSource::Local),
            scan_modules(paths.modules_dir()),
        )?;
        debug!(
            prefix = %prefix,
            local = count(&local),
            imported = count(&imported),
            modules = modules.len(),
            "resource cache built"
        );
        Ok(Self {
            paths,
            prefix,
            cache: RwLock::new(ResourceCache {
                local,
                imported,
                modules,
            }),
        })
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// The project's card key prefix, owner of every local resource
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Resources of `kind` in `scope`, local first
    pub async fn resources(&self, kind: ResourceKind, scope: Scope) -> Vec<Resource> {
        let cache = self.cache.read().await;
        let mut found = Vec::new();
        if scope.includes_local() {
            found.extend(cache.local.get(&kind).into_iter().flatten().cloned());
        }
        if scope.includes_imported() {
            found.extend(cache.imported.get(&kind).into_iter().flatten().cloned());
        }
        found
    }

    /// Find a resource by bare identifier or full name, with or without `.json`
    pub async fn find(&self, kind: ResourceKind, name: &str, scope: Scope) -> Option<Resource> {
        self.resources(kind, scope)
            .await
            .into_iter()
            .find(|resource| resource.name.matches(name))
    }

    pub async fn exists(&self, kind: ResourceKind, name: &str) -> bool {
        self.find(kind, name, Scope::All).await.is_some()
    }

    /// Prefixes of imported modules
    pub async fn modules(&self) -> Vec<String> {
        self.cache.read().await.modules.clone()
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Typed content of a resource, or `None` if no such resource exists.
    ///
    /// Card type fields are completed from their field types: a missing
    /// display name or description is copied over.
    pub async fn resource(
        &self,
        kind: ResourceKind,
        name: &str,
        scope: Scope,
    ) -> Result<Option<ResourceContent>> {
        let Some(mut content) = self.load_content(kind, name, scope).await? else {
            return Ok(None);
        };
        if let ResourceContent::CardType(card_type) = &mut content {
            self.complete_fields(card_type).await;
        }
        Ok(Some(content))
    }

    pub async fn card_type(&self, name: &str) -> Result<Option<CardType>> {
        Ok(match self.resource(ResourceKind::CardTypes, name, Scope::All).await? {
            Some(ResourceContent::CardType(card_type)) => Some(card_type),
            _ => None,
        })
    }

    pub async fn workflow(&self, name: &str) -> Result<Option<Workflow>> {
        Ok(match self.resource(ResourceKind::Workflows, name, Scope::All).await? {
            Some(ResourceContent::Workflow(workflow)) => Some(workflow),
            _ => None,
        })
    }

    pub async fn field_type(&self, name: &str) -> Result<Option<FieldType>> {
        Ok(match self.resource(ResourceKind::FieldTypes, name, Scope::All).await? {
            Some(ResourceContent::FieldType(field_type)) => Some(field_type),
            _ => None,
        })
    }

    pub async fn template(&self, name: &str) -> Result<Option<FolderMetadata>> {
        Ok(match self.resource(ResourceKind::Templates, name, Scope::All).await? {
            Some(ResourceContent::Template(template)) => Some(template),
            _ => None,
        })
    }

    async fn load_content(
        &self,
        kind: ResourceKind,
        name: &str,
        scope: Scope,
    ) -> Result<Option<ResourceContent>> {
        let Some(resource) = self.find(kind, name, scope).await else {
            return Ok(None);
        };
        read_content(&resource).await.map(Some)
    }

    async fn complete_fields(&self, card_type: &mut CardType) {
        for field in &mut card_type.custom_fields {
            if field.display_name.is_some() && field.description.is_some() {
                continue;
            }
            match self
                .load_content(ResourceKind::FieldTypes, &field.name, Scope::All)
                .await
            {
                Ok(Some(ResourceContent::FieldType(field_type))) => {
                    if field.display_name.is_none() {
                        field.display_name = field_type.display_name;
                    }
                    if field.description.is_none() {
                        field.description = field_type.description;
                    }
                }
                Ok(_) => warn!(
                    card_type = %card_type.name,
                    field = %field.name,
                    "field type not found; field left without display name"
                ),
                Err(e) => warn!(
                    card_type = %card_type.name,
                    field = %field.name,
                    error = %e,
                    "field type unreadable; field left without display name"
                ),
            }
        }
    }

    // =========================================================================
    // Cache invalidation
    // =========================================================================

    /// Rescan local resources
    pub async fn changed(&self) -> Result<()> {
        let local = scan_layer(self.paths.local_dir(), &self.prefix, ResourceSource::Local).await?;
        debug!(count = count(&local), "local resources rescanned");
        self.cache.write().await.local = local;
        Ok(())
    }

    /// Rescan local resources. Same as [`ResourceResolver::changed`].
    pub async fn collect_local_resources(&self) -> Result<()> {
        self.changed().await
    }

    /// Rescan imported modules
    pub async fn module_imported(&self) -> Result<()> {
        let (imported, modules) = scan_modules(self.paths.modules_dir()).await?;
        debug!(
            count = count(&imported),
            modules = modules.len(),
            "imported resources rescanned"
        );
        let mut cache = self.cache.write().await;
        cache.imported = imported;
        cache.modules = modules;
        Ok(())
    }

    /// Rescan the layers in `scope`
    pub async fn invalidate(&self, scope: Scope) -> Result<()> {
        if scope.includes_local() {
            self.changed().await?;
        }
        if scope.includes_imported() {
            self.module_imported().await?;
        }
        Ok(())
    }
}

fn count(listing: &Listing) -> usize {
    listing.values().map(Vec::len).sum()
}

/// Read a resource's JSON document and build its typed content. The stored
/// name always comes from the owner and location, never from the document.
async fn read_content(resource: &Resource) -> Result<ResourceContent> {
    let kind = resource.name.kind;
    let path = resource.document_path();

    let mut json = match fs::read_to_string(&path).await {
        Ok(text) => serde_json::from_str::<Value>(&text).map_err(|source| {
            ResourceError::Parse {
                path: path.clone(),
                source,
            }
        })?,
        // A folder resource without its metadata file still exists
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && kind.is_folder() => {
            Value::Object(Default::default())
        }
        Err(e) => return Err(StoreError::read(&path, e).into()),
    };

    if let Value::Object(object) = &mut json {
        object.insert("name".into(), Value::String(resource.name.to_string()));
    }
    ResourceContent::parse(kind, json).map_err(|source| ResourceError::Parse { path, source })
}

/// List every resource kind inside one layer directory
async fn scan_layer(layer: PathBuf, prefix: &str, source: ResourceSource) -> Result<Listing> {
    let kinds = try_join_all(
        ResourceKind::ALL
            .into_iter()
            .map(|kind| scan_kind(&layer, prefix, kind, &source)),
    )
    .await?;
    Ok(ResourceKind::ALL.into_iter().zip(kinds).collect())
}

async fn scan_kind(
    layer: &Path,
    prefix: &str,
    kind: ResourceKind,
    source: &ResourceSource,
) -> Result<Vec<Resource>> {
    let dir = kind_dir(layer, kind);
    let entries: Vec<(String, PathBuf)> = if kind.is_folder() {
        list_directories(&dir).await?
    } else {
        list_files(&dir, Some("json"))
            .await?
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                Some((stem, path))
            })
            .collect()
    };

    let mut resources: Vec<Resource> = entries
        .into_iter()
        .filter(|(identifier, path)| match validate_identifier(identifier) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping resource");
                false
            }
        })
        .map(|(identifier, path)| Resource {
            name: ResourceName::new(prefix, kind, identifier),
            path,
            source: source.clone(),
        })
        .collect();
    resources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(resources)
}

/// Scan every module under `modules_dir`. Each module's prefix comes from its
/// own configuration; a module without one falls back to its folder name.
async fn scan_modules(modules_dir: PathBuf) -> Result<(Listing, Vec<String>)> {
    let mut dirs = list_directories(&modules_dir).await?;
    dirs.sort();

    let mut prefixes = Vec::with_capacity(dirs.len());
    for (dir_name, path) in &dirs {
        let prefix = match ProjectConfig::load(&path.join(CONFIG_FILE)).await {
            Ok(config) => config.card_key_prefix,
            Err(e) => {
                warn!(
                    module = %dir_name,
                    error = %e,
                    "module configuration unreadable; using folder name"
                );
                dir_name.clone()
            }
        };
        prefixes.push(prefix);
    }

    let layers = try_join_all(dirs.iter().zip(&prefixes).map(|((_, path), prefix)| {
        scan_layer(
            path.clone(),
            prefix,
            ResourceSource::Imported {
                module: prefix.clone(),
            },
        )
    }))
    .await?;

    let mut imported = Listing::new();
    for layer in layers {
        for (kind, resources) in layer {
            imported.entry(kind).or_default().extend(resources);
        }
    }
    Ok((imported, prefixes))
}
