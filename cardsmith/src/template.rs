//! Template views and template instantiation
//!
//! A template owns a private card tree under `<template>/c`. Instantiating it
//! copies that tree into the live card root (or below a live card):
//!
//! 1. read the blueprint cards with content, metadata and attachments
//! 2. resolve every card type, its workflow and the workflow's initial state
//! 3. allocate one fresh key per card and rank the new top-level cards after
//!    the destination's current last sibling
//! 4. per card, concurrently: create the directory, copy attachments as
//!    `<key>-<fileName>`, rewrite attachment references in the content,
//!    compose metadata and persist it with the content
//!
//! Steps 1-3 write nothing. If any card fails in step 4, every destination
//! directory of the call is removed again. The rollback is best effort:
//! cleanup failures are logged and the original error is returned.

use futures::future::{join_all, try_join_all};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tracing::{debug, info, warn};

use cardsmith_rank::{last_rank, sort_by_rank, Rank, Ranked};
use cardsmith_resources::paths::template_card_root;
use cardsmith_resources::{CardType, Resource, ResourceName, ResourceResolver};
use cardsmith_store::{Card, CardDetails, CardMetadata, StoreError, ATTACHMENTS_DIR, ROOT_PARENT};

use crate::error::{CardsmithError, Result};
use crate::keys::allocate_keys;
use crate::project::{is_root_marker, Project};

/// A template of a project, borrowed from it
#[derive(Debug)]
pub struct Template<'a> {
    project: &'a Project,
    resource: Resource,
}

/// A card type ready for instantiation
#[derive(Debug)]
struct ResolvedType {
    card_type: CardType,
    initial_state: String,
}

/// Everything decided about one new card before anything is written
struct CardPlan<'r> {
    blueprint: Card,
    key: String,
    path: PathBuf,
    parent: String,
    rank: Rank,
    resolved: &'r ResolvedType,
}

impl<'a> Template<'a> {
    pub(crate) fn new(project: &'a Project, resource: Resource) -> Self {
        Self { project, resource }
    }

    pub fn name(&self) -> &ResourceName {
        &self.resource.name
    }

    /// Template folder
    pub fn path(&self) -> &Path {
        &self.resource.path
    }

    /// Root of the template's private card tree
    pub fn card_root(&self) -> PathBuf {
        template_card_root(&self.resource.path)
    }

    /// Every blueprint card of this template
    pub async fn cards(&self, details: &CardDetails) -> Result<Vec<Card>> {
        Ok(self
            .project
            .store()
            .collect(&self.card_root(), details, false)
            .await?)
    }

    pub async fn card_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .cards(&CardDetails::none())
            .await?
            .into_iter()
            .map(|card| card.key)
            .collect())
    }

    /// Instantiate the template below `parent_key`, or at the top of the card
    /// root. Returns the new cards in no particular order.
    pub async fn create_cards(&self, parent_key: Option<&str>) -> Result<Vec<Card>> {
        let details = CardDetails::none()
            .with_content()
            .with_metadata()
            .with_attachments()
            .with_parent();
        let mut blueprint = self.cards(&details).await?;
        if blueprint.is_empty() {
            return Err(CardsmithError::EmptyTemplate {
                name: self.name().to_string(),
            });
        }

        let parent_key = parent_key.filter(|key| !is_root_marker(key));
        let destination = self.destination(parent_key).await?;
        let types = self.resolve_types(&blueprint).await?;

        let existing = self.project.card_keys().await?;
        let fresh = allocate_keys(self.project.prefix(), &existing, blueprint.len())?;
        let key_map: HashMap<String, String> = blueprint
            .iter()
            .map(|card| card.key.clone())
            .zip(fresh)
            .collect();

        let siblings = self
            .project
            .store()
            .collect(&destination, &CardDetails::none().with_metadata(), true)
            .await?;
        let mut last = last_rank(&siblings).cloned().unwrap_or(Rank::EMPTY);

        sort_by_rank(&mut blueprint);
        let mut plans = Vec::with_capacity(blueprint.len());
        for card in blueprint {
            let top_level = card.parent.as_deref() == Some(ROOT_PARENT);
            let rank = if top_level {
                last = Rank::after(&last);
                last.clone()
            } else {
                card.rank().clone()
            };
            let parent = if top_level {
                parent_key.unwrap_or(ROOT_PARENT).to_string()
            } else {
                card.parent
                    .as_ref()
                    .and_then(|parent| key_map.get(parent))
                    .cloned()
                    .unwrap_or_else(|| ROOT_PARENT.to_string())
            };
            let card_type = card_type_name(&card);
            let resolved = types
                .get(&card_type)
                .ok_or(CardsmithError::CardTypeNotFound { name: card_type })?;
            let key = key_map
                .get(&card.key)
                .cloned()
                .ok_or_else(|| CardsmithError::card_not_found(&card.key))?;
            let path = self.rewrite_path(&card, &destination, &key_map)?;

            plans.push(CardPlan {
                blueprint: card,
                key,
                path,
                parent,
                rank,
                resolved,
            });
        }

        let outcomes = join_all(plans.iter().map(|plan| self.instantiate(plan))).await;
        match outcomes.into_iter().collect::<Result<Vec<Card>>>() {
            Ok(cards) => {
                info!(
                    template = %self.name(),
                    count = cards.len(),
                    destination = %destination.display(),
                    "template instantiated"
                );
                Ok(cards)
            }
            Err(e) => {
                warn!(
                    template = %self.name(),
                    error = %e,
                    "template instantiation failed; rolling back"
                );
                rollback(&plans).await;
                Err(e)
            }
        }
    }

    /// Add an empty blueprint card of `card_type` below `parent_key` (a card of
    /// this template), or at the top of the template.
    pub async fn add_card(&self, card_type: &str, parent_key: Option<&str>) -> Result<Card> {
        let store = self.project.store();
        let resolved = resolve_type(self.project.resolver(), card_type).await?;

        let destination = match parent_key.filter(|key| !is_root_marker(key)) {
            None => self.card_root(),
            Some(key) => store
                .find(&self.card_root(), key, &CardDetails::none())
                .await?
                .ok_or_else(|| CardsmithError::card_not_found(key))?
                .children_dir(),
        };

        let existing = self.project.card_keys().await?;
        let key = allocate_keys(self.project.prefix(), &existing, 1)?
            .into_iter()
            .next()
            .ok_or(CardsmithError::KeyAllocation {
                count: 1,
                attempts: 0,
            })?;

        let siblings = store
            .collect(&destination, &CardDetails::none().with_metadata(), true)
            .await?;
        let rank = Rank::after(last_rank(&siblings).unwrap_or(&Rank::EMPTY));

        let mut metadata = CardMetadata::new(&resolved.card_type.name, &resolved.initial_state)
            .with_title("Untitled")
            .with_rank(rank);
        add_declared_fields(&mut metadata, &resolved.card_type);
        metadata.touch();

        let path = destination.join(&key);
        fs::create_dir_all(&path)
            .await
            .map_err(|e| StoreError::write(&path, e))?;
        tokio::try_join!(
            store.save_metadata(&path, &metadata),
            store.save_content(&path, ""),
        )?;

        info!(template = %self.name(), key = %key, "template card added");
        Ok(Card::new(key, path).with_metadata(metadata).with_content(""))
    }

    async fn destination(&self, parent_key: Option<&str>) -> Result<PathBuf> {
        match parent_key {
            None => Ok(self.project.paths().card_root()),
            Some(key) => Ok(self
                .project
                .live_card(key, &CardDetails::none())
                .await?
                .ok_or_else(|| CardsmithError::card_not_found(key))?
                .children_dir()),
        }
    }

    async fn resolve_types(&self, blueprint: &[Card]) -> Result<HashMap<String, ResolvedType>> {
        let mut types = HashMap::new();
        for card in blueprint {
            let name = card_type_name(card);
            if types.contains_key(&name) {
                continue;
            }
            let resolved = resolve_type(self.project.resolver(), &name).await?;
            types.insert(name, resolved);
        }
        debug!(template = %self.name(), types = types.len(), "card types resolved");
        Ok(types)
    }

    /// `<template>/c/<k1>/c/<k2>` becomes `<destination>/<f1>/c/<f2>`
    fn rewrite_path(
        &self,
        card: &Card,
        destination: &Path,
        key_map: &HashMap<String, String>,
    ) -> Result<PathBuf> {
        let root = self.card_root();
        let relative = card.path.strip_prefix(&root).map_err(|_| {
            StoreError::invalid_save(&card.key, "card lies outside its template")
        })?;
        Ok(relative
            .components()
            .fold(destination.to_path_buf(), |path, component| {
                let segment = component.as_os_str();
                match segment.to_str().and_then(|name| key_map.get(name)) {
                    Some(fresh) => path.join(fresh),
                    None => path.join(segment),
                }
            }))
    }

    async fn instantiate(&self, plan: &CardPlan<'_>) -> Result<Card> {
        let store = self.project.store();
        fs::create_dir_all(&plan.path)
            .await
            .map_err(|e| StoreError::write(&plan.path, e))?;

        let mut content = plan.blueprint.content.clone().unwrap_or_default();
        let attachments = plan.blueprint.attachments.as_deref().unwrap_or_default();
        if !attachments.is_empty() {
            let dir = plan.path.join(ATTACHMENTS_DIR);
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::write(&dir, e))?;

            let renames: HashMap<String, String> = attachments
                .iter()
                .map(|a| (a.file_name.clone(), format!("{}-{}", plan.key, a.file_name)))
                .collect();
            try_join_all(attachments.iter().map(|attachment| {
                let target = dir.join(format!("{}-{}", plan.key, attachment.file_name));
                async move {
                    fs::copy(&attachment.path, &target)
                        .await
                        .map_err(|e| StoreError::write(&target, e))
                }
            }))
            .await?;
            content = rewrite_attachment_refs(&content, &renames);
        }

        let metadata = compose_metadata(plan);
        tokio::try_join!(
            store.save_metadata(&plan.path, &metadata),
            store.save_content(&plan.path, &content),
        )?;

        let mut card = Card::new(&plan.key, &plan.path)
            .with_metadata(metadata)
            .with_content(content);
        card.parent = Some(plan.parent.clone());
        Ok(card)
    }
}

async fn resolve_type(resolver: &ResourceResolver, name: &str) -> Result<ResolvedType> {
    let card_type = resolver
        .card_type(name)
        .await?
        .ok_or_else(|| CardsmithError::CardTypeNotFound {
            name: name.to_string(),
        })?;
    let workflow = resolver
        .workflow(&card_type.workflow)
        .await?
        .ok_or_else(|| CardsmithError::WorkflowNotFound {
            name: card_type.workflow.clone(),
        })?;
    let initial_state = workflow
        .initial_state()
        .ok_or_else(|| CardsmithError::NoInitialState {
            workflow: workflow.name.clone(),
        })?
        .to_string();
    Ok(ResolvedType {
        card_type,
        initial_state,
    })
}

fn card_type_name(card: &Card) -> String {
    card.metadata
        .as_ref()
        .map(|metadata| metadata.card_type.clone())
        .unwrap_or_default()
}

/// Non-calculated custom fields are always present, `null` when unset
fn add_declared_fields(metadata: &mut CardMetadata, card_type: &CardType) {
    for field in card_type.custom_fields.iter().filter(|f| !f.is_calculated) {
        metadata
            .fields
            .entry(field.name.clone())
            .or_insert(Value::Null);
    }
}

fn compose_metadata(plan: &CardPlan<'_>) -> CardMetadata {
    let mut metadata = plan.blueprint.metadata.clone().unwrap_or_default();
    add_declared_fields(&mut metadata, &plan.resolved.card_type);
    metadata.template_card_key = Some(plan.blueprint.key.clone());
    metadata.workflow_state = plan.resolved.initial_state.clone();
    metadata.card_type = plan.resolved.card_type.name.clone();
    metadata.rank = plan.rank.clone();
    metadata.touch();
    metadata
}

async fn rollback(plans: &[CardPlan<'_>]) {
    for plan in plans {
        match fs::remove_dir_all(&plan.path).await {
            Ok(()) => debug!(path = %plan.path.display(), "rolled back card directory"),
            // Already gone with its parent
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %plan.path.display(),
                error = %e,
                "rollback could not remove card directory"
            ),
        }
    }
}

fn image_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{#image\}\}.*?\{\{/image\}\}").expect("valid regex"))
}

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""fileName"\s*:\s*"([^"]*)""#).expect("valid regex"))
}

fn image_macro_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(image::?)([^\[\]\s:][^\[\]\s]*)\[").expect("valid regex"))
}

/// Point attachment references in `content` at renamed files. Handles the
/// structured `{{#image}}` marker and the `image::` / `image:` macros.
fn rewrite_attachment_refs(content: &str, renames: &HashMap<String, String>) -> String {
    let content = image_block_regex().replace_all(content, |block: &Captures| {
        file_name_regex()
            .replace_all(&block[0], |field: &Captures| match renames.get(&field[1]) {
                Some(renamed) => format!("\"fileName\":\"{renamed}\""),
                None => field[0].to_string(),
            })
            .into_owned()
    });
    image_macro_regex()
        .replace_all(&content, |image: &Captures| match renames.get(&image[2]) {
            Some(renamed) => format!("{}{}[", &image[1], renamed),
            None => image[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renames() -> HashMap<String, String> {
        [("photo.png".to_string(), "test_k1-photo.png".to_string())].into()
    }

    #[test]
    fn test_rewrite_image_macros() {
        let content = "Before image::photo.png[Photo] and inline image:photo.png[] after";
        assert_eq!(
            rewrite_attachment_refs(content, &renames()),
            "Before image::test_k1-photo.png[Photo] and inline image:test_k1-photo.png[] after"
        );
    }

    #[test]
    fn test_rewrite_structured_marker() {
        let content = r#"{{#image}}{"fileName": "photo.png", "width": 300}{{/image}}"#;
        assert_eq!(
            rewrite_attachment_refs(content, &renames()),
            r#"{{#image}}{"fileName":"test_k1-photo.png", "width": 300}{{/image}}"#
        );
    }

    #[test]
    fn test_image_macro_needs_word_boundary() {
        let content = "myimage:photo.png[] x_image::photo.png[] (image:photo.png[])";
        assert_eq!(
            rewrite_attachment_refs(content, &renames()),
            "myimage:photo.png[] x_image::photo.png[] (image:test_k1-photo.png[])"
        );
    }

    #[test]
    fn test_unrelated_references_untouched() {
        let content = concat!(
            "image::other.png[]\n",
            r#"{"fileName":"photo.png"} outside a marker"#,
        );
        assert_eq!(rewrite_attachment_refs(content, &renames()), content);
    }
}
