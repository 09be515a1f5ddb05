//! Project fixtures for tests.
//!
//! Available to this crate's tests and, with the `test-support` feature, to
//! integration tests and downstream crates.

use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;

use cardsmith_rank::Rank;
use cardsmith_resources::ResourceKind;
use cardsmith_store::{CardDetails, CardMetadata, StoreError};

use crate::error::{CardsmithError, Result};
use crate::project::Project;

pub const TEST_PREFIX: &str = "test";
pub const WORKFLOW: &str = "test/workflows/simple";
pub const CARD_TYPE: &str = "test/cardTypes/page";
pub const TEMPLATE: &str = "test/templates/page";
pub const OWNER_FIELD: &str = "test/fieldTypes/owner";
pub const SCORE_FIELD: &str = "test/fieldTypes/score";

/// Create a project with prefix `test` holding:
///
/// - workflow `simple`: `Draft` (initial) and `Approved`
/// - field types `owner` and `score`
/// - card type `page` with `owner` and a calculated `score`
/// - an empty template `page`
pub async fn init_project(root: &Path) -> Result<Project> {
    let project = Project::create(root, TEST_PREFIX, "Test Project").await?;
    project
        .create_resource(
            ResourceKind::Workflows,
            "simple",
            json!({
                "states": [
                    {"name": "Draft", "category": "initial"},
                    {"name": "Approved", "category": "closed"}
                ],
                "transitions": [
                    {"name": "Create", "fromState": [""], "toState": "Draft"},
                    {"name": "Approve", "fromState": ["Draft"], "toState": "Approved"}
                ]
            }),
        )
        .await?;
    project
        .create_resource(
            ResourceKind::FieldTypes,
            "owner",
            json!({
                "dataType": "shortText",
                "displayName": "Owner",
                "description": "Who owns the card"
            }),
        )
        .await?;
    project
        .create_resource(ResourceKind::FieldTypes, "score", json!({"dataType": "number"}))
        .await?;
    project
        .create_resource(
            ResourceKind::CardTypes,
            "page",
            json!({
                "workflow": WORKFLOW,
                "customFields": [
                    {"name": OWNER_FIELD},
                    {"name": SCORE_FIELD, "isCalculated": true}
                ]
            }),
        )
        .await?;
    project
        .create_resource(ResourceKind::Templates, "page", json!({"displayName": "Page"}))
        .await?;
    Ok(project)
}

/// Blueprint metadata of card type `page`
pub fn blueprint_metadata(title: &str, rank: Rank) -> CardMetadata {
    CardMetadata::new(CARD_TYPE, "Draft")
        .with_title(title)
        .with_rank(rank)
}

/// Write a card straight into `template`'s card tree, below `parent` when
/// given. Returns the card directory.
pub async fn write_blueprint_card(
    project: &Project,
    template: &str,
    key: &str,
    parent: Option<&str>,
    metadata: &CardMetadata,
    content: &str,
) -> Result<PathBuf> {
    let template = project.template(template).await?;
    let dir = match parent {
        None => template.card_root(),
        Some(parent) => project
            .store()
            .find(&template.card_root(), parent, &CardDetails::none())
            .await?
            .ok_or_else(|| CardsmithError::card_not_found(parent))?
            .children_dir(),
    };
    let path = dir.join(key);
    fs::create_dir_all(&path)
        .await
        .map_err(|e| StoreError::write(&path, e))?;
    project.store().save_metadata(&path, metadata).await?;
    project.store().save_content(&path, content).await?;
    Ok(path)
}

/// Put a file into the `a/` folder of the card at `card_path`
pub async fn write_attachment(card_path: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let dir = card_path.join(cardsmith_store::ATTACHMENTS_DIR);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| StoreError::write(&dir, e))?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)
        .await
        .map_err(|e| StoreError::write(&path, e))?;
    Ok(path)
}
