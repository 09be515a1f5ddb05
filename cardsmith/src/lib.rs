//! Cardsmith - file-backed card projects
//!
//! A project keeps its content as a tree of cards on disk, described by
//! resources (card types, workflows, field types, templates, ...) that come
//! from the project itself or from imported modules.
//!
//! ## Project Layout
//!
//! ```text
//! <project>/
//! ├── .cards/
//! │   ├── local/
//! │   │   ├── cardsConfig.json              # prefix, name, imported modules
//! │   │   ├── cardTypes/page.json
//! │   │   ├── workflows/simple.json
//! │   │   └── templates/page/
//! │   │       ├── template.json
//! │   │       └── c/<cardKey>/...           # blueprint cards
//! │   └── modules/<prefix>/                 # imported, same layout as local/
//! └── cardRoot/<cardKey>/
//!     ├── index.json
//!     ├── index.adoc
//!     ├── a/
//!     └── c/
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cardsmith::Project;
//!
//! # async fn example() -> cardsmith::Result<()> {
//! let project = Project::open("/path/to/project").await?;
//! let cards = project.create_card("page", None).await?;
//! project
//!     .update_card_content(&cards[0].key, "= Hello", false)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod keys;
mod project;
mod template;
mod validator;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{CardsmithError, Result};
pub use project::Project;
pub use template::Template;
pub use validator::{CardValidator, StructuralValidator};

pub use cardsmith_rank::{Rank, Ranked};
pub use cardsmith_resources::{
    CardType, FieldType, ProjectConfig, ProjectPaths, Resource, ResourceContent, ResourceKind,
    ResourceName, ResourceResolver, Scope, Workflow,
};
pub use cardsmith_store::{Card, CardAttachment, CardDetails, CardMetadata, ContentRenderer};
