//! Project resources: card types, workflows, field types, templates and the rest
//!
//! Resources come from two layers. Local resources live under `.cards/local`
//! and belong to the project. Imported resources live under
//! `.cards/modules/<prefix>` and belong to the module they came from. Each
//! resource is named `<ownerPrefix>/<kindPlural>/<identifier>`.
//!
//! [`ResourceResolver`] lists and loads resources from either layer or both,
//! caching the listings until told they changed.

mod config;
mod content;
mod error;
mod kind;
mod name;
pub mod paths;
mod resolver;

pub use config::{validate_prefix, ModuleSetting, ProjectConfig};
pub use content::{
    CardType, CustomField, FieldType, FolderMetadata, GenericResource, LinkType, ResourceContent,
    Workflow, WorkflowState, WorkflowTransition,
};
pub use error::{ResourceError, Result};
pub use kind::{ResourceKind, Scope};
pub use name::{validate_identifier, ResourceName, MAX_IDENTIFIER_LEN};
pub use paths::ProjectPaths;
pub use resolver::{Resource, ResourceResolver, ResourceSource};
