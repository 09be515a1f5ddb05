//! Directory-backed card tree store
//!
//! Cards live on disk as directories named by their key. This crate maps that
//! directory convention to an in-memory [`Card`] tree and back.
//!
//! ## Storage Structure
//!
//! ```text
//! cardRoot/
//! └── proj_a1b2c3d4/
//!     ├── index.json       # Card metadata (JSON)
//!     ├── index.adoc       # Card content
//!     ├── a/               # Attachments (flat files)
//!     │   └── photo.png
//!     └── c/               # Child cards, same layout
//!         └── proj_e5f6g7h8/
//!             ├── index.json
//!             └── index.adoc
//! ```
//!
//! Only the facets selected in [`CardDetails`] are read from disk. Facets of a
//! single card are fetched concurrently, and so are sibling subtrees.

mod card;
mod error;
pub mod scan;
mod store;

pub use card::{
    Card, CardAttachment, CardDetails, CardMetadata, Link, ATTACHMENTS_DIR, CHILDREN_DIR,
    CONTENT_FILE, METADATA_FILE, ROOT_PARENT, SCHEMA_MARKER, STRUCTURAL_FIELDS,
};
pub use error::{Result, StoreError};
pub use store::{atomic_write, CardStore, ContentRenderer};

pub use cardsmith_rank::{Rank, Ranked};
