//! Entity-relationship diagrams
//!
//! Records, the [`ErDatabase`] store that owns them, the JSON document
//! mapping, modeling lints and a plain-text outline.

mod attribute;
mod database;
pub mod document;
mod entity;
pub mod lint;
pub mod outline;
mod relationship;

pub use attribute::*;
pub use database::*;
pub use document::{AttributeDocument, DiagramDocument, EntityDocument, RelationshipDocument};
pub use entity::*;
pub use lint::{lint, Diagnostic, LintConfig, LintRule, Linter, Severity};
pub use outline::{outline, OutlineRenderer};
pub use relationship::*;
