//! erdiagram - In-memory entity-relationship diagrams
//!
//! A typed store for ER diagrams: entities, attributes (optionally composite)
//! and binary relationships with cardinality and participation. The store
//! keeps ownership and participation consistent across every edit and
//! cascades deletions.
//!
//! # Quick Start
//!
//! ```rust
//! use erdiagram::prelude::*;
//!
//! let mut db = ErDatabase::new();
//! let student = db.create_entity("Student").unwrap();
//! let course = db.create_entity("Course").unwrap();
//! let enrolls = db
//!     .create_relationship("Enrolls", [student, course], Cardinality::ManyToMany)
//!     .unwrap();
//! db.create_attribute(enrolls, "grade").unwrap();
//!
//! // Deleting an entity takes its relationships with it
//! let removed = db.delete(student).unwrap();
//! assert!(removed.contains(enrolls.into()));
//! assert_eq!(db.relationship_count(), 0);
//! ```
//!
//! # Documents
//!
//! Diagrams load from and save to a structural JSON document:
//!
//! ```rust
//! let db = erdiagram::load(r#"{"entities": [{"id": 1, "name": "Student"}]}"#).unwrap();
//! assert_eq!(db.entity_count(), 1);
//!
//! let diagnostics = erdiagram::validate(r#"{"entities": [{"id": 1, "name": "Student"}]}"#)
//!     .unwrap();
//! assert_eq!(diagnostics[0].rule.name(), "missing-primary-key");
//! ```

pub mod core;
pub mod er;

pub use self::core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        AttributeId, Cardinality, Database, DiagramError, ElementKind, ElementRef, EntityId,
        Participation, Position, RelationshipId,
    };
    pub use crate::er::{
        Attribute, AttributeFlag, Deletion, Diagnostic, DiagramDocument, Entity, ErDatabase,
        LintConfig, LintRule, Linter, OutlineRenderer, Relationship, Severity,
    };
}

/// Load a diagram from its JSON document
///
/// # Example
/// ```rust
/// let db = erdiagram::load(r#"{"entities": [], "relationships": []}"#).unwrap();
/// assert!(db.is_empty());
/// ```
pub fn load(json: &str) -> anyhow::Result<er::ErDatabase> {
    Ok(er::ErDatabase::from_json(json)?)
}

/// Load a diagram and run every lint over it
pub fn validate(json: &str) -> anyhow::Result<Vec<er::Diagnostic>> {
    validate_with_config(json, er::LintConfig::default())
}

/// Load a diagram and run the lints enabled in `config`
pub fn validate_with_config(
    json: &str,
    config: er::LintConfig,
) -> anyhow::Result<Vec<er::Diagnostic>> {
    let db = load(json)?;
    db.check_integrity()?;
    Ok(er::Linter::with_config(config).check(&db))
}

/// Load a diagram and render its text outline
pub fn outline(json: &str) -> anyhow::Result<String> {
    Ok(er::outline(&load(json)?))
}
