//! Modeling lints
//!
//! Conventions of ER modeling that the store does not enforce. A diagram
//! that trips them is still structurally valid; the lints only report.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::ErDatabase;
use crate::core::ElementRef;

/// How much a diagnostic matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single modeling rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LintRule {
    /// Element with a blank name
    EmptyName,
    /// Weak entity with no relationship where its side is `must`
    WeakEntityWithoutIdentifyingRelationship,
    /// Primary attribute hanging off a relationship
    PrimaryOutsideEntity,
    /// Relationship attributes on a relationship that is not `N-N`
    RelationshipAttributeNotManyToMany,
    /// Strong entity with no primary attribute
    MissingPrimaryKey,
}

impl LintRule {
    pub const ALL: [LintRule; 5] = [
        LintRule::EmptyName,
        LintRule::WeakEntityWithoutIdentifyingRelationship,
        LintRule::PrimaryOutsideEntity,
        LintRule::RelationshipAttributeNotManyToMany,
        LintRule::MissingPrimaryKey,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LintRule::EmptyName => "empty-name",
            LintRule::WeakEntityWithoutIdentifyingRelationship => {
                "weak-entity-without-identifying-relationship"
            }
            LintRule::PrimaryOutsideEntity => "primary-outside-entity",
            LintRule::RelationshipAttributeNotManyToMany => {
                "relationship-attribute-not-many-to-many"
            }
            LintRule::MissingPrimaryKey => "missing-primary-key",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LintRule::EmptyName => "element has a blank name",
            LintRule::WeakEntityWithoutIdentifyingRelationship => {
                "weak entity has no relationship with mandatory participation on its side"
            }
            LintRule::PrimaryOutsideEntity => {
                "primary key attribute belongs to a relationship instead of an entity"
            }
            LintRule::RelationshipAttributeNotManyToMany => {
                "relationship attributes usually belong to N-N relationships"
            }
            LintRule::MissingPrimaryKey => "strong entity has no primary key attribute",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            LintRule::RelationshipAttributeNotManyToMany | LintRule::MissingPrimaryKey => {
                Severity::Info
            }
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for LintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LintRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LintRule::ALL
            .into_iter()
            .find(|rule| rule.name() == s)
            .ok_or_else(|| format!("Unknown lint rule: {}", s))
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub rule: LintRule,
    pub severity: Severity,
    pub element: ElementRef,
    pub message: String,
}

impl Diagnostic {
    fn new(rule: LintRule, element: impl Into<ElementRef>, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: rule.severity(),
            element: element.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {}: {}",
            self.severity, self.rule, self.element, self.message
        )
    }
}

/// Which rules run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LintConfig {
    disabled: HashSet<LintRule>,
}

impl LintConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a rule off
    pub fn allow(mut self, rule: LintRule) -> Self {
        self.disabled.insert(rule);
        self
    }

    pub fn is_enabled(&self, rule: LintRule) -> bool {
        !self.disabled.contains(&rule)
    }
}

/// Runs the enabled rules over a diagram
#[derive(Debug, Clone, Default)]
pub struct Linter {
    config: LintConfig,
}

impl Linter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LintConfig) -> Self {
        Self { config }
    }

    /// Diagnostics in diagram order: entities, then relationships, then attributes
    pub fn check(&self, db: &ErDatabase) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let enabled = |rule| self.config.is_enabled(rule);

        for entity in db.entities() {
            if enabled(LintRule::EmptyName) && entity.name.trim().is_empty() {
                diagnostics.push(Diagnostic::new(
                    LintRule::EmptyName,
                    entity.id,
                    "entity name is empty",
                ));
            }

            if entity.is_weak && enabled(LintRule::WeakEntityWithoutIdentifyingRelationship) {
                let identified = db
                    .relationships_of(entity.id)
                    .map(|mut touching| {
                        touching.any(|r| {
                            r.participation_of(entity.id)
                                .is_some_and(|p| p.is_total())
                        })
                    })
                    .unwrap_or(false);
                if !identified {
                    diagnostics.push(Diagnostic::new(
                        LintRule::WeakEntityWithoutIdentifyingRelationship,
                        entity.id,
                        format!("weak entity '{}' has no identifying relationship", entity.name),
                    ));
                }
            }

            if !entity.is_weak && enabled(LintRule::MissingPrimaryKey) {
                let has_key = entity.attribute_ids().iter().any(|root| {
                    let tree = std::iter::once(*root)
                        .chain(db.descendants(*root).unwrap_or_default());
                    tree.filter_map(|id| db.get_attribute(id))
                        .any(|a| a.is_primary)
                });
                if !has_key {
                    diagnostics.push(Diagnostic::new(
                        LintRule::MissingPrimaryKey,
                        entity.id,
                        format!("entity '{}' has no primary key", entity.name),
                    ));
                }
            }
        }

        for relationship in db.relationships() {
            if enabled(LintRule::EmptyName) && relationship.name.trim().is_empty() {
                diagnostics.push(Diagnostic::new(
                    LintRule::EmptyName,
                    relationship.id,
                    "relationship name is empty",
                ));
            }

            if enabled(LintRule::RelationshipAttributeNotManyToMany)
                && !relationship.attribute_ids().is_empty()
                && !relationship.relationship_type.is_many_to_many()
            {
                diagnostics.push(Diagnostic::new(
                    LintRule::RelationshipAttributeNotManyToMany,
                    relationship.id,
                    format!(
                        "'{}' is {} but carries {} attribute(s)",
                        relationship.name,
                        relationship.relationship_type,
                        relationship.attribute_ids().len()
                    ),
                ));
            }
        }

        for attribute in db.all_attributes() {
            if enabled(LintRule::EmptyName) && attribute.name.trim().is_empty() {
                diagnostics.push(Diagnostic::new(
                    LintRule::EmptyName,
                    attribute.id,
                    "attribute name is empty",
                ));
            }

            if attribute.is_primary && enabled(LintRule::PrimaryOutsideEntity) {
                if let Ok(owner @ ElementRef::Relationship(_)) = db.root_owner(attribute.id) {
                    diagnostics.push(Diagnostic::new(
                        LintRule::PrimaryOutsideEntity,
                        attribute.id,
                        format!("primary attribute '{}' belongs to {}", attribute.name, owner),
                    ));
                }
            }
        }

        debug!(diagnostics = diagnostics.len(), "Lint completed");
        diagnostics
    }
}

/// Run every rule with the default configuration
pub fn lint(db: &ErDatabase) -> Vec<Diagnostic> {
    Linter::new().check(db)
}
