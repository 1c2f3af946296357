//! Core type definitions for ER diagrams
//!
//! Typed identifiers, the tagged element reference used for attribute
//! ownership, positions, and the cardinality and participation literals.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::DiagramError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", $kind, self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of an [`Entity`](crate::er::Entity), unique among entities.
    EntityId,
    "entity"
);
define_id!(
    /// Identifier of an [`Attribute`](crate::er::Attribute), unique among attributes.
    AttributeId,
    "attribute"
);
define_id!(
    /// Identifier of a [`Relationship`](crate::er::Relationship), unique among relationships.
    RelationshipId,
    "relationship"
);

/// The three kinds of diagram element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Entity,
    Relationship,
    Attribute,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Entity => "entity",
            ElementKind::Relationship => "relationship",
            ElementKind::Attribute => "attribute",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged reference to any diagram element
///
/// This is also the owner of an attribute (`connectedTo`): an attribute
/// hangs off an entity, a relationship, or a parent attribute.
///
/// Serializes as `{"kind": "entity", "id": 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ElementRef {
    Entity(EntityId),
    Relationship(RelationshipId),
    Attribute(AttributeId),
}

impl ElementRef {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementRef::Entity(_) => ElementKind::Entity,
            ElementRef::Relationship(_) => ElementKind::Relationship,
            ElementRef::Attribute(_) => ElementKind::Attribute,
        }
    }

    /// The raw numeric id, without its kind
    pub fn raw_id(&self) -> u32 {
        match self {
            ElementRef::Entity(id) => id.0,
            ElementRef::Relationship(id) => id.0,
            ElementRef::Attribute(id) => id.0,
        }
    }
}

impl From<EntityId> for ElementRef {
    fn from(id: EntityId) -> Self {
        ElementRef::Entity(id)
    }
}

impl From<RelationshipId> for ElementRef {
    fn from(id: RelationshipId) -> Self {
        ElementRef::Relationship(id)
    }
}

impl From<AttributeId> for ElementRef {
    fn from(id: AttributeId) -> Self {
        ElementRef::Attribute(id)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw_id())
    }
}

/// Parses `entity:1`, `relationship:2` or `attribute:3`.
///
/// The short prefixes `e`, `r` and `a` are accepted as well.
impl FromStr for ElementRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <kind>:<id>, got {:?}", s))?;
        let id: u32 = id
            .trim()
            .parse()
            .map_err(|_| format!("invalid element id in {:?}", s))?;
        match kind.trim().to_lowercase().as_str() {
            "entity" | "e" => Ok(ElementRef::Entity(EntityId(id))),
            "relationship" | "r" => Ok(ElementRef::Relationship(RelationshipId(id))),
            "attribute" | "a" => Ok(ElementRef::Attribute(AttributeId(id))),
            other => Err(format!("unknown element kind: {}", other)),
        }
    }
}

/// A point in diagram coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Maximum number of associated instances on each side of a relationship
///
/// Read positionally against the relationship's entity pair: `1-N` means one
/// instance of the first entity relates to many of the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Cardinality {
    OneToOne,
    #[default]
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// All cardinalities in declaration order
    pub const ALL: [Cardinality; 4] = [
        Cardinality::OneToOne,
        Cardinality::OneToMany,
        Cardinality::ManyToOne,
        Cardinality::ManyToMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "1-1",
            Cardinality::OneToMany => "1-N",
            Cardinality::ManyToOne => "N-1",
            Cardinality::ManyToMany => "N-N",
        }
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self, Cardinality::ManyToMany)
    }

    /// The same cardinality read from the other end of the pair
    pub fn reversed(&self) -> Self {
        match self {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            other => *other,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cardinality {
    type Err = DiagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1-1" => Ok(Cardinality::OneToOne),
            "1-N" => Ok(Cardinality::OneToMany),
            "N-1" => Ok(Cardinality::ManyToOne),
            "N-N" => Ok(Cardinality::ManyToMany),
            other => Err(DiagramError::InvalidCardinality(other.to_string())),
        }
    }
}

impl Serialize for Cardinality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Cardinality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether an entity's participation in a relationship is optional or total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Participation {
    /// Optional participation (`can`)
    #[default]
    Can,
    /// Mandatory, total participation (`must`)
    Must,
}

impl Participation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Participation::Can => "can",
            Participation::Must => "must",
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self, Participation::Must)
    }
}

impl fmt::Display for Participation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Participation {
    type Err = DiagramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "can" => Ok(Participation::Can),
            "must" => Ok(Participation::Must),
            other => Err(DiagramError::InvalidParticipation(other.to_string())),
        }
    }
}

impl Serialize for Participation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Participation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
