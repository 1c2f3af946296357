//! Entity records

use crate::core::{AttributeId, EntityId, Position};

/// A rectangular box in the diagram
///
/// The attribute list is owned by the store: it is filled when attributes
/// are added with this entity as owner, and ignored when a record is
/// inserted. Relationships touching the entity are not stored here; ask
/// [`ErDatabase::relationships_of`](super::ErDatabase::relationships_of).
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub position: Position,
    /// Existence-dependent on another entity through an identifying relationship
    pub is_weak: bool,
    pub(crate) attributes: Vec<AttributeId>,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: Position::default(),
            is_weak: false,
            attributes: Vec::new(),
        }
    }

    /// Coordinates must be finite; the store rejects the record otherwise
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn weak(mut self) -> Self {
        self.is_weak = true;
        self
    }

    /// Ids of the attributes owned by this entity, in order
    pub fn attribute_ids(&self) -> &[AttributeId] {
        &self.attributes
    }
}
