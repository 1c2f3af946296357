//! Relationship records

use crate::core::{AttributeId, Cardinality, EntityId, Participation, RelationshipId};

/// A binary association between two entities
///
/// `relationship_type`, `from_entity` and `to_entity` are read positionally
/// against `entities`: the first entry is the "from" side. Both entries may
/// name the same entity for a recursive relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: RelationshipId,
    pub name: String,
    pub entities: [EntityId; 2],
    pub relationship_type: Cardinality,
    pub from_entity: Participation,
    pub to_entity: Participation,
    /// Offset of the diamond glyph from its default position
    pub diamond_offset_x: Option<f64>,
    pub diamond_offset_y: Option<f64>,
    pub(crate) attributes: Vec<AttributeId>,
}

impl Relationship {
    pub fn new(
        id: RelationshipId,
        name: impl Into<String>,
        entities: [EntityId; 2],
        relationship_type: Cardinality,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            entities,
            relationship_type,
            from_entity: Participation::Can,
            to_entity: Participation::Can,
            diamond_offset_x: None,
            diamond_offset_y: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_participation(mut self, from: Participation, to: Participation) -> Self {
        self.from_entity = from;
        self.to_entity = to;
        self
    }

    /// Offsets must be finite; the store rejects the record otherwise
    pub fn with_diamond_offset(mut self, x: f64, y: f64) -> Self {
        self.diamond_offset_x = Some(x);
        self.diamond_offset_y = Some(y);
        self
    }

    pub fn from(&self) -> EntityId {
        self.entities[0]
    }

    pub fn to(&self) -> EntityId {
        self.entities[1]
    }

    pub fn involves(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    pub fn is_recursive(&self) -> bool {
        self.entities[0] == self.entities[1]
    }

    /// Participation of `entity` in this relationship
    ///
    /// For a recursive relationship the stronger of the two sides wins.
    pub fn participation_of(&self, entity: EntityId) -> Option<Participation> {
        let from = (self.entities[0] == entity).then_some(self.from_entity);
        let to = (self.entities[1] == entity).then_some(self.to_entity);
        match (from, to) {
            (Some(a), Some(b)) if a.is_total() || b.is_total() => Some(Participation::Must),
            (Some(a), _) => Some(a),
            (None, b) => b,
        }
    }

    /// Ids of the attributes owned by this relationship, in order
    pub fn attribute_ids(&self) -> &[AttributeId] {
        &self.attributes
    }

    /// Whether the diamond sits at its default position
    pub fn has_default_diamond(&self) -> bool {
        self.diamond_offset_x.is_none() && self.diamond_offset_y.is_none()
    }
}
