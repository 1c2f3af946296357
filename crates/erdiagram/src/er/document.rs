//! Structural JSON mapping of a diagram
//!
//! Attributes nest under their owner, relationships name their entities by
//! id, and field names follow the editor's record shapes (`isWeak`,
//! `connectedTo`, `relationship_type`, `diamondOffsetX`, ...).
//!
//! ```rust
//! use erdiagram::er::ErDatabase;
//!
//! let json = r#"{
//!   "entities": [
//!     {"id": 1, "name": "Student", "x": 0, "y": 0, "isWeak": false, "attributes": []},
//!     {"id": 2, "name": "Course", "x": 200, "y": 0, "isWeak": false, "attributes": []}
//!   ],
//!   "relationships": [
//!     {"id": 1, "name": "Enrolls", "entities": [1, 2], "relationship_type": "N-N",
//!      "from_entity": "can", "to_entity": "can", "attributes": []}
//!   ]
//! }"#;
//!
//! let db = ErDatabase::from_json(json).unwrap();
//! assert_eq!(db.relationship_count(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::{Attribute, Entity, ErDatabase, Relationship};
use crate::core::{
    AttributeId, Cardinality, DiagramError, ElementRef, EntityId, Participation, Position,
    RelationshipId,
};

/// A whole diagram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramDocument {
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDocument {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub is_weak: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeDocument>,
    /// Derived on save; only cross-checked on load
    #[serde(default)]
    pub relationships: Vec<RelationshipId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDocument {
    pub id: AttributeId,
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub connected_to: ElementRef,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_multivalue: bool,
    #[serde(default)]
    pub is_calculated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subattributes: Option<Vec<AttributeDocument>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDocument {
    pub id: RelationshipId,
    pub name: String,
    pub entities: [EntityId; 2],
    pub relationship_type: Cardinality,
    #[serde(default)]
    pub from_entity: Participation,
    #[serde(default)]
    pub to_entity: Participation,
    #[serde(default)]
    pub attributes: Vec<AttributeDocument>,
    #[serde(
        rename = "diamondOffsetX",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub diamond_offset_x: Option<f64>,
    #[serde(
        rename = "diamondOffsetY",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub diamond_offset_y: Option<f64>,
}

impl ErDatabase {
    /// Snapshot the diagram as a document
    pub fn to_document(&self) -> DiagramDocument {
        let entities = self
            .entities()
            .map(|entity| EntityDocument {
                id: entity.id,
                name: entity.name.clone(),
                x: entity.position.x,
                y: entity.position.y,
                is_weak: entity.is_weak,
                attributes: self.attribute_documents(entity.attribute_ids()),
                relationships: self
                    .relationship_ids_of(entity.id)
                    .map(|ids| ids.to_vec())
                    .unwrap_or_default(),
            })
            .collect();

        let relationships = self
            .relationships()
            .map(|relationship| RelationshipDocument {
                id: relationship.id,
                name: relationship.name.clone(),
                entities: relationship.entities,
                relationship_type: relationship.relationship_type,
                from_entity: relationship.from_entity,
                to_entity: relationship.to_entity,
                attributes: self.attribute_documents(relationship.attribute_ids()),
                diamond_offset_x: relationship.diamond_offset_x,
                diamond_offset_y: relationship.diamond_offset_y,
            })
            .collect();

        DiagramDocument {
            entities,
            relationships,
        }
    }

    fn attribute_documents(&self, ids: &[AttributeId]) -> Vec<AttributeDocument> {
        ids.iter()
            .filter_map(|id| self.get_attribute(*id))
            .map(|attribute| AttributeDocument {
                id: attribute.id,
                name: attribute.name.clone(),
                x: attribute.position.x,
                y: attribute.position.y,
                connected_to: attribute.connected_to,
                is_primary: attribute.is_primary,
                is_multivalue: attribute.is_multivalue,
                is_calculated: attribute.is_calculated,
                subattributes: attribute
                    .subattributes()
                    .map(|children| self.attribute_documents(children)),
            })
            .collect()
    }

    /// Build a store from a document, checking every reference
    pub fn from_document(document: &DiagramDocument) -> Result<Self, DiagramError> {
        let mut db = ErDatabase::new();

        for entity in &document.entities {
            let mut record = Entity::new(entity.id, entity.name.clone());
            record.position = Position::new(entity.x, entity.y);
            record.is_weak = entity.is_weak;
            db.insert_entity(record)?;
            db.load_attributes(entity.id.into(), &entity.attributes)?;
        }

        for relationship in &document.relationships {
            let mut record = Relationship::new(
                relationship.id,
                relationship.name.clone(),
                relationship.entities,
                relationship.relationship_type,
            )
            .with_participation(relationship.from_entity, relationship.to_entity);
            record.diamond_offset_x = relationship.diamond_offset_x;
            record.diamond_offset_y = relationship.diamond_offset_y;
            db.insert_relationship(record)?;
            db.load_attributes(relationship.id.into(), &relationship.attributes)?;
        }

        for entity in &document.entities {
            if entity.relationships.is_empty() {
                continue;
            }
            let mut listed = entity.relationships.clone();
            let mut derived = db.relationship_ids_of(entity.id)?.to_vec();
            listed.sort();
            listed.dedup();
            derived.sort();
            if listed != derived {
                warn!(
                    entity_id = %entity.id,
                    ?listed,
                    ?derived,
                    "Document back-references disagree with relationships; using relationships"
                );
            }
        }

        debug!(
            entities = db.entity_count(),
            relationships = db.relationship_count(),
            attributes = db.attribute_count(),
            "Document loaded"
        );
        Ok(db)
    }

    fn load_attributes(
        &mut self,
        owner: ElementRef,
        attributes: &[AttributeDocument],
    ) -> Result<(), DiagramError> {
        for attribute in attributes {
            if attribute.connected_to != owner {
                return Err(DiagramError::invalid_owner(
                    attribute.connected_to,
                    format!("{} is nested under {}", attribute.id, owner),
                ));
            }
            if attribute.subattributes.as_ref().is_some_and(|s| s.is_empty()) {
                return Err(DiagramError::integrity(format!(
                    "{} has an empty subattribute list",
                    attribute.id
                )));
            }

            let mut record = Attribute::new(attribute.id, attribute.name.clone(), owner);
            record.position = Position::new(attribute.x, attribute.y);
            record.is_primary = attribute.is_primary;
            record.is_multivalue = attribute.is_multivalue;
            record.is_calculated = attribute.is_calculated;
            self.insert_attribute(record)?;

            if let Some(children) = &attribute.subattributes {
                self.load_attributes(attribute.id.into(), children)?;
            }
        }
        Ok(())
    }

    /// Parse a JSON document into a store
    pub fn from_json(json: &str) -> Result<Self, DiagramError> {
        let document: DiagramDocument = serde_json::from_str(json)?;
        Self::from_document(&document)
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, DiagramError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Serialize as single-line JSON
    pub fn to_json_compact(&self) -> Result<String, DiagramError> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    /// Read a JSON document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DiagramError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the diagram to disk as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DiagramError> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }
}
