//! ER diagram database implementation
//!
//! Stores entities, relationships and attributes for one diagram and keeps
//! ownership and back-references consistent across every edit. Entities and
//! relationships keep insertion order; attributes keep the order of their
//! owner's child list.

use anyhow::Result as AnyResult;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use super::{Attribute, AttributeFlag, Entity, Relationship};
use crate::core::{
    AttributeId, Cardinality, Database, DiagramError, ElementKind, ElementRef, EntityId,
    Participation, Position, RelationshipId,
};

type Result<T> = std::result::Result<T, DiagramError>;

/// Ids removed by a delete operation, including everything it cascaded to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deletion {
    pub entities: Vec<EntityId>,
    pub relationships: Vec<RelationshipId>,
    pub attributes: Vec<AttributeId>,
}

impl Deletion {
    /// Total number of removed elements
    pub fn len(&self) -> usize {
        self.entities.len() + self.relationships.len() + self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, element: ElementRef) -> bool {
        match element {
            ElementRef::Entity(id) => self.entities.contains(&id),
            ElementRef::Relationship(id) => self.relationships.contains(&id),
            ElementRef::Attribute(id) => self.attributes.contains(&id),
        }
    }
}

/// ER diagram database
///
/// Ids are unique per kind and never handed out twice by the same store.
/// `Entity.relationships` is derived from a participation index that is
/// updated by every structural mutation.
#[derive(Debug, Clone, Default)]
pub struct ErDatabase {
    /// Entities indexed by ID
    entities: HashMap<EntityId, Entity>,
    /// Entity IDs in insertion order
    entity_order: Vec<EntityId>,
    /// Relationships indexed by ID
    relationships: HashMap<RelationshipId, Relationship>,
    /// Relationship IDs in insertion order
    relationship_order: Vec<RelationshipId>,
    /// Attributes indexed by ID; ordering lives in the owners' child lists
    attributes: HashMap<AttributeId, Attribute>,
    /// Relationships touching each entity, in relationship order
    participation: HashMap<EntityId, Vec<RelationshipId>>,
    /// Highest id ever used, per kind
    last_entity_id: u32,
    last_relationship_id: u32,
    last_attribute_id: u32,
}

impl ErDatabase {
    /// Create a new empty database
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------

    /// The id the next `create_entity` call will assign
    ///
    /// Fails once the highest entity id in use is `u32::MAX`.
    pub fn next_entity_id(&self) -> Result<EntityId> {
        next_id(self.last_entity_id, ElementKind::Entity).map(EntityId)
    }

    pub fn next_relationship_id(&self) -> Result<RelationshipId> {
        next_id(self.last_relationship_id, ElementKind::Relationship).map(RelationshipId)
    }

    pub fn next_attribute_id(&self) -> Result<AttributeId> {
        next_id(self.last_attribute_id, ElementKind::Attribute).map(AttributeId)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create an entity at the origin with the next free id
    pub fn create_entity(&mut self, name: impl Into<String>) -> Result<EntityId> {
        let id = self.next_entity_id()?;
        self.store_entity(Entity::new(id, name));
        Ok(id)
    }

    /// Insert a fully built entity carrying its own id
    ///
    /// Any attribute ids on the record are dropped; attributes are added
    /// through the store.
    pub fn insert_entity(&mut self, mut entity: Entity) -> Result<EntityId> {
        if self.entities.contains_key(&entity.id) {
            return Err(DiagramError::DuplicateId(entity.id.into()));
        }
        check_position(entity.id.into(), entity.position)?;
        entity.attributes.clear();
        let id = entity.id;
        self.store_entity(entity);
        Ok(id)
    }

    fn store_entity(&mut self, entity: Entity) {
        trace!(
            entity_id = %entity.id,
            entity_name = %entity.name,
            is_weak = entity.is_weak,
            "Adding entity"
        );
        self.last_entity_id = self.last_entity_id.max(entity.id.0);
        self.entity_order.push(entity.id);
        self.entities.insert(entity.id, entity);
        debug!(entity_count = self.entity_count(), "Entity added");
    }

    /// Create a relationship between two existing entities with the next free id
    ///
    /// Both participations start as `can`.
    pub fn create_relationship(
        &mut self,
        name: impl Into<String>,
        entities: [EntityId; 2],
        relationship_type: Cardinality,
    ) -> Result<RelationshipId> {
        let id = self.next_relationship_id()?;
        self.insert_relationship(Relationship::new(id, name, entities, relationship_type))
    }

    /// Insert a fully built relationship carrying its own id
    ///
    /// Fails with `NotFound` when either entity is missing. Attribute ids on
    /// the record are dropped.
    pub fn insert_relationship(
        &mut self,
        mut relationship: Relationship,
    ) -> Result<RelationshipId> {
        if self.relationships.contains_key(&relationship.id) {
            return Err(DiagramError::DuplicateId(relationship.id.into()));
        }
        self.require_entities(relationship.entities)?;
        check_diamond_offset(
            relationship.id,
            relationship.diamond_offset_x,
            relationship.diamond_offset_y,
        )?;
        relationship.attributes.clear();

        let id = relationship.id;
        trace!(
            relationship_id = %id,
            relationship_name = %relationship.name,
            from = %relationship.entities[0],
            to = %relationship.entities[1],
            relationship_type = %relationship.relationship_type,
            "Adding relationship"
        );
        self.last_relationship_id = self.last_relationship_id.max(id.0);
        for entity in relationship.entities {
            let touching = self.participation.entry(entity).or_default();
            if !touching.contains(&id) {
                touching.push(id);
            }
        }
        self.relationship_order.push(id);
        self.relationships.insert(id, relationship);
        debug!(relationship_count = self.relationship_count(), "Relationship added");
        Ok(id)
    }

    /// Create an attribute under `owner` with the next free id
    pub fn create_attribute(
        &mut self,
        owner: impl Into<ElementRef>,
        name: impl Into<String>,
    ) -> Result<AttributeId> {
        let id = self.next_attribute_id()?;
        self.insert_attribute(Attribute::new(id, name, owner))
    }

    /// Insert a fully built attribute carrying its own id and owner
    ///
    /// The attribute is appended to its owner's child list. Fails with
    /// `InvalidOwner` when the owner does not exist.
    pub fn insert_attribute(&mut self, mut attribute: Attribute) -> Result<AttributeId> {
        if self.attributes.contains_key(&attribute.id) {
            return Err(DiagramError::DuplicateId(attribute.id.into()));
        }
        self.validate_owner(attribute.connected_to, attribute.id)?;
        check_position(attribute.id.into(), attribute.position)?;
        attribute.subattributes = None;

        let id = attribute.id;
        let owner = attribute.connected_to;
        trace!(
            attribute_id = %id,
            attribute_name = %attribute.name,
            owner = %owner,
            "Adding attribute"
        );
        self.last_attribute_id = self.last_attribute_id.max(id.0);
        self.attributes.insert(id, attribute);
        self.push_child(owner, id);
        debug!(attribute_count = self.attribute_count(), "Attribute added");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(&id)
    }

    pub fn get_attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes.get(&id)
    }

    /// Check if an element exists
    pub fn contains(&self, element: impl Into<ElementRef>) -> bool {
        match element.into() {
            ElementRef::Entity(id) => self.entities.contains_key(&id),
            ElementRef::Relationship(id) => self.relationships.contains_key(&id),
            ElementRef::Attribute(id) => self.attributes.contains_key(&id),
        }
    }

    /// Display name of any element
    pub fn name_of(&self, element: impl Into<ElementRef>) -> Option<&str> {
        match element.into() {
            ElementRef::Entity(id) => self.entities.get(&id).map(|e| e.name.as_str()),
            ElementRef::Relationship(id) => self.relationships.get(&id).map(|r| r.name.as_str()),
            ElementRef::Attribute(id) => self.attributes.get(&id).map(|a| a.name.as_str()),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty() && self.attributes.is_empty()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Entities in insertion order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + Clone + '_ {
        self.entity_order
            .iter()
            .filter_map(move |id| self.entities.get(id))
    }

    /// Relationships in insertion order
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> + Clone + '_ {
        self.relationship_order
            .iter()
            .filter_map(move |id| self.relationships.get(id))
    }

    /// Every attribute, depth-first: entity attributes first, then
    /// relationship attributes, each followed by its subattributes
    pub fn all_attributes(&self) -> Vec<&Attribute> {
        let roots = self
            .entities()
            .flat_map(|e| e.attributes.iter())
            .chain(self.relationships().flat_map(|r| r.attributes.iter()));

        let mut ordered = Vec::with_capacity(self.attributes.len());
        for root in roots {
            let mut stack = vec![*root];
            while let Some(id) = stack.pop() {
                if let Some(attribute) = self.attributes.get(&id) {
                    ordered.push(attribute);
                    stack.extend(attribute.subattribute_ids().iter().rev());
                }
            }
        }
        ordered
    }

    /// Ids of the attributes directly owned by `owner`, in order
    pub fn child_ids(&self, owner: impl Into<ElementRef>) -> Result<&[AttributeId]> {
        let owner = owner.into();
        let children = match owner {
            ElementRef::Entity(id) => self.entities.get(&id).map(|e| e.attributes.as_slice()),
            ElementRef::Relationship(id) => {
                self.relationships.get(&id).map(|r| r.attributes.as_slice())
            }
            ElementRef::Attribute(id) => self.attributes.get(&id).map(|a| a.subattribute_ids()),
        };
        children.ok_or(DiagramError::NotFound(owner))
    }

    /// Attributes directly owned by an entity, relationship or composite attribute
    pub fn attributes_of(
        &self,
        owner: impl Into<ElementRef>,
    ) -> Result<impl Iterator<Item = &Attribute> + Clone + '_> {
        let ids = self.child_ids(owner)?;
        Ok(ids.iter().filter_map(move |id| self.attributes.get(id)))
    }

    /// Subattributes of an attribute; empty when the attribute is atomic
    pub fn subattributes_of(
        &self,
        id: AttributeId,
    ) -> Result<impl Iterator<Item = &Attribute> + Clone + '_> {
        self.attributes_of(id)
    }

    /// Ids of the relationships an entity participates in
    pub fn relationship_ids_of(&self, entity: EntityId) -> Result<&[RelationshipId]> {
        if !self.entities.contains_key(&entity) {
            return Err(DiagramError::not_found(entity));
        }
        Ok(self
            .participation
            .get(&entity)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[]))
    }

    /// Relationships an entity participates in, in relationship order
    ///
    /// A recursive relationship is listed once.
    pub fn relationships_of(
        &self,
        entity: EntityId,
    ) -> Result<impl Iterator<Item = &Relationship> + Clone + '_> {
        let ids = self.relationship_ids_of(entity)?;
        Ok(ids.iter().filter_map(move |id| self.relationships.get(id)))
    }

    /// The entity or relationship at the top of an attribute's owner chain
    pub fn root_owner(&self, id: AttributeId) -> Result<ElementRef> {
        let mut current = self
            .attributes
            .get(&id)
            .ok_or(DiagramError::not_found(id))?;
        // Bounded so a corrupted chain cannot spin forever
        for _ in 0..=self.attributes.len() {
            match current.connected_to {
                ElementRef::Attribute(parent) => {
                    current = self
                        .attributes
                        .get(&parent)
                        .ok_or(DiagramError::not_found(parent))?;
                }
                owner => return Ok(owner),
            }
        }
        Err(DiagramError::integrity(format!(
            "owner chain of {} does not terminate",
            id
        )))
    }

    /// Whether `ancestor` appears in the owner chain above `id`
    pub fn is_ancestor(&self, ancestor: AttributeId, id: AttributeId) -> bool {
        let mut current = self.attributes.get(&id).map(|a| a.connected_to);
        let mut steps = 0;
        while let Some(ElementRef::Attribute(parent)) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.attributes.len() {
                return false;
            }
            current = self.attributes.get(&parent).map(|a| a.connected_to);
        }
        false
    }

    /// All attributes below `id`, depth-first, excluding `id` itself
    pub fn descendants(&self, id: AttributeId) -> Result<Vec<AttributeId>> {
        let root = self
            .attributes
            .get(&id)
            .ok_or(DiagramError::not_found(id))?;
        let mut ordered = Vec::new();
        let mut stack: Vec<AttributeId> = root.subattribute_ids().iter().rev().copied().collect();
        while let Some(child) = stack.pop() {
            ordered.push(child);
            if let Some(attribute) = self.attributes.get(&child) {
                stack.extend(attribute.subattribute_ids().iter().rev());
            }
        }
        Ok(ordered)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Rename any element
    pub fn rename(
        &mut self,
        element: impl Into<ElementRef>,
        name: impl Into<String>,
    ) -> Result<()> {
        let element = element.into();
        let name = name.into();
        trace!(element = %element, new_name = %name, "Renaming element");
        let slot = match element {
            ElementRef::Entity(id) => self.entities.get_mut(&id).map(|e| &mut e.name),
            ElementRef::Relationship(id) => self.relationships.get_mut(&id).map(|r| &mut r.name),
            ElementRef::Attribute(id) => self.attributes.get_mut(&id).map(|a| &mut a.name),
        };
        *slot.ok_or(DiagramError::NotFound(element))? = name;
        Ok(())
    }

    pub fn set_entity_position(
        &mut self,
        id: EntityId,
        position: impl Into<Position>,
    ) -> Result<()> {
        let position = position.into();
        let entity = self.entity_mut(id)?;
        check_position(id.into(), position)?;
        entity.position = position;
        trace!(entity_id = %id, x = entity.position.x, y = entity.position.y, "Entity moved");
        Ok(())
    }

    pub fn set_attribute_position(
        &mut self,
        id: AttributeId,
        position: impl Into<Position>,
    ) -> Result<()> {
        let position = position.into();
        let attribute = self.attribute_mut(id)?;
        check_position(id.into(), position)?;
        attribute.position = position;
        trace!(
            attribute_id = %id,
            x = attribute.position.x,
            y = attribute.position.y,
            "Attribute moved"
        );
        Ok(())
    }

    /// Set or clear the diamond offsets; `None` restores the default on that axis
    pub fn set_diamond_offset(
        &mut self,
        id: RelationshipId,
        offset_x: Option<f64>,
        offset_y: Option<f64>,
    ) -> Result<()> {
        let relationship = self.relationship_mut(id)?;
        check_diamond_offset(id, offset_x, offset_y)?;
        relationship.diamond_offset_x = offset_x;
        relationship.diamond_offset_y = offset_y;
        trace!(relationship_id = %id, ?offset_x, ?offset_y, "Diamond moved");
        Ok(())
    }

    pub fn set_weak(&mut self, id: EntityId, is_weak: bool) -> Result<()> {
        self.entity_mut(id)?.is_weak = is_weak;
        trace!(entity_id = %id, is_weak, "Entity weak flag set");
        Ok(())
    }

    pub fn set_attribute_flag(
        &mut self,
        id: AttributeId,
        flag: AttributeFlag,
        value: bool,
    ) -> Result<()> {
        self.attribute_mut(id)?.set_flag(flag, value);
        trace!(attribute_id = %id, %flag, value, "Attribute flag set");
        Ok(())
    }

    pub fn set_relationship_type(
        &mut self,
        id: RelationshipId,
        relationship_type: Cardinality,
    ) -> Result<()> {
        self.relationship_mut(id)?.relationship_type = relationship_type;
        trace!(relationship_id = %id, %relationship_type, "Cardinality set");
        Ok(())
    }

    /// Set cardinality from its literal form (`1-1`, `1-N`, `N-1`, `N-N`)
    pub fn set_relationship_type_literal(
        &mut self,
        id: RelationshipId,
        literal: &str,
    ) -> Result<()> {
        let relationship_type: Cardinality = literal.parse()?;
        self.set_relationship_type(id, relationship_type)
    }

    pub fn set_participation(
        &mut self,
        id: RelationshipId,
        from_entity: Participation,
        to_entity: Participation,
    ) -> Result<()> {
        let relationship = self.relationship_mut(id)?;
        relationship.from_entity = from_entity;
        relationship.to_entity = to_entity;
        trace!(relationship_id = %id, %from_entity, %to_entity, "Participation set");
        Ok(())
    }

    /// Set both participations from their literal forms (`can`, `must`)
    ///
    /// Both literals are checked before anything changes.
    pub fn set_participation_literals(
        &mut self,
        id: RelationshipId,
        from_entity: &str,
        to_entity: &str,
    ) -> Result<()> {
        let from_entity: Participation = from_entity.parse()?;
        let to_entity: Participation = to_entity.parse()?;
        self.set_participation(id, from_entity, to_entity)
    }

    /// Point a relationship at a new entity pair, updating back-references
    pub fn reconnect_relationship(
        &mut self,
        id: RelationshipId,
        entities: [EntityId; 2],
    ) -> Result<()> {
        let old = self
            .relationships
            .get(&id)
            .ok_or(DiagramError::not_found(id))?
            .entities;
        self.require_entities(entities)?;
        if old == entities {
            return Ok(());
        }

        trace!(
            relationship_id = %id,
            from = %entities[0],
            to = %entities[1],
            "Reconnecting relationship"
        );
        self.unindex_relationship(id, old);
        self.relationship_mut(id)?.entities = entities;

        let order: HashMap<RelationshipId, usize> = self
            .relationship_order
            .iter()
            .enumerate()
            .map(|(position, rid)| (*rid, position))
            .collect();
        for entity in entities {
            let touching = self.participation.entry(entity).or_default();
            if !touching.contains(&id) {
                touching.push(id);
                touching.sort_by_key(|rid| order.get(rid).copied().unwrap_or(usize::MAX));
            }
        }
        Ok(())
    }

    /// Swap the entity pair, reading cardinality and participation from the other end
    ///
    /// The relationship means the same thing afterwards.
    pub fn reverse_relationship(&mut self, id: RelationshipId) -> Result<()> {
        let relationship = self.relationship_mut(id)?;
        relationship.entities.swap(0, 1);
        relationship.relationship_type = relationship.relationship_type.reversed();
        std::mem::swap(&mut relationship.from_entity, &mut relationship.to_entity);
        trace!(relationship_id = %id, "Relationship reversed");
        Ok(())
    }

    /// Move an attribute under a new owner
    ///
    /// The owner must exist and must not be the attribute itself or one of
    /// its descendants. Nothing changes when validation fails. The attribute
    /// keeps its subattributes and is appended to the new owner's list.
    pub fn attach_attribute(
        &mut self,
        id: AttributeId,
        owner: impl Into<ElementRef>,
    ) -> Result<()> {
        let owner = owner.into();
        let previous = self
            .attributes
            .get(&id)
            .ok_or(DiagramError::not_found(id))?
            .connected_to;
        self.validate_owner(owner, id)?;
        if previous == owner {
            return Ok(());
        }

        trace!(attribute_id = %id, from = %previous, to = %owner, "Attaching attribute");
        self.remove_child(previous, id);
        self.push_child(owner, id);
        self.attribute_mut(id)?.connected_to = owner;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Delete any element with its cascade
    pub fn delete(&mut self, element: impl Into<ElementRef>) -> Result<Deletion> {
        match element.into() {
            ElementRef::Entity(id) => self.delete_entity(id),
            ElementRef::Relationship(id) => self.delete_relationship(id),
            ElementRef::Attribute(id) => self.delete_attribute(id),
        }
    }

    /// Delete an entity, its attributes, and every relationship touching it
    pub fn delete_entity(&mut self, id: EntityId) -> Result<Deletion> {
        if !self.entities.contains_key(&id) {
            return Err(DiagramError::not_found(id));
        }
        let mut deletion = Deletion::default();

        let touching = self.participation.remove(&id).unwrap_or_default();
        for relationship in touching {
            self.remove_relationship(relationship, &mut deletion);
        }

        if let Some(entity) = self.entities.remove(&id) {
            self.entity_order.retain(|e| *e != id);
            for attribute in entity.attributes {
                self.remove_attribute_tree(attribute, &mut deletion);
            }
            deletion.entities.push(id);
        }

        debug!(
            entity_id = %id,
            relationships = deletion.relationships.len(),
            attributes = deletion.attributes.len(),
            "Entity deleted"
        );
        Ok(deletion)
    }

    /// Delete a relationship and its attributes
    pub fn delete_relationship(&mut self, id: RelationshipId) -> Result<Deletion> {
        let mut deletion = Deletion::default();
        if !self.remove_relationship(id, &mut deletion) {
            return Err(DiagramError::not_found(id));
        }
        debug!(
            relationship_id = %id,
            attributes = deletion.attributes.len(),
            "Relationship deleted"
        );
        Ok(deletion)
    }

    /// Delete an attribute and its subattributes
    ///
    /// A composite parent left without children becomes atomic.
    pub fn delete_attribute(&mut self, id: AttributeId) -> Result<Deletion> {
        let owner = self
            .attributes
            .get(&id)
            .ok_or(DiagramError::not_found(id))?
            .connected_to;
        self.remove_child(owner, id);

        let mut deletion = Deletion::default();
        self.remove_attribute_tree(id, &mut deletion);
        debug!(attribute_id = %id, removed = deletion.attributes.len(), "Attribute deleted");
        Ok(deletion)
    }

    fn remove_relationship(&mut self, id: RelationshipId, deletion: &mut Deletion) -> bool {
        let Some(relationship) = self.relationships.remove(&id) else {
            return false;
        };
        self.relationship_order.retain(|r| *r != id);
        self.unindex_relationship(id, relationship.entities);
        deletion.relationships.push(id);
        for attribute in relationship.attributes {
            self.remove_attribute_tree(attribute, deletion);
        }
        true
    }

    fn remove_attribute_tree(&mut self, root: AttributeId, deletion: &mut Deletion) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(attribute) = self.attributes.remove(&id) {
                trace!(attribute_id = %id, "Removing attribute");
                deletion.attributes.push(id);
                if let Some(children) = attribute.subattributes {
                    stack.extend(children.into_iter().rev());
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------

    /// Re-verify every structural invariant, reporting the first violation
    pub fn check_integrity(&self) -> Result<()> {
        if self.entity_order.len() != self.entities.len()
            || self.entity_order.iter().any(|id| !self.entities.contains_key(id))
        {
            return Err(DiagramError::integrity("entity order out of sync"));
        }
        if self.relationship_order.len() != self.relationships.len()
            || self
                .relationship_order
                .iter()
                .any(|id| !self.relationships.contains_key(id))
        {
            return Err(DiagramError::integrity("relationship order out of sync"));
        }

        for relationship in self.relationships() {
            for entity in relationship.entities {
                if !self.entities.contains_key(&entity) {
                    return Err(DiagramError::integrity(format!(
                        "{} references missing {}",
                        relationship.id, entity
                    )));
                }
            }
        }

        // Every attribute is listed exactly once, by the owner it names
        let mut seen: HashSet<AttributeId> = HashSet::new();
        let owners = self
            .entities()
            .map(|e| (ElementRef::Entity(e.id), e.attributes.as_slice()))
            .chain(
                self.relationships()
                    .map(|r| (ElementRef::Relationship(r.id), r.attributes.as_slice())),
            )
            .chain(
                self.attributes
                    .values()
                    .map(|a| (ElementRef::Attribute(a.id), a.subattribute_ids())),
            );
        for (owner, children) in owners {
            for child in children {
                let attribute = self.attributes.get(child).ok_or_else(|| {
                    DiagramError::integrity(format!("{} lists missing {}", owner, child))
                })?;
                if attribute.connected_to != owner {
                    return Err(DiagramError::integrity(format!(
                        "{} is listed by {} but connected to {}",
                        child, owner, attribute.connected_to
                    )));
                }
                if !seen.insert(*child) {
                    return Err(DiagramError::integrity(format!(
                        "{} is listed more than once",
                        child
                    )));
                }
            }
        }
        if seen.len() != self.attributes.len() {
            return Err(DiagramError::integrity(format!(
                "{} attributes are not listed by any owner",
                self.attributes.len() - seen.len()
            )));
        }

        for attribute in self.attributes.values() {
            if attribute.subattributes.as_ref().is_some_and(|s| s.is_empty()) {
                return Err(DiagramError::integrity(format!(
                    "{} has an empty subattribute list",
                    attribute.id
                )));
            }
            // Fails on cycles and dangling owners
            self.root_owner(attribute.id)?;
        }

        for entity in self.entities() {
            let mut expected: Vec<RelationshipId> = self
                .relationships()
                .filter(|r| r.involves(entity.id))
                .map(|r| r.id)
                .collect();
            let mut actual = self
                .participation
                .get(&entity.id)
                .cloned()
                .unwrap_or_default();
            expected.sort();
            actual.sort();
            if expected != actual {
                return Err(DiagramError::integrity(format!(
                    "participation index of {} is stale",
                    entity.id
                )));
            }
        }
        Ok(())
    }

    /// Remove everything and reset id counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.entities
            .get_mut(&id)
            .ok_or(DiagramError::not_found(id))
    }

    fn relationship_mut(&mut self, id: RelationshipId) -> Result<&mut Relationship> {
        self.relationships
            .get_mut(&id)
            .ok_or(DiagramError::not_found(id))
    }

    fn attribute_mut(&mut self, id: AttributeId) -> Result<&mut Attribute> {
        self.attributes
            .get_mut(&id)
            .ok_or(DiagramError::not_found(id))
    }

    fn require_entities(&self, entities: [EntityId; 2]) -> Result<()> {
        for entity in entities {
            if !self.entities.contains_key(&entity) {
                return Err(DiagramError::not_found(entity));
            }
        }
        Ok(())
    }

    /// Check that `owner` may own `subject`: it exists and is not below it
    fn validate_owner(&self, owner: ElementRef, subject: AttributeId) -> Result<()> {
        if !self.contains(owner) {
            return Err(DiagramError::invalid_owner(owner, "owner does not exist"));
        }
        if let ElementRef::Attribute(parent) = owner {
            if parent == subject {
                return Err(DiagramError::invalid_owner(
                    owner,
                    "an attribute cannot own itself",
                ));
            }
            if self.is_ancestor(subject, parent) {
                return Err(DiagramError::invalid_owner(
                    owner,
                    format!("would make {} its own ancestor", subject),
                ));
            }
        }
        Ok(())
    }

    fn push_child(&mut self, owner: ElementRef, child: AttributeId) {
        match owner {
            ElementRef::Entity(id) => {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.attributes.push(child);
                }
            }
            ElementRef::Relationship(id) => {
                if let Some(relationship) = self.relationships.get_mut(&id) {
                    relationship.attributes.push(child);
                }
            }
            ElementRef::Attribute(id) => {
                if let Some(parent) = self.attributes.get_mut(&id) {
                    parent.subattributes.get_or_insert_with(Vec::new).push(child);
                }
            }
        }
    }

    fn remove_child(&mut self, owner: ElementRef, child: AttributeId) {
        match owner {
            ElementRef::Entity(id) => {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.attributes.retain(|a| *a != child);
                }
            }
            ElementRef::Relationship(id) => {
                if let Some(relationship) = self.relationships.get_mut(&id) {
                    relationship.attributes.retain(|a| *a != child);
                }
            }
            ElementRef::Attribute(id) => {
                if let Some(parent) = self.attributes.get_mut(&id) {
                    if let Some(children) = parent.subattributes.as_mut() {
                        children.retain(|a| *a != child);
                        if children.is_empty() {
                            trace!(attribute_id = %id, "Attribute became atomic");
                            parent.subattributes = None;
                        }
                    }
                }
            }
        }
    }

    fn unindex_relationship(&mut self, id: RelationshipId, entities: [EntityId; 2]) {
        for entity in entities {
            if let Some(touching) = self.participation.get_mut(&entity) {
                touching.retain(|r| *r != id);
                if touching.is_empty() {
                    self.participation.remove(&entity);
                }
            }
        }
    }
}

fn next_id(last: u32, kind: ElementKind) -> Result<u32> {
    last.checked_add(1)
        .ok_or_else(|| DiagramError::integrity(format!("{} ids exhausted", kind)))
}

fn check_position(element: ElementRef, position: Position) -> Result<()> {
    if position.x.is_finite() && position.y.is_finite() {
        Ok(())
    } else {
        Err(DiagramError::InvalidPosition {
            element,
            x: position.x,
            y: position.y,
        })
    }
}

fn check_diamond_offset(
    id: RelationshipId,
    offset_x: Option<f64>,
    offset_y: Option<f64>,
) -> Result<()> {
    check_position(
        id.into(),
        Position::new(offset_x.unwrap_or_default(), offset_y.unwrap_or_default()),
    )
}

impl Database for ErDatabase {
    type Node = Entity;
    type Edge = Relationship;
    type NodeId = EntityId;
    type EdgeId = RelationshipId;

    fn add_node(&mut self, node: Entity) -> AnyResult<EntityId> {
        Ok(self.insert_entity(node)?)
    }

    fn add_edge(&mut self, edge: Relationship) -> AnyResult<RelationshipId> {
        Ok(self.insert_relationship(edge)?)
    }

    fn get_node(&self, id: EntityId) -> Option<&Entity> {
        self.get_entity(id)
    }

    fn get_edge(&self, id: RelationshipId) -> Option<&Relationship> {
        self.get_relationship(id)
    }

    fn nodes(&self) -> impl Iterator<Item = &Entity> {
        self.entities()
    }

    fn edges(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships()
    }

    fn clear(&mut self) {
        ErDatabase::clear(self);
    }

    fn node_count(&self) -> usize {
        self.entity_count()
    }

    fn edge_count(&self) -> usize {
        self.relationship_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Student(1) --Enrolls(N-N)-- Course(2), with `grade` on Enrolls
    fn enrollment() -> ErDatabase {
        let mut db = ErDatabase::new();
        db.insert_entity(Entity::new(EntityId(1), "Student")).unwrap();
        db.insert_entity(Entity::new(EntityId(2), "Course")).unwrap();
        db.insert_relationship(Relationship::new(
            RelationshipId(1),
            "Enrolls",
            [EntityId(1), EntityId(2)],
            Cardinality::ManyToMany,
        ))
        .unwrap();
        db.insert_attribute(Attribute::new(
            AttributeId(1),
            "grade",
            RelationshipId(1),
        ))
        .unwrap();
        db
    }

    #[test]
    fn test_enrollment_scenario() {
        let db = enrollment();

        let enrolls = db.get_relationship(RelationshipId(1)).unwrap();
        assert_eq!(enrolls.from_entity, Participation::Can);
        assert_eq!(enrolls.to_entity, Participation::Can);
        assert_eq!(enrolls.attribute_ids(), &[AttributeId(1)]);

        let names: Vec<_> = db
            .attributes_of(RelationshipId(1))
            .unwrap()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["grade"]);

        for entity in [EntityId(1), EntityId(2)] {
            let touching: Vec<_> = db.relationships_of(entity).unwrap().map(|r| r.id).collect();
            assert_eq!(touching, vec![RelationshipId(1)]);
        }
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_ids_are_assigned_per_kind() {
        let mut db = ErDatabase::new();
        let student = db.create_entity("Student").unwrap();
        let name = db.create_attribute(student, "name").unwrap();
        assert_eq!(student, EntityId(1));
        assert_eq!(name, AttributeId(1));

        db.insert_entity(Entity::new(EntityId(10), "Late")).unwrap();
        assert_eq!(db.next_entity_id().unwrap(), EntityId(11));
    }

    #[test]
    fn test_id_space_exhaustion_is_an_error() {
        let mut db = ErDatabase::new();
        let max = db.insert_entity(Entity::new(EntityId(u32::MAX), "Max")).unwrap();
        db.insert_attribute(Attribute::new(AttributeId(u32::MAX), "tag", max))
            .unwrap();
        db.insert_relationship(Relationship::new(
            RelationshipId(u32::MAX),
            "Self",
            [max, max],
            Cardinality::OneToOne,
        ))
        .unwrap();
        let before = db.to_document();

        assert!(matches!(
            db.create_entity("Next"),
            Err(DiagramError::Integrity { .. })
        ));
        assert!(db.create_attribute(max, "more").is_err());
        assert!(db
            .create_relationship("Again", [max, max], Cardinality::OneToOne)
            .is_err());
        assert_eq!(db.to_document(), before);
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_non_finite_positions_rejected() {
        let mut db = ErDatabase::new();
        let e = db.create_entity("E").unwrap();
        let a = db.create_attribute(e, "a").unwrap();
        let r = db
            .create_relationship("R", [e, e], Cardinality::OneToOne)
            .unwrap();
        db.set_entity_position(e, (3.0, 4.0)).unwrap();

        let moved = db.set_entity_position(e, (f64::INFINITY, 0.0));
        assert!(matches!(moved, Err(DiagramError::InvalidPosition { .. })));
        assert_eq!(db.get_entity(e).unwrap().position, Position::new(3.0, 4.0));

        assert!(db.set_attribute_position(a, (0.0, f64::NAN)).is_err());
        assert!(db
            .set_diamond_offset(r, Some(f64::NEG_INFINITY), None)
            .is_err());
        assert_eq!(db.get_relationship(r).unwrap().diamond_offset_x, None);

        let inserted = db.insert_entity(Entity::new(EntityId(5), "Far").at(f64::NAN, 0.0));
        assert!(inserted.is_err());
        assert!(!db.contains(EntityId(5)));
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let mut db = ErDatabase::new();
        let first = db.create_entity("A").unwrap();
        db.delete_entity(first).unwrap();
        let second = db.create_entity("B").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut db = enrollment();
        let err = db
            .insert_entity(Entity::new(EntityId(1), "Again"))
            .unwrap_err();
        assert!(matches!(err, DiagramError::DuplicateId(ElementRef::Entity(EntityId(1)))));

        let err = db
            .insert_attribute(Attribute::new(AttributeId(1), "dup", EntityId(1)))
            .unwrap_err();
        assert!(matches!(err, DiagramError::DuplicateId(_)));
        assert_eq!(db.attribute_count(), 1);
    }

    #[test]
    fn test_relationship_requires_entities() {
        let mut db = ErDatabase::new();
        let a = db.create_entity("A").unwrap();
        let err = db
            .create_relationship("R", [a, EntityId(99)], Cardinality::OneToOne)
            .unwrap_err();
        assert!(matches!(err, DiagramError::NotFound(ElementRef::Entity(EntityId(99)))));
        assert_eq!(db.relationship_count(), 0);
        assert!(db.relationship_ids_of(a).unwrap().is_empty());
    }

    #[test]
    fn test_attribute_requires_owner() {
        let mut db = ErDatabase::new();
        let err = db.create_attribute(EntityId(5), "orphan").unwrap_err();
        assert!(matches!(err, DiagramError::InvalidOwner { .. }));
        assert_eq!(db.attribute_count(), 0);
    }

    #[test]
    fn test_composite_attribute_delete_cascades() {
        let mut db = ErDatabase::new();
        let person = db.create_entity("Person").unwrap();
        db.insert_attribute(Attribute::new(AttributeId(1), "Name", person))
            .unwrap();
        db.insert_attribute(Attribute::new(AttributeId(2), "First", AttributeId(1)))
            .unwrap();
        db.insert_attribute(Attribute::new(AttributeId(3), "Last", AttributeId(1)))
            .unwrap();

        let name = db.get_attribute(AttributeId(1)).unwrap();
        assert_eq!(name.subattributes(), Some(&[AttributeId(2), AttributeId(3)][..]));

        let deletion = db.delete_attribute(AttributeId(1)).unwrap();
        assert_eq!(
            deletion.attributes,
            vec![AttributeId(1), AttributeId(2), AttributeId(3)]
        );
        assert_eq!(db.attribute_count(), 0);
        assert!(db.get_entity(person).unwrap().attribute_ids().is_empty());
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_last_subattribute_leaving_makes_parent_atomic() {
        let mut db = ErDatabase::new();
        let person = db.create_entity("Person").unwrap();
        let address = db.create_attribute(person, "Address").unwrap();
        let street = db.create_attribute(address, "Street").unwrap();
        assert!(db.get_attribute(address).unwrap().is_composite());

        db.delete_attribute(street).unwrap();
        let address = db.get_attribute(address).unwrap();
        assert!(!address.is_composite());
        assert_eq!(address.subattributes(), None);
    }

    #[test]
    fn test_delete_entity_cascades_to_relationships() {
        let mut db = enrollment();
        let deletion = db.delete_entity(EntityId(1)).unwrap();

        assert_eq!(deletion.entities, vec![EntityId(1)]);
        assert_eq!(deletion.relationships, vec![RelationshipId(1)]);
        assert_eq!(deletion.attributes, vec![AttributeId(1)]);
        assert!(db.get_relationship(RelationshipId(1)).is_none());
        assert_eq!(db.relationships_of(EntityId(2)).unwrap().count(), 0);
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_delete_missing_element() {
        let mut db = ErDatabase::new();
        assert!(matches!(
            db.delete(AttributeId(4)),
            Err(DiagramError::NotFound(ElementRef::Attribute(AttributeId(4))))
        ));
    }

    #[test]
    fn test_attach_moves_between_owners() {
        let mut db = enrollment();
        db.attach_attribute(AttributeId(1), EntityId(1)).unwrap();

        assert!(db.get_relationship(RelationshipId(1)).unwrap().attribute_ids().is_empty());
        assert_eq!(db.get_entity(EntityId(1)).unwrap().attribute_ids(), &[AttributeId(1)]);
        assert_eq!(
            db.get_attribute(AttributeId(1)).unwrap().connected_to,
            ElementRef::Entity(EntityId(1))
        );
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut db = ErDatabase::new();
        let person = db.create_entity("Person").unwrap();
        let name = db.create_attribute(person, "Name").unwrap();
        let first = db.create_attribute(name, "First").unwrap();
        let initial = db.create_attribute(first, "Initial").unwrap();

        for owner in [name, initial] {
            let err = db.attach_attribute(name, owner).unwrap_err();
            assert!(matches!(err, DiagramError::InvalidOwner { .. }), "{err}");
        }
        assert!(matches!(
            db.attach_attribute(name, RelationshipId(3)),
            Err(DiagramError::InvalidOwner { .. })
        ));
        // untouched
        assert_eq!(db.get_attribute(name).unwrap().connected_to, ElementRef::Entity(person));
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_root_owner_and_descendants() {
        let mut db = ErDatabase::new();
        let person = db.create_entity("Person").unwrap();
        let name = db.create_attribute(person, "Name").unwrap();
        let first = db.create_attribute(name, "First").unwrap();
        let last = db.create_attribute(name, "Last").unwrap();

        assert_eq!(db.root_owner(first).unwrap(), ElementRef::Entity(person));
        assert_eq!(db.descendants(name).unwrap(), vec![first, last]);
        assert!(db.is_ancestor(name, last));
        assert!(!db.is_ancestor(last, name));
    }

    #[test]
    fn test_reconnect_updates_index() {
        let mut db = enrollment();
        let lecturer = db.create_entity("Lecturer").unwrap();
        db.reconnect_relationship(RelationshipId(1), [lecturer, EntityId(2)])
            .unwrap();

        assert_eq!(db.relationships_of(EntityId(1)).unwrap().count(), 0);
        assert_eq!(db.relationship_ids_of(lecturer).unwrap(), &[RelationshipId(1)]);
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_reverse_relationship_preserves_meaning() {
        let mut db = ErDatabase::new();
        let a = db.create_entity("Employee").unwrap();
        let b = db.create_entity("Department").unwrap();
        let r = db
            .create_relationship("WorksIn", [a, b], Cardinality::ManyToOne)
            .unwrap();
        db.set_participation(r, Participation::Must, Participation::Can)
            .unwrap();

        db.reverse_relationship(r).unwrap();
        let works_in = db.get_relationship(r).unwrap();
        assert_eq!(works_in.entities, [b, a]);
        assert_eq!(works_in.relationship_type, Cardinality::OneToMany);
        assert_eq!(works_in.participation_of(a), Some(Participation::Must));
        assert_eq!(works_in.participation_of(b), Some(Participation::Can));
    }

    #[test]
    fn test_literal_setters_validate_before_mutation() {
        let mut db = enrollment();
        let r = RelationshipId(1);

        assert!(matches!(
            db.set_relationship_type_literal(r, "N-M"),
            Err(DiagramError::InvalidCardinality(_))
        ));
        assert!(matches!(
            db.set_participation_literals(r, "must", "maybe"),
            Err(DiagramError::InvalidParticipation(_))
        ));
        let enrolls = db.get_relationship(r).unwrap();
        assert_eq!(enrolls.relationship_type, Cardinality::ManyToMany);
        assert_eq!(enrolls.from_entity, Participation::Can);

        db.set_relationship_type_literal(r, "1-N").unwrap();
        db.set_participation_literals(r, "must", "can").unwrap();
        let enrolls = db.get_relationship(r).unwrap();
        assert_eq!(enrolls.relationship_type, Cardinality::OneToMany);
        assert_eq!(enrolls.from_entity, Participation::Must);
    }

    #[test]
    fn test_recursive_relationship_indexed_once() {
        let mut db = ErDatabase::new();
        let employee = db.create_entity("Employee").unwrap();
        let manages = db
            .create_relationship("Manages", [employee, employee], Cardinality::OneToMany)
            .unwrap();
        assert_eq!(db.relationship_ids_of(employee).unwrap(), &[manages]);

        let deletion = db.delete_entity(employee).unwrap();
        assert_eq!(deletion.relationships, vec![manages]);
        assert!(db.is_empty());
    }

    #[test]
    fn test_insert_drops_foreign_child_ids() {
        let source = enrollment();
        let relationship = source.get_relationship(RelationshipId(1)).unwrap().clone();

        let mut db = ErDatabase::new();
        db.insert_entity(Entity::new(EntityId(1), "Student")).unwrap();
        db.insert_entity(Entity::new(EntityId(2), "Course")).unwrap();
        db.insert_relationship(relationship).unwrap();
        assert!(db.get_relationship(RelationshipId(1)).unwrap().attribute_ids().is_empty());
        db.check_integrity().unwrap();
    }

    #[test]
    fn test_database_trait() {
        let mut db = ErDatabase::new();
        let a = db.add_node(Entity::new(EntityId(1), "A")).unwrap();
        let b = db.add_node(Entity::new(EntityId(2), "B")).unwrap();
        db.add_edge(Relationship::new(
            RelationshipId(1),
            "links",
            [a, b],
            Cardinality::OneToOne,
        ))
        .unwrap();

        assert_eq!(db.node_count(), 2);
        assert_eq!(db.edge_count(), 1);
        assert_eq!(db.get_node(b).unwrap().name, "B");
        assert!(db.add_node(Entity::new(EntityId(1), "A")).is_err());

        Database::clear(&mut db);
        assert_eq!(db.nodes().count(), 0);
        assert_eq!(db.next_entity_id().unwrap(), EntityId(1));
    }
}
