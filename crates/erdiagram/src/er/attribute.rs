//! Attribute records

use std::fmt;

use crate::core::{AttributeId, ElementRef, Position};

/// One of the boolean markers an attribute carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFlag {
    /// Part of the owning entity's primary key
    Primary,
    /// Holds a set of values per owning instance
    Multivalue,
    /// Derived rather than stored
    Calculated,
}

impl fmt::Display for AttributeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeFlag::Primary => write!(f, "primary"),
            AttributeFlag::Multivalue => write!(f, "multivalue"),
            AttributeFlag::Calculated => write!(f, "calculated"),
        }
    }
}

/// A property attached to an entity, a relationship, or a parent attribute
///
/// `subattributes` is `None` for an atomic attribute. A composite attribute
/// always has at least one child; the store drops the list back to `None`
/// when its last child leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub position: Position,
    /// The single owner of this attribute
    pub connected_to: ElementRef,
    pub is_primary: bool,
    pub is_multivalue: bool,
    pub is_calculated: bool,
    pub(crate) subattributes: Option<Vec<AttributeId>>,
}

impl Attribute {
    pub fn new(
        id: AttributeId,
        name: impl Into<String>,
        owner: impl Into<ElementRef>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            position: Position::default(),
            connected_to: owner.into(),
            is_primary: false,
            is_multivalue: false,
            is_calculated: false,
            subattributes: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn multivalued(mut self) -> Self {
        self.is_multivalue = true;
        self
    }

    pub fn calculated(mut self) -> Self {
        self.is_calculated = true;
        self
    }

    pub fn flag(&self, flag: AttributeFlag) -> bool {
        match flag {
            AttributeFlag::Primary => self.is_primary,
            AttributeFlag::Multivalue => self.is_multivalue,
            AttributeFlag::Calculated => self.is_calculated,
        }
    }

    pub(crate) fn set_flag(&mut self, flag: AttributeFlag, value: bool) {
        match flag {
            AttributeFlag::Primary => self.is_primary = value,
            AttributeFlag::Multivalue => self.is_multivalue = value,
            AttributeFlag::Calculated => self.is_calculated = value,
        }
    }

    /// Whether this attribute is decomposed into subattributes
    pub fn is_composite(&self) -> bool {
        self.subattributes.is_some()
    }

    /// Child ids when composite, `None` when atomic
    pub fn subattributes(&self) -> Option<&[AttributeId]> {
        self.subattributes.as_deref()
    }

    /// Child ids, empty when atomic
    pub fn subattribute_ids(&self) -> &[AttributeId] {
        self.subattributes.as_deref().unwrap_or(&[])
    }
}
