//! Plain-text outline of a diagram
//!
//! Entities with their attribute trees, then relationships. Element ids go
//! in a right-hand column aligned by display width, so wide names keep the
//! column straight.

use std::fmt::Write as _;

use unicode_width::UnicodeWidthStr;

use super::{Attribute, ErDatabase};
use crate::core::{AttributeId, ElementRef};

struct Row {
    label: String,
    element: Option<ElementRef>,
}

/// Renders an [`ErDatabase`] as an indented tree
#[derive(Debug, Clone)]
pub struct OutlineRenderer {
    indent: usize,
    show_ids: bool,
}

impl Default for OutlineRenderer {
    fn default() -> Self {
        Self {
            indent: 2,
            show_ids: true,
        }
    }
}

impl OutlineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spaces per nesting level
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_ids(mut self, show_ids: bool) -> Self {
        self.show_ids = show_ids;
        self
    }

    pub fn render(&self, db: &ErDatabase) -> String {
        let rows = self.rows(db);
        let width = rows
            .iter()
            .filter(|row| row.element.is_some())
            .map(|row| row.label.width())
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        for row in rows {
            match row.element {
                Some(element) if self.show_ids => {
                    let pad = width - row.label.width();
                    let _ = writeln!(out, "{}{}  {}", row.label, " ".repeat(pad), element);
                }
                _ => {
                    let _ = writeln!(out, "{}", row.label);
                }
            }
        }
        out
    }

    fn rows(&self, db: &ErDatabase) -> Vec<Row> {
        let mut rows = vec![Row {
            label: format!("Entities ({})", db.entity_count()),
            element: None,
        }];

        for entity in db.entities() {
            let mut label = format!("{}{}", self.pad(1), entity.name);
            if entity.is_weak {
                label.push_str(" [weak]");
            }
            rows.push(Row {
                label,
                element: Some(entity.id.into()),
            });
            self.attribute_rows(db, entity.attribute_ids(), 2, &mut rows);
        }

        rows.push(Row {
            label: format!("Relationships ({})", db.relationship_count()),
            element: None,
        });

        for relationship in db.relationships() {
            let side = |id| db.name_of(id).unwrap_or("?");
            rows.push(Row {
                label: format!(
                    "{}{}: {} ({}) {} {} ({})",
                    self.pad(1),
                    relationship.name,
                    side(relationship.from()),
                    relationship.from_entity,
                    relationship.relationship_type,
                    side(relationship.to()),
                    relationship.to_entity,
                ),
                element: Some(relationship.id.into()),
            });
            self.attribute_rows(db, relationship.attribute_ids(), 2, &mut rows);
        }

        rows
    }

    fn attribute_rows(
        &self,
        db: &ErDatabase,
        ids: &[AttributeId],
        depth: usize,
        rows: &mut Vec<Row>,
    ) {
        for attribute in ids.iter().filter_map(|id| db.get_attribute(*id)) {
            rows.push(Row {
                label: format!("{}{}{}", self.pad(depth), attribute.name, markers(attribute)),
                element: Some(attribute.id.into()),
            });
            self.attribute_rows(db, attribute.subattribute_ids(), depth + 1, rows);
        }
    }

    fn pad(&self, depth: usize) -> String {
        " ".repeat(self.indent * depth)
    }
}

fn markers(attribute: &Attribute) -> String {
    let mut out = String::new();
    if attribute.is_primary {
        out.push_str(" [PK]");
    }
    if attribute.is_multivalue {
        out.push_str(" [multi]");
    }
    if attribute.is_calculated {
        out.push_str(" [calc]");
    }
    out
}

/// Outline with default settings
pub fn outline(db: &ErDatabase) -> String {
    OutlineRenderer::new().render(db)
}
