//! Core error types for diagram editing
//!
//! Every fallible operation on the diagram store reports one of these,
//! and none of them leave the store half-mutated.

use thiserror::Error;

use super::ElementRef;

/// Core error types for diagram editing
#[derive(Error, Debug)]
pub enum DiagramError {
    #[error("Not found: {0}")]
    NotFound(ElementRef),

    #[error("Duplicate id: {0} already exists")]
    DuplicateId(ElementRef),

    #[error("Invalid owner {owner}: {reason}")]
    InvalidOwner { owner: ElementRef, reason: String },

    #[error("Invalid cardinality: {0:?} (expected one of 1-1, 1-N, N-1, N-N)")]
    InvalidCardinality(String),

    #[error("Invalid participation: {0:?} (expected can or must)")]
    InvalidParticipation(String),

    #[error("Invalid position for {element}: ({x}, {y}) is not finite")]
    InvalidPosition { element: ElementRef, x: f64, y: f64 },

    #[error("Integrity error: {message}")]
    Integrity { message: String },

    #[error("Document error: {source}")]
    Document {
        #[from]
        source: serde_json::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl DiagramError {
    /// Create a new invalid owner error
    pub fn invalid_owner(owner: impl Into<ElementRef>, reason: impl Into<String>) -> Self {
        Self::InvalidOwner {
            owner: owner.into(),
            reason: reason.into(),
        }
    }

    /// Create a new not found error
    pub fn not_found(element: impl Into<ElementRef>) -> Self {
        Self::NotFound(element.into())
    }

    /// Create a new integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}
