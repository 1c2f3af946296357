//! Core abstractions shared by the ER model
//!
//! Typed identifiers and literals, the error taxonomy, the node/edge
//! database trait, and logging setup.

mod database;
mod error;
pub mod logging;
mod types;

pub use database::*;
pub use error::*;
pub use logging::*;
pub use types::*;
