//! Core database trait for diagram data storage
//!
//! This trait defines the node/edge view of a diagram store. For ER diagrams
//! the nodes are entities and the edges are relationships; attributes hang
//! off both and are reached through the store's own queries.

use anyhow::Result;

/// Core trait for diagram databases
///
/// The associated types let each store define its own node and edge records
/// together with the typed identifiers used to look them up.
pub trait Database: Send + Sync {
    /// The node data type for this database
    type Node: Clone + Send + Sync;

    /// The edge data type for this database
    type Edge: Clone + Send + Sync;

    /// Identifier of a node
    type NodeId: Copy;

    /// Identifier of an edge
    type EdgeId: Copy;

    /// Add a node to the database, returning its id
    fn add_node(&mut self, node: Self::Node) -> Result<Self::NodeId>;

    /// Add an edge to the database, returning its id
    fn add_edge(&mut self, edge: Self::Edge) -> Result<Self::EdgeId>;

    /// Get a node by ID
    fn get_node(&self, id: Self::NodeId) -> Option<&Self::Node>;

    /// Get an edge by ID
    fn get_edge(&self, id: Self::EdgeId) -> Option<&Self::Edge>;

    /// Iterate over all nodes
    fn nodes(&self) -> impl Iterator<Item = &Self::Node>;

    /// Iterate over all edges
    fn edges(&self) -> impl Iterator<Item = &Self::Edge>;

    /// Clear all data from the database
    fn clear(&mut self);

    /// Get the number of nodes
    fn node_count(&self) -> usize;

    /// Get the number of edges
    fn edge_count(&self) -> usize;
}
