//! Canonical graph model for the agent workflow playground.
//!
//! Core structures:
//! - [`GraphStore`]: single source of truth for nodes, edges, selection and
//!   the linear undo/redo history
//! - [`Node`] / [`Edge`]: workflow entities with zone and metadata
//! - [`Selection`]: tagged handle to the one selected element, if any
//!
//! Boundary: every mutation goes through a `GraphStore` method so that no
//! edge can reference a missing node at any observable point.

mod store;
mod types;

pub use store::{GraphStore, ReplaceOutcome, MAX_HISTORY};
pub use types::{
    derived_edge_id, Edge, EdgeMetadata, GraphError, Node, NodeKind, NodeMetadata, Selection, Zone,
};
