use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{
    derived_edge_id, Edge, EdgeMetadata, GraphError, Node, NodeKind, NodeMetadata, Selection,
};

/// Undo history is capped so long sessions stay bounded; the oldest
/// snapshots are dropped first.
pub const MAX_HISTORY: usize = 128;

/// Result of a wholesale [`GraphStore::replace_graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub applied_edges: usize,
    /// Edges dropped because an endpoint was missing from the supplied
    /// node set, or because their id collided with an earlier edge.
    pub dropped_edges: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// Single source of truth for the current workflow graph.
///
/// Every committed mutation appends an immutable snapshot to a linear
/// history; `undo`/`redo` move a cursor over it. Selection is not part of
/// history (selecting is not an undoable graph mutation).
#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    selection: Option<Selection>,
    history: Vec<Snapshot>,
    cursor: usize,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            selection: None,
            history: vec![Snapshot {
                nodes: Vec::new(),
                edges: Vec::new(),
            }],
            cursor: 0,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Number of committed history entries, including the initial empty
    /// snapshot.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    /// Create a node with a fresh id and the default zone for its kind.
    /// Always succeeds.
    pub fn add_node(&mut self, kind: NodeKind, label: impl Into<String>) -> &Node {
        let node = Node {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            zone: kind.default_zone(),
            metadata: NodeMetadata::default(),
        };
        debug!(id = %node.id, %kind, "add node");
        self.nodes.push(node);
        self.commit();
        &self.nodes[self.nodes.len() - 1]
    }

    /// Remove a node and every edge incident to it as one history entry.
    pub fn delete_node(&mut self, id: &str) -> Result<(), GraphError> {
        let Some(pos) = self.nodes.iter().position(|n| n.id == id) else {
            return Err(GraphError::NotFound { id: id.to_string() });
        };
        self.nodes.remove(pos);
        let pruned: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.source == id || e.target == id)
            .map(|e| e.id.clone())
            .collect();
        self.edges.retain(|e| e.source != id && e.target != id);
        debug!(%id, pruned = pruned.len(), "delete node");

        match &self.selection {
            Some(Selection::Node(sel)) if sel == id => self.selection = None,
            Some(Selection::Edge(sel)) if pruned.iter().any(|p| p == sel) => {
                self.selection = None;
            }
            _ => {}
        }
        self.commit();
        Ok(())
    }

    /// Connect two existing nodes. The edge id is derived from the
    /// endpoints; a second edge between the same pair is rejected.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        label: Option<&str>,
    ) -> Result<&Edge, GraphError> {
        let id = derived_edge_id(source, target);
        for endpoint in [source, target] {
            if self.node(endpoint).is_none() {
                return Err(GraphError::InvalidReference {
                    edge: id,
                    endpoint: endpoint.to_string(),
                });
            }
        }
        if self.edge(&id).is_some() {
            return Err(GraphError::DuplicateEdge { id });
        }
        let label = label.unwrap_or("uses").to_string();
        let edge = Edge {
            id,
            source: source.to_string(),
            target: target.to_string(),
            metadata: EdgeMetadata {
                explanation: label.clone(),
                principle_reference: None,
            },
            label,
        };
        debug!(id = %edge.id, "add edge");
        self.edges.push(edge);
        self.commit();
        Ok(&self.edges[self.edges.len() - 1])
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<(), GraphError> {
        let Some(pos) = self.edges.iter().position(|e| e.id == id) else {
            return Err(GraphError::NotFound { id: id.to_string() });
        };
        self.edges.remove(pos);
        debug!(%id, "delete edge");
        if matches!(&self.selection, Some(Selection::Edge(sel)) if sel == id) {
            self.selection = None;
        }
        self.commit();
        Ok(())
    }

    /// Wholesale replacement used by generation results, NL-edit results,
    /// push updates and reset.
    ///
    /// Edges whose endpoints are missing from the supplied node set are
    /// dropped (the rest is applied); the same goes for a later edge whose
    /// id collides with an earlier one. Selection is cleared; the swap is
    /// one history entry.
    pub fn replace_graph(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> ReplaceOutcome {
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let mut kept: Vec<Edge> = Vec::with_capacity(edges.len());
        let mut seen: HashSet<String> = HashSet::with_capacity(edges.len());
        let mut dropped = 0usize;
        for edge in edges {
            if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
                warn!(id = %edge.id, "dropping edge with missing endpoint");
                dropped += 1;
                continue;
            }
            if !seen.insert(edge.id.clone()) {
                warn!(id = %edge.id, "dropping edge with colliding id");
                dropped += 1;
                continue;
            }
            kept.push(edge);
        }
        let outcome = ReplaceOutcome {
            applied_edges: kept.len(),
            dropped_edges: dropped,
        };
        debug!(
            nodes = nodes.len(),
            edges = outcome.applied_edges,
            dropped = outcome.dropped_edges,
            "replace graph"
        );
        self.nodes = nodes;
        self.edges = kept;
        self.selection = None;
        self.commit();
        outcome
    }

    /// Set the current selection. Not a history entry; selecting an id
    /// that is not in the store is ignored.
    pub fn select(&mut self, selection: Option<Selection>) {
        match selection {
            None => self.selection = None,
            Some(Selection::Node(id)) if self.node(&id).is_some() => {
                self.selection = Some(Selection::Node(id));
            }
            Some(Selection::Edge(id)) if self.edge(&id).is_some() => {
                self.selection = Some(Selection::Edge(id));
            }
            Some(sel) => {
                warn!(id = sel.id(), "ignoring selection of missing element");
            }
        }
    }

    /// Move to the previous history snapshot. Returns false at the
    /// beginning of history.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        self.restore_cursor();
        true
    }

    /// Move to the next history snapshot. Returns false at the tail.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        self.restore_cursor();
        true
    }

    /// No edge may reference a missing node. Exposed for tests and debug
    /// assertions.
    pub fn is_consistent(&self) -> bool {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .all(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
    }

    fn restore_cursor(&mut self) {
        let snapshot = self.history[self.cursor].clone();
        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        // Selection survives history moves only while its target exists.
        let stale = match &self.selection {
            Some(Selection::Node(id)) => self.node(id).is_none(),
            Some(Selection::Edge(id)) => self.edge(id).is_none(),
            None => false,
        };
        if stale {
            self.selection = None;
        }
    }

    fn commit(&mut self) {
        debug_assert!(self.is_consistent());
        self.history.truncate(self.cursor + 1);
        self.history.push(Snapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        });
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.cursor = self.history.len() - 1;
    }
}
