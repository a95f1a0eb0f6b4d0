use std::fmt;

use serde::{Deserialize, Serialize};

/// What a node represents in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Agent,
    Tool,
    Db,
    Input,
    Output,
}

impl NodeKind {
    /// Default layer classification for user-created nodes of this kind.
    ///
    /// Agents reason, tools act, databases remember, inputs perceive and
    /// outputs act. The zone stays user-editable afterwards; kind and zone
    /// are deliberately independent fields.
    pub fn default_zone(self) -> Zone {
        match self {
            NodeKind::Agent => Zone::Reasoning,
            NodeKind::Tool => Zone::Action,
            NodeKind::Db => Zone::Memory,
            NodeKind::Input => Zone::Perception,
            NodeKind::Output => Zone::Action,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Agent => "agent",
            NodeKind::Tool => "tool",
            NodeKind::Db => "db",
            NodeKind::Input => "input",
            NodeKind::Output => "output",
        };
        f.write_str(s)
    }
}

/// Coarse functional layer used for visual grouping and coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    #[default]
    Perception,
    Reasoning,
    Action,
    Memory,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Zone::Perception => "perception",
            Zone::Reasoning => "reasoning",
            Zone::Action => "action",
            Zone::Memory => "memory",
        };
        f.write_str(s)
    }
}

/// Explanatory metadata attached to a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub principles: Vec<String>,
    #[serde(default)]
    pub reflection_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A workflow vertex: an agent, tool, store or I/O boundary.
///
/// Positions are presentation state and live in the layout engine, not
/// here; a node serializes exactly as the wire schema expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    pub zone: Zone,
    #[serde(default)]
    pub metadata: NodeMetadata,
}

/// Explanatory metadata attached to an edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeMetadata {
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principle_reference: Option<String>,
}

/// A directed data/control connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(default)]
    pub metadata: EdgeMetadata,
}

/// Edge id used when upstream supplies none: `"{source}-{target}"`.
///
/// Cannot distinguish parallel edges between the same pair; the store
/// rejects the second edge with [`GraphError::DuplicateEdge`].
pub fn derived_edge_id(source: &str, target: &str) -> String {
    format!("{source}-{target}")
}

/// The one selected element, discriminated by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Node(String),
    Edge(String),
}

impl Selection {
    pub fn id(&self) -> &str {
        match self {
            Selection::Node(id) | Selection::Edge(id) => id,
        }
    }
}

/// Failures of individual store operations. None of these are fatal; the
/// graph is left unchanged by a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge endpoint names a node that is not in the store.
    InvalidReference { edge: String, endpoint: String },
    /// An edge with the same derived id already exists.
    DuplicateEdge { id: String },
    /// The named element is not in the store.
    NotFound { id: String },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidReference { edge, endpoint } => {
                write!(f, "edge {edge} references missing node {endpoint}")
            }
            GraphError::DuplicateEdge { id } => {
                write!(f, "an edge {id} already exists between these nodes")
            }
            GraphError::NotFound { id } => write!(f, "no element with id {id}"),
        }
    }
}

impl std::error::Error for GraphError {}
