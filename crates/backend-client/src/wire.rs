use std::fmt;

use graph_model::{derived_edge_id, Edge, EdgeMetadata, Node, NodeKind, NodeMetadata, Zone};
use serde::{Deserialize, Serialize};

/// Scenario categories offered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    Marketing,
    CustomerService,
    SoftwareDevelopment,
    Research,
    Other,
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioType::Marketing => "Marketing",
            ScenarioType::CustomerService => "Customer Service",
            ScenarioType::SoftwareDevelopment => "Software Development",
            ScenarioType::Research => "Research",
            ScenarioType::Other => "Other",
        };
        f.write_str(s)
    }
}

/// An edge endpoint as producers send it: either a bare id string or an
/// embedded object carrying one. Normalized to the id at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    Id(String),
    Object { id: String },
}

impl NodeRef {
    pub fn into_id(self) -> String {
        match self {
            NodeRef::Id(id) | NodeRef::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeRef,
    pub target: NodeRef,
    #[serde(default)]
    pub data_format: String,
}

/// The backend's whole-workflow description, as returned by generation
/// and NL-edit requests and carried by `architecture_planned` pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNetworkArchitecture {
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl AgentNetworkArchitecture {
    /// Map the backend schema into canonical nodes and edges: agents
    /// become reasoning-zone nodes, tools action-zone nodes keyed by
    /// name, connections edges labeled by their data format.
    pub fn into_graph(self) -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = Vec::with_capacity(self.agents.len() + self.tools.len());
        for agent in self.agents {
            nodes.push(Node {
                id: agent.id,
                kind: NodeKind::Agent,
                label: agent.name,
                zone: Zone::Reasoning,
                metadata: NodeMetadata {
                    description: agent.role,
                    ..Default::default()
                },
            });
        }
        for tool in self.tools {
            nodes.push(Node {
                id: tool.name.clone(),
                kind: NodeKind::Tool,
                label: tool.name,
                zone: Zone::Action,
                metadata: NodeMetadata {
                    description: tool.description,
                    ..Default::default()
                },
            });
        }
        let edges = self
            .connections
            .into_iter()
            .map(|connection| {
                let source = connection.source.into_id();
                let target = connection.target.into_id();
                Edge {
                    id: derived_edge_id(&source, &target),
                    source,
                    target,
                    label: connection.data_format.clone(),
                    metadata: EdgeMetadata {
                        explanation: connection.data_format,
                        principle_reference: None,
                    },
                }
            })
            .collect();
        (nodes, edges)
    }
}

/// A generated workflow plus the backend session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedWorkflow {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub simulation_id: String,
}

/// Scored feedback for the current graph.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewFeedback {
    pub score: u8,
    #[serde(default)]
    pub violated_principles: Vec<String>,
    #[serde(default)]
    pub missing_components: Vec<String>,
    #[serde(default)]
    pub suggested_improvements: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SimulationRequest<'a> {
    #[serde(rename = "scenarioText")]
    pub scenario_text: &'a str,
    #[serde(rename = "scenarioType")]
    pub scenario_type: ScenarioType,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditRequest<'a> {
    pub command: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewRequest<'a> {
    pub nodes: &'a [Node],
    pub edges: &'a [Edge],
}

/// Generation responses are the architecture plus an optional
/// server-assigned session id.
#[derive(Debug, Deserialize)]
pub(crate) struct SimulateResponse {
    #[serde(flatten)]
    pub architecture: AgentNetworkArchitecture,
    #[serde(default)]
    pub simulation_id: Option<String>,
}

/// Error payload the backend attaches to non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: String,
}

/// Inbound push frame envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct PushEnvelope {
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArchitecturePlannedPayload {
    pub agent_network_architecture: AgentNetworkArchitecture,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResetMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: ResetPayload<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResetPayload<'a> {
    #[serde(rename = "simulationId")]
    pub simulation_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architecture_maps_to_zoned_nodes_and_labeled_edges() {
        let json = r#"{
            "agents": [{"id": "a1", "name": "Planner", "role": "plans"}],
            "tools": [{"name": "search", "description": "web search"}],
            "connections": [{"source": "a1", "target": "search", "data_format": "query"}]
        }"#;
        let architecture: AgentNetworkArchitecture = serde_json::from_str(json).unwrap();
        let (nodes, edges) = architecture.into_graph();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "a1");
        assert_eq!(nodes[0].zone, Zone::Reasoning);
        assert_eq!(nodes[0].label, "Planner");
        assert_eq!(nodes[0].metadata.description, "plans");
        assert_eq!(nodes[1].id, "search");
        assert_eq!(nodes[1].zone, Zone::Action);
        assert_eq!(nodes[1].metadata.description, "web search");

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, "a1-search");
        assert_eq!(edges[0].source, "a1");
        assert_eq!(edges[0].target, "search");
        assert_eq!(edges[0].label, "query");
    }

    #[test]
    fn connection_endpoints_accept_embedded_objects() {
        let json = r#"{
            "source": {"id": "a1", "name": "Planner"},
            "target": "search",
            "data_format": "query"
        }"#;
        // Unknown sibling fields on the object form are ignored.
        let connection: Connection = serde_json::from_str(json).unwrap();
        assert_eq!(connection.source.into_id(), "a1");
        assert_eq!(connection.target.into_id(), "search");
    }

    #[test]
    fn simulate_response_flattens_architecture_and_session_id() {
        let json = r#"{
            "agents": [], "tools": [], "connections": [],
            "simulation_id": "sim-42"
        }"#;
        let response: SimulateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.simulation_id.as_deref(), Some("sim-42"));
        assert!(response.architecture.agents.is_empty());
    }

    #[test]
    fn push_envelope_decodes_architecture_planned() {
        let json = r#"{
            "event_type": "architecture_planned",
            "payload": {
                "agent_network_architecture": {
                    "agents": [{"id": "a1", "name": "Planner", "role": "plans"}],
                    "tools": [],
                    "connections": []
                }
            }
        }"#;
        let envelope: PushEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event_type, "architecture_planned");
        let payload: ArchitecturePlannedPayload =
            serde_json::from_value(envelope.payload).unwrap();
        assert_eq!(payload.agent_network_architecture.agents[0].id, "a1");
    }

    #[test]
    fn reset_message_matches_wire_shape() {
        let message = ResetMessage {
            kind: "RESET",
            payload: ResetPayload {
                simulation_id: "sim-1",
            },
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "RESET");
        assert_eq!(value["payload"]["simulationId"], "sim-1");
    }

    #[test]
    fn scenario_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ScenarioType::CustomerService).unwrap(),
            "customer_service"
        );
    }
}
