use std::collections::HashMap;

use graph_model::{Edge, Node};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::trace;

use crate::Position;

#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// Horizontal distance between ranks.
    pub column_gap: f64,
    /// Vertical distance between slots within a rank.
    pub row_gap: f64,
    pub margin: f64,
}

impl Default for LayeredConfig {
    fn default() -> Self {
        Self {
            column_gap: 220.0,
            row_gap: 110.0,
            margin: 60.0,
        }
    }
}

/// Deterministic layered placement.
///
/// Nodes with no incoming edges sit at rank 0; every other node sits one
/// rank past its deepest predecessor. Within a rank, nodes are ordered by
/// the barycenter of their predecessors' slots (ties broken by id), which
/// keeps edge crossings low and output reproducible.
#[derive(Debug, Clone)]
pub struct LayeredLayout {
    config: LayeredConfig,
}

impl LayeredLayout {
    pub fn new(config: LayeredConfig) -> Self {
        Self { config }
    }

    pub fn compute(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        previous: Option<&HashMap<String, Position>>,
    ) -> HashMap<String, Position> {
        let mut out = HashMap::with_capacity(nodes.len());
        if nodes.is_empty() {
            return out;
        }

        let (graph, indices) = build_graph(nodes, edges);
        let ranks = assign_ranks(&graph);
        let ordered = order_within_ranks(nodes, &graph, &indices, &ranks);

        for (rank, column) in ordered.iter().enumerate() {
            for (slot, id) in column.iter().enumerate() {
                let position = Position::new(
                    self.config.margin + rank as f64 * self.config.column_gap,
                    self.config.margin + slot as f64 * self.config.row_gap,
                );
                out.insert(id.clone(), position);
            }
        }

        // Continuity: nodes already placed keep their coordinates; only
        // new nodes take the freshly computed slots.
        if let Some(previous) = previous {
            for node in nodes {
                if let Some(kept) = previous.get(&node.id) {
                    out.insert(node.id.clone(), *kept);
                }
            }
        }
        out
    }
}

fn build_graph<'a>(
    nodes: &'a [Node],
    edges: &[Edge],
) -> (DiGraph<&'a str, ()>, HashMap<&'a str, NodeIndex>) {
    let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(nodes.len(), edges.len());
    let mut indices = HashMap::with_capacity(nodes.len());
    for node in nodes {
        let index = graph.add_node(node.id.as_str());
        indices.insert(node.id.as_str(), index);
    }
    for edge in edges {
        if let (Some(&source), Some(&target)) = (
            indices.get(edge.source.as_str()),
            indices.get(edge.target.as_str()),
        ) {
            graph.add_edge(source, target, ());
        }
    }
    (graph, indices)
}

/// Longest-path ranking. Acyclic graphs get an exact ranking via a
/// topological order; cyclic graphs fall back to a bounded relaxation that
/// terminates with every node ranked.
fn assign_ranks(graph: &DiGraph<&str, ()>) -> HashMap<NodeIndex, usize> {
    let mut ranks: HashMap<NodeIndex, usize> = HashMap::with_capacity(graph.node_count());
    match toposort(graph, None) {
        Ok(order) => {
            for index in order {
                let rank = graph
                    .neighbors_directed(index, Direction::Incoming)
                    .filter_map(|pred| ranks.get(&pred))
                    .max()
                    .map_or(0, |max| max + 1);
                ranks.insert(index, rank);
            }
        }
        Err(_) => {
            trace!("graph is cyclic, using relaxation ranking");
            let cap = graph.node_count().saturating_sub(1);
            for index in graph.node_indices() {
                ranks.insert(index, 0);
            }
            for _ in 0..graph.node_count() {
                let mut changed = false;
                for edge in graph.edge_indices() {
                    let Some((source, target)) = graph.edge_endpoints(edge) else {
                        continue;
                    };
                    let candidate = (ranks[&source] + 1).min(cap);
                    if candidate > ranks[&target] {
                        ranks.insert(target, candidate);
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }
        }
    }
    ranks
}

/// Group nodes per rank, then order each rank by predecessor barycenter
/// with id tie-breaks.
fn order_within_ranks(
    nodes: &[Node],
    graph: &DiGraph<&str, ()>,
    indices: &HashMap<&str, NodeIndex>,
    ranks: &HashMap<NodeIndex, usize>,
) -> Vec<Vec<String>> {
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
    for node in nodes {
        let rank = ranks[&indices[node.id.as_str()]];
        columns[rank].push(node.id.clone());
    }

    let mut slots: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
    for column in columns.iter_mut() {
        column.sort();
        let mut keyed: Vec<(f64, String)> = column
            .iter()
            .map(|id| {
                let preds: Vec<usize> = graph
                    .neighbors_directed(indices[id.as_str()], Direction::Incoming)
                    .filter_map(|pred| slots.get(graph[pred]))
                    .copied()
                    .collect();
                let barycenter = if preds.is_empty() {
                    f64::MAX // unranked predecessors sink to id order
                } else {
                    preds.iter().sum::<usize>() as f64 / preds.len() as f64
                };
                (barycenter, id.clone())
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        *column = keyed.into_iter().map(|(_, id)| id).collect();
        for (slot, id) in column.iter().enumerate() {
            slots.insert(id.clone(), slot);
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_model::{EdgeMetadata, NodeKind, NodeMetadata};

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Agent,
            label: id.to_string(),
            zone: NodeKind::Agent.default_zone(),
            metadata: NodeMetadata::default(),
        }
    }

    fn edge(source: &str, target: &str) -> Edge {
        Edge {
            id: format!("{source}-{target}"),
            source: source.to_string(),
            target: target.to_string(),
            label: "uses".into(),
            metadata: EdgeMetadata::default(),
        }
    }

    #[test]
    fn ranks_follow_graph_depth() {
        let nodes = vec![node("in"), node("agent"), node("tool"), node("out")];
        let edges = vec![
            edge("in", "agent"),
            edge("agent", "tool"),
            edge("tool", "out"),
        ];
        let layout = LayeredLayout::new(LayeredConfig::default());
        let positions = layout.compute(&nodes, &edges, None);

        let xs: Vec<f64> = ["in", "agent", "tool", "out"]
            .iter()
            .map(|id| positions[*id].x)
            .collect();
        assert!(xs[0] < xs[1] && xs[1] < xs[2] && xs[2] < xs[3]);
    }

    #[test]
    fn diamond_joins_at_deepest_predecessor_rank() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let edges = vec![
            edge("a", "b"),
            edge("a", "c"),
            edge("b", "d"),
            edge("c", "d"),
        ];
        let config = LayeredConfig::default();
        let positions = LayeredLayout::new(config.clone()).compute(&nodes, &edges, None);
        assert_eq!(positions["b"].x, positions["c"].x);
        assert_eq!(
            positions["d"].x,
            config.margin + 2.0 * config.column_gap
        );
    }

    #[test]
    fn output_is_deterministic() {
        let nodes = vec![node("z"), node("m"), node("a")];
        let edges = vec![edge("z", "m"), edge("z", "a")];
        let layout = LayeredLayout::new(LayeredConfig::default());
        let first = layout.compute(&nodes, &edges, None);
        let second = layout.compute(&nodes, &edges, None);
        assert_eq!(first, second);
    }

    #[test]
    fn cycle_terminates_with_every_node_ranked() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        let layout = LayeredLayout::new(LayeredConfig::default());
        let positions = layout.compute(&nodes, &edges, None);
        assert_eq!(positions.len(), 3);
    }

    #[test]
    fn previous_positions_survive_incremental_add() {
        let layout = LayeredLayout::new(LayeredConfig::default());
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("a", "b")];
        let first = layout.compute(&nodes, &edges, None);

        let grown = vec![node("a"), node("b"), node("c")];
        let grown_edges = vec![edge("a", "b"), edge("b", "c")];
        let second = layout.compute(&grown, &grown_edges, Some(&first));

        assert_eq!(second["a"], first["a"]);
        assert_eq!(second["b"], first["b"]);
        assert!(second.contains_key("c"));
    }
}
