use std::collections::{HashMap, HashSet};

use graph_model::{Edge, Node};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::{id_jitter, Position};

/// Physics parameters. The defaults settle a few dozen nodes in well
/// under `max_iterations` steps.
#[derive(Debug, Clone)]
pub struct ForceConfig {
    /// Coulomb-style pair repulsion strength.
    pub repulsion: f64,
    /// Spring constant along edges.
    pub attraction: f64,
    /// Spring rest length in layout units.
    pub rest_length: f64,
    /// Pull toward `center` so disconnected parts stay on screen.
    pub gravity: f64,
    pub center: Position,
    /// Velocity retained per step.
    pub damping: f64,
    pub dt: f64,
    /// Per-step displacement clamp, keeps the simulation stable.
    pub max_displacement: f64,
    /// The simulation counts as settled below this kinetic energy.
    pub energy_threshold: f64,
    pub max_iterations: usize,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            repulsion: 6000.0,
            attraction: 0.04,
            rest_length: 140.0,
            gravity: 0.015,
            center: Position::new(400.0, 300.0),
            damping: 0.85,
            dt: 0.9,
            max_displacement: 18.0,
            energy_threshold: 0.05,
            max_iterations: 400,
        }
    }
}

/// Steppable force-directed simulation.
///
/// The host seeds it from the current graph (and any previous positions),
/// then either calls [`run`](Self::run) to settle synchronously or drives
/// [`step`](Self::step) from an animation callback. A dragged node is
/// pinned: its position is set directly and its velocity zeroed while the
/// rest of the graph keeps settling.
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    config: ForceConfig,
    positions: HashMap<String, Position>,
    velocities: HashMap<String, (f64, f64)>,
    pinned: HashSet<String>,
}

impl ForceSimulation {
    pub fn new(config: ForceConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            velocities: HashMap::new(),
            pinned: HashSet::new(),
        }
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    /// Initialize positions for the given graph. Nodes already known (or
    /// present in `previous`) keep their coordinates; new nodes start near
    /// the barycenter of their placed neighbors, falling back to a seeded
    /// scatter around the center. Nodes no longer in the graph are
    /// forgotten.
    pub fn seed(
        &mut self,
        nodes: &[Node],
        edges: &[Edge],
        previous: Option<&HashMap<String, Position>>,
    ) {
        let live: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        self.positions.retain(|id, _| live.contains(id.as_str()));
        self.velocities.retain(|id, _| live.contains(id.as_str()));
        self.pinned.retain(|id| live.contains(id.as_str()));

        if let Some(previous) = previous {
            for (id, pos) in previous {
                if live.contains(id.as_str()) {
                    self.positions.entry(id.clone()).or_insert(*pos);
                }
            }
        }

        let mut rng = StdRng::seed_from_u64(nodes.len() as u64 ^ 0x5eed);
        for node in nodes {
            if self.positions.contains_key(&node.id) {
                continue;
            }
            let spot = self
                .neighbor_barycenter(&node.id, edges)
                .unwrap_or_else(|| {
                    let angle = rng.random_range(0.0..std::f64::consts::TAU);
                    let radius = rng.random_range(40.0..160.0);
                    Position::new(
                        self.config.center.x + radius * angle.cos(),
                        self.config.center.y + radius * angle.sin(),
                    )
                });
            let (dx, dy) = id_jitter(&node.id);
            self.positions
                .insert(node.id.clone(), Position::new(spot.x + dx, spot.y + dy));
            self.velocities.insert(node.id.clone(), (0.0, 0.0));
        }
    }

    /// Pin a node at a position (drag). Pinned nodes do not move until
    /// released.
    pub fn pin(&mut self, id: &str, position: Position) {
        self.positions.insert(id.to_string(), position);
        self.velocities.insert(id.to_string(), (0.0, 0.0));
        self.pinned.insert(id.to_string());
    }

    /// Release a pinned node so the simulation can re-settle it.
    pub fn unpin(&mut self, id: &str) {
        self.pinned.remove(id);
    }

    /// Place a node directly without pinning it.
    pub fn set_position(&mut self, id: &str, position: Position) {
        self.positions.insert(id.to_string(), position);
        self.velocities.insert(id.to_string(), (0.0, 0.0));
    }

    /// Advance one frame; returns the total kinetic energy so callers can
    /// stop scheduling frames once the graph has settled.
    pub fn step(&mut self, nodes: &[Node], edges: &[Edge]) -> f64 {
        let n = nodes.len();
        if n == 0 {
            return 0.0;
        }
        let ids: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
        let mut xs: Vec<f64> = Vec::with_capacity(n);
        let mut ys: Vec<f64> = Vec::with_capacity(n);
        for id in &ids {
            let p = self.positions.get(*id).copied().unwrap_or(self.config.center);
            xs.push(p.x);
            ys.push(p.y);
        }

        let mut fx = vec![0.0f64; n];
        let mut fy = vec![0.0f64; n];

        // Pair repulsion.
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = xs[j] - xs[i];
                let dy = ys[j] - ys[i];
                let d2 = (dx * dx + dy * dy).max(0.01);
                let inv = 1.0 / d2;
                let fx_ij = self.config.repulsion * dx * inv;
                let fy_ij = self.config.repulsion * dy * inv;
                fx[i] -= fx_ij;
                fy[i] -= fy_ij;
                fx[j] += fx_ij;
                fy[j] += fy_ij;
            }
        }

        // Spring attraction along edges toward the rest length.
        let index: HashMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for edge in edges {
            let (Some(&i), Some(&j)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                continue;
            };
            let dx = xs[j] - xs[i];
            let dy = ys[j] - ys[i];
            let dist = (dx * dx + dy * dy).sqrt().max(1.0);
            let stretch = dist - self.config.rest_length;
            let force = self.config.attraction * stretch;
            let fx_e = force * dx / dist;
            let fy_e = force * dy / dist;
            fx[i] += fx_e;
            fy[i] += fy_e;
            fx[j] -= fx_e;
            fy[j] -= fy_e;
        }

        // Gravity toward the viewport center.
        for i in 0..n {
            fx[i] += self.config.gravity * (self.config.center.x - xs[i]);
            fy[i] += self.config.gravity * (self.config.center.y - ys[i]);
        }

        // Integrate with damping and a displacement clamp.
        let mut energy = 0.0f64;
        for (i, id) in ids.iter().enumerate() {
            if self.pinned.contains(*id) {
                self.velocities.insert((*id).to_string(), (0.0, 0.0));
                continue;
            }
            let (mut vx, mut vy) = self.velocities.get(*id).copied().unwrap_or((0.0, 0.0));
            vx = (vx + fx[i] * self.config.dt) * self.config.damping;
            vy = (vy + fy[i] * self.config.dt) * self.config.damping;
            let speed2 = vx * vx + vy * vy;
            let max = self.config.max_displacement;
            if speed2 > max * max {
                let scale = max / speed2.sqrt();
                vx *= scale;
                vy *= scale;
            }
            energy += vx * vx + vy * vy;
            self.velocities.insert((*id).to_string(), (vx, vy));
            self.positions
                .insert((*id).to_string(), Position::new(xs[i] + vx, ys[i] + vy));
        }
        energy
    }

    /// Step until the energy threshold or the iteration cap is reached.
    pub fn run(&mut self, nodes: &[Node], edges: &[Edge]) {
        for iteration in 0..self.config.max_iterations {
            let energy = self.step(nodes, edges);
            if energy < self.config.energy_threshold {
                trace!(iteration, energy, "force layout settled");
                return;
            }
        }
        trace!(
            iterations = self.config.max_iterations,
            "force layout hit iteration cap"
        );
    }

    fn neighbor_barycenter(&self, id: &str, edges: &[Edge]) -> Option<Position> {
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut count = 0usize;
        for edge in edges {
            let other = if edge.source == id {
                edge.target.as_str()
            } else if edge.target == id {
                edge.source.as_str()
            } else {
                continue;
            };
            if let Some(pos) = self.positions.get(other) {
                sum_x += pos.x;
                sum_y += pos.y;
                count += 1;
            }
        }
        (count > 0).then(|| Position::new(sum_x / count as f64, sum_y / count as f64))
    }
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
    fn disconnected_nodes_repel() {
        let nodes = vec![node("a"), node("b")];
        let mut sim = ForceSimulation::new(ForceConfig::default());
        sim.seed(&nodes, &[], None);
        sim.run(&nodes, &[]);
        let a = sim.position("a").unwrap();
        let b = sim.position("b").unwrap();
        let dist = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
        assert!(dist > 50.0, "nodes should separate, got {dist}");
    }

    #[test]
    fn connected_nodes_stay_near_rest_length() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("a", "b")];
        let mut sim = ForceSimulation::new(ForceConfig::default());
        sim.seed(&nodes, &edges, None);
        sim.run(&nodes, &edges);
        let a = sim.position("a").unwrap();
        let b = sim.position("b").unwrap();
        let dist = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
        assert!(
            dist < 4.0 * ForceConfig::default().rest_length,
            "edge spring should bound the distance, got {dist}"
        );
    }

    #[test]
    fn pinned_node_does_not_move() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "b"), edge("b", "c")];
        let mut sim = ForceSimulation::new(ForceConfig::default());
        sim.seed(&nodes, &edges, None);
        sim.pin("b", Position::new(111.0, 222.0));
        for _ in 0..50 {
            sim.step(&nodes, &edges);
        }
        let b = sim.position("b").unwrap();
        assert_eq!((b.x, b.y), (111.0, 222.0));
    }

    #[test]
    fn seed_keeps_previous_positions() {
        let nodes = vec![node("a"), node("b")];
        let mut previous = HashMap::new();
        previous.insert("a".to_string(), Position::new(10.0, 20.0));
        let mut sim = ForceSimulation::new(ForceConfig::default());
        sim.seed(&nodes, &[], Some(&previous));
        assert_eq!(sim.position("a"), Some(Position::new(10.0, 20.0)));
        assert!(sim.position("b").is_some());
    }

    #[test]
    fn new_node_spawns_near_connected_neighbors() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("a", "c"), edge("b", "c")];
        let mut previous = HashMap::new();
        previous.insert("a".to_string(), Position::new(0.0, 0.0));
        previous.insert("b".to_string(), Position::new(100.0, 0.0));
        let mut sim = ForceSimulation::new(ForceConfig::default());
        sim.seed(&nodes, &edges, Some(&previous));
        let c = sim.position("c").unwrap();
        // Barycenter of (0,0) and (100,0) plus bounded jitter.
        assert!((c.x - 50.0).abs() < 20.0, "x off barycenter: {}", c.x);
        assert!(c.y.abs() < 20.0, "y off barycenter: {}", c.y);
    }

    #[test]
    fn removed_nodes_are_forgotten_on_reseed() {
        let mut sim = ForceSimulation::new(ForceConfig::default());
        let before = vec![node("a"), node("b")];
        sim.seed(&before, &[], None);
        let after = vec![node("a")];
        sim.seed(&after, &[], None);
        assert!(sim.position("b").is_none());
    }
}
