//! 2-D placement for workflow graphs.
//!
//! Two interchangeable strategies:
//! - [`ForceSimulation`]: repulsion/spring/gravity physics with per-node
//!   velocities, steppable per frame so a host can keep pointer input
//!   responsive mid-simulation and pin a dragged node
//! - [`LayeredLayout`]: deterministic rank + barycenter placement,
//!   preferred where reproducible positions matter
//!
//! Both honor position continuity: nodes present in the previous layout
//! keep (or start from) their previous coordinates, and new nodes are
//! placed without disturbing the rest more than necessary.

mod force;
mod layered;

use std::collections::HashMap;

use graph_model::{Edge, Node};
use serde::{Deserialize, Serialize};

pub use force::{ForceConfig, ForceSimulation};
pub use layered::{LayeredConfig, LayeredLayout};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which placement algorithm an engine runs.
#[derive(Debug, Clone)]
pub enum LayoutStrategy {
    Force(ForceConfig),
    Layered(LayeredConfig),
}

/// Batch entry point shared by both strategies.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    pub strategy: LayoutStrategy,
}

impl LayoutEngine {
    pub fn layered() -> Self {
        Self {
            strategy: LayoutStrategy::Layered(LayeredConfig::default()),
        }
    }

    pub fn force() -> Self {
        Self {
            strategy: LayoutStrategy::Force(ForceConfig::default()),
        }
    }

    /// Compute a position for every node. When `previous` is supplied,
    /// nodes present in both keep continuity with their old position.
    pub fn compute(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        previous: Option<&HashMap<String, Position>>,
    ) -> HashMap<String, Position> {
        match &self.strategy {
            LayoutStrategy::Layered(config) => {
                LayeredLayout::new(config.clone()).compute(nodes, edges, previous)
            }
            LayoutStrategy::Force(config) => {
                let mut sim = ForceSimulation::new(config.clone());
                sim.seed(nodes, edges, previous);
                sim.run(nodes, edges);
                sim.positions().clone()
            }
        }
    }
}

/// Deterministic per-node jitter so coincident spawns separate without
/// pulling in randomness that would break golden positions.
pub(crate) fn id_jitter(id: &str) -> (f64, f64) {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in id.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    let dx = ((hash & 0xffff) as f64 / 65535.0 - 0.5) * 24.0;
    let dy = (((hash >> 16) & 0xffff) as f64 / 65535.0 - 0.5) * 24.0;
    (dx, dy)
}
