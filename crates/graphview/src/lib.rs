//! Interactive workflow canvas built on gpui.
//!
//! [`WorkflowCanvas`] renders the graph (zone-colored node circles, batched
//! arrowed edges in a single paint pass) and interprets pointer gestures:
//! click to select, drag a node to reposition it, drag from a node's
//! connect handle onto another node to request an edge, drag empty space
//! to pan, scroll to zoom toward the cursor. It owns only presentation
//! state; every model-changing gesture is reported as a [`CanvasEvent`]
//! for the host to apply.

mod canvas;
mod palette;

pub use canvas::{CanvasEvent, CanvasLayout, WorkflowCanvas};
pub use palette::{edge_color, zone_color};
