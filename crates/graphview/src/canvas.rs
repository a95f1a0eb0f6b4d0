use std::collections::HashMap;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui::{Context, IntoElement, ParentElement, Render, Styled, Window, canvas, div};
use graph_model::{Edge, Node, Selection, Zone};
use tracing::debug;
use workflow_layout::{ForceConfig, ForceSimulation, LayeredConfig, LayeredLayout, Position};

use crate::palette::{edge_color, zone_color};

/// Node circle radius in world units.
const NODE_RADIUS: f32 = 26.0;
/// Connect handle radius in screen pixels (generous for grabbing).
const PORT_HIT_RADIUS: f32 = 9.0;
/// Max distance from an edge segment that still counts as hitting it.
const EDGE_HIT_RADIUS: f32 = 6.0;
/// Pointer travel before a press counts as a drag instead of a click.
const DRAG_THRESHOLD: f32 = 4.0;
/// Top-left strip occupied by the controls panel; pointer gestures start
/// below it so button presses never double as background clicks.
const CONTROLS_WIDTH: f32 = 300.0;
const CONTROLS_HEIGHT: f32 = 48.0;

/// Placement algorithm driving node positions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CanvasLayout {
    /// Steppable physics, animated per frame until it settles.
    #[default]
    Force,
    /// Deterministic rank/barycenter placement, computed once per change.
    Layered,
}

/// What the pointer is currently doing. All gesture interpretation lives
/// here; the canvas never mutates the graph model itself.
#[derive(Clone, Debug)]
enum Pointer {
    Idle,
    Panning {
        start_pan: Point<Pixels>,
        start_pos: Point<Pixels>,
        moved: bool,
    },
    DraggingNode {
        id: String,
        grab: Point<Pixels>,
        press: Point<Pixels>,
        moved: bool,
    },
    Connecting {
        source: String,
        cursor: Point<Pixels>,
    },
}

/// Singleton tooltip state: at most one element is hovered at a time, so
/// label and body always describe the same element.
#[derive(Clone, Debug)]
struct Hover {
    key: Selection,
    title: String,
    body: String,
    position: Point<Pixels>,
}

/// Intents reported to the host. The canvas renders and interprets
/// gestures; selection and graph edits are the host's decision.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasEvent {
    NodeClicked(String),
    EdgeClicked(String),
    BackgroundClicked,
    /// A port-to-node drag finished over another node.
    ConnectRequested { source: String, target: String },
}

pub struct WorkflowCanvas {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    positions: HashMap<String, Position>,
    selection: Option<Selection>,
    hover: Option<Hover>,
    layout: CanvasLayout,
    sim: ForceSimulation,
    energy_floor: f64,
    /// True while the force simulation still owes animation frames.
    settling: bool,
    zoom: f32,
    pan: Point<Pixels>,
    container_offset: Point<Pixels>,
    container_size: Size<Pixels>,
    pointer: Pointer,
}

impl EventEmitter<CanvasEvent> for WorkflowCanvas {}

impl WorkflowCanvas {
    pub fn new() -> Self {
        let config = ForceConfig::default();
        let energy_floor = config.energy_threshold;
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            positions: HashMap::new(),
            selection: None,
            hover: None,
            layout: CanvasLayout::default(),
            sim: ForceSimulation::new(config),
            energy_floor,
            settling: false,
            zoom: 1.0,
            pan: point(px(0.0), px(0.0)),
            container_offset: point(px(0.0), px(0.0)),
            container_size: size(px(0.0), px(0.0)),
            pointer: Pointer::Idle,
        }
    }

    /// Replace the rendered graph. Surviving nodes keep their positions;
    /// new nodes are placed by the active layout without disturbing the
    /// rest.
    pub fn set_model(
        &mut self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        selection: Option<Selection>,
        cx: &mut Context<Self>,
    ) {
        self.nodes = nodes;
        self.edges = edges;
        self.selection = selection;
        self.relayout();
        if let Some(hover) = &self.hover {
            if !self.contains(&hover.key) {
                self.hover = None;
            }
        }
        cx.notify();
    }

    /// Update the selection ring without touching positions.
    pub fn set_selection(&mut self, selection: Option<Selection>, cx: &mut Context<Self>) {
        if self.selection != selection {
            self.selection = selection;
            cx.notify();
        }
    }

    pub fn set_layout(&mut self, layout: CanvasLayout, cx: &mut Context<Self>) {
        if self.layout == layout {
            return;
        }
        debug!(?layout, "layout strategy changed");
        self.layout = layout;
        self.relayout();
        cx.notify();
    }

    pub fn layout(&self) -> CanvasLayout {
        self.layout
    }

    fn relayout(&mut self) {
        match self.layout {
            CanvasLayout::Layered => {
                self.positions = LayeredLayout::new(LayeredConfig::default()).compute(
                    &self.nodes,
                    &self.edges,
                    Some(&self.positions),
                );
                // Keep the simulation coherent so toggling back to force
                // mode resumes from the on-screen positions.
                self.sim.seed(&self.nodes, &self.edges, Some(&self.positions));
                for (id, pos) in &self.positions {
                    self.sim.set_position(id, *pos);
                }
                self.settling = false;
            }
            CanvasLayout::Force => {
                self.sim.seed(&self.nodes, &self.edges, Some(&self.positions));
                self.positions = self.sim.positions().clone();
                self.settling = true;
            }
        }
    }

    /// A few physics steps per animation frame, mirrored into `positions`.
    fn step_simulation(&mut self) {
        let mut energy = 0.0;
        for _ in 0..3 {
            energy = self.sim.step(&self.nodes, &self.edges);
        }
        self.positions = self.sim.positions().clone();
        let dragging = matches!(self.pointer, Pointer::DraggingNode { .. });
        if energy < self.energy_floor && !dragging {
            self.settling = false;
        }
    }

    fn contains(&self, selection: &Selection) -> bool {
        match selection {
            Selection::Node(id) => self.nodes.iter().any(|n| &n.id == id),
            Selection::Edge(id) => self.edges.iter().any(|e| &e.id == id),
        }
    }

    fn set_zoom(&mut self, new_zoom: f32, cx: &mut Context<Self>) {
        let new_zoom = new_zoom.clamp(0.25, 4.0);
        if (new_zoom - self.zoom).abs() < 0.001 {
            return;
        }
        self.zoom = new_zoom;
        cx.notify();
    }

    /// Fit all nodes into the visible area.
    fn fit_to_content(&mut self, cx: &mut Context<Self>) {
        if self.positions.is_empty() || self.container_size.width <= px(0.0) {
            return;
        }

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for pos in self.positions.values() {
            min_x = min_x.min(pos.x);
            min_y = min_y.min(pos.y);
            max_x = max_x.max(pos.x);
            max_y = max_y.max(pos.y);
        }
        let margin = 2.0 * NODE_RADIUS as f64 + 20.0;
        min_x -= margin;
        min_y -= margin;
        max_x += margin;
        max_y += margin;

        let content_width = (max_x - min_x).max(1.0) as f32;
        let content_height = (max_y - min_y).max(1.0) as f32;
        let available_width = (self.container_size.width / px(1.0)) as f32;
        let available_height = (self.container_size.height / px(1.0)) as f32;

        let zoom = (available_width / content_width)
            .min(available_height / content_height)
            .clamp(0.25, 2.0);

        let center_x = ((min_x + max_x) / 2.0) as f32;
        let center_y = ((min_y + max_y) / 2.0) as f32;
        self.zoom = zoom;
        self.pan = point(
            px(available_width / 2.0 - center_x * zoom),
            px(available_height / 2.0 - center_y * zoom),
        );
        cx.notify();
    }

    // Container-local screen coordinates <-> world coordinates.

    fn local(&self, window_pos: Point<Pixels>) -> Point<Pixels> {
        point(
            window_pos.x - self.container_offset.x,
            window_pos.y - self.container_offset.y,
        )
    }

    fn to_screen(&self, pos: Position) -> Point<Pixels> {
        point(
            self.pan.x + px(pos.x as f32 * self.zoom),
            self.pan.y + px(pos.y as f32 * self.zoom),
        )
    }

    fn to_world(&self, screen: Point<Pixels>) -> Position {
        Position::new(
            (((screen.x - self.pan.x) / px(1.0)) as f32 / self.zoom) as f64,
            (((screen.y - self.pan.y) / px(1.0)) as f32 / self.zoom) as f64,
        )
    }

    /// Topmost node whose circle contains the cursor. Nodes render in
    /// order, so iterate in reverse to prefer the one painted last.
    fn node_at(&self, cursor: Point<Pixels>) -> Option<String> {
        let r = NODE_RADIUS * self.zoom;
        for node in self.nodes.iter().rev() {
            let Some(pos) = self.positions.get(&node.id) else {
                continue;
            };
            let center = self.to_screen(*pos);
            let dx = ((cursor.x - center.x) / px(1.0)) as f32;
            let dy = ((cursor.y - center.y) / px(1.0)) as f32;
            if dx * dx + dy * dy <= r * r {
                return Some(node.id.clone());
            }
        }
        None
    }

    /// Connect handle at the right edge of a node circle.
    fn port_at(&self, cursor: Point<Pixels>) -> Option<String> {
        let r = NODE_RADIUS * self.zoom;
        for node in self.nodes.iter().rev() {
            let Some(pos) = self.positions.get(&node.id) else {
                continue;
            };
            let center = self.to_screen(*pos);
            let dx = ((cursor.x - center.x) / px(1.0)) as f32 - r;
            let dy = ((cursor.y - center.y) / px(1.0)) as f32;
            if dx * dx + dy * dy <= PORT_HIT_RADIUS * PORT_HIT_RADIUS {
                return Some(node.id.clone());
            }
        }
        None
    }

    fn edge_at(&self, cursor: Point<Pixels>) -> Option<String> {
        let cx = ((cursor.x) / px(1.0)) as f32;
        let cy = ((cursor.y) / px(1.0)) as f32;
        for edge in self.edges.iter().rev() {
            let (Some(p1), Some(p2)) = (
                self.positions.get(&edge.source),
                self.positions.get(&edge.target),
            ) else {
                continue;
            };
            let a = self.to_screen(*p1);
            let b = self.to_screen(*p2);
            let d = dist_to_segment(
                (cx, cy),
                ((a.x / px(1.0)) as f32, (a.y / px(1.0)) as f32),
                ((b.x / px(1.0)) as f32, (b.y / px(1.0)) as f32),
            );
            if d <= EDGE_HIT_RADIUS {
                return Some(edge.id.clone());
            }
        }
        None
    }

    fn hover_for(&self, cursor: Point<Pixels>) -> Option<Hover> {
        if let Some(id) = self.node_at(cursor) {
            let node = self.nodes.iter().find(|n| n.id == id)?;
            return Some(Hover {
                key: Selection::Node(id),
                title: node.label.clone(),
                body: node_hover_body(node),
                position: cursor,
            });
        }
        if let Some(id) = self.edge_at(cursor) {
            let edge = self.edges.iter().find(|e| e.id == id)?;
            return Some(Hover {
                key: Selection::Edge(id),
                title: edge.label.clone(),
                body: edge_hover_body(edge),
                position: cursor,
            });
        }
        None
    }

    fn in_controls(&self, cursor: Point<Pixels>) -> bool {
        cursor.x < px(CONTROLS_WIDTH) && cursor.y < px(CONTROLS_HEIGHT)
    }

    fn on_mouse_down(&mut self, e: &MouseDownEvent, cx: &mut Context<Self>) {
        let cursor = self.local(e.position);
        if self.in_controls(cursor) {
            return;
        }
        self.hover = None;

        if let Some(source) = self.port_at(cursor) {
            self.pointer = Pointer::Connecting { source, cursor };
            cx.notify();
            return;
        }
        if let Some(id) = self.node_at(cursor) {
            if let Some(pos) = self.positions.get(&id).copied() {
                let center = self.to_screen(pos);
                let grab = point(cursor.x - center.x, cursor.y - center.y);
                self.sim.pin(&id, pos);
                self.pointer = Pointer::DraggingNode {
                    id,
                    grab,
                    press: cursor,
                    moved: false,
                };
                cx.notify();
            }
            return;
        }
        if let Some(id) = self.edge_at(cursor) {
            cx.emit(CanvasEvent::EdgeClicked(id));
            return;
        }
        self.pointer = Pointer::Panning {
            start_pan: self.pan,
            start_pos: cursor,
            moved: false,
        };
        cx.notify();
    }

    fn on_mouse_move(&mut self, e: &MouseMoveEvent, cx: &mut Context<Self>) {
        let cursor = self.local(e.position);

        // The release can land outside the window; recover on re-entry.
        if !matches!(self.pointer, Pointer::Idle)
            && !matches!(
                e.pressed_button,
                Some(MouseButton::Left | MouseButton::Middle)
            )
        {
            if let Pointer::DraggingNode { id, .. } = &self.pointer {
                self.sim.unpin(id);
            }
            self.pointer = Pointer::Idle;
            cx.notify();
            return;
        }

        match self.pointer.clone() {
            Pointer::Idle => {
                let next = self.hover_for(cursor);
                let changed = match (&self.hover, &next) {
                    (None, None) => false,
                    (Some(a), Some(b)) => a.key != b.key || a.position != b.position,
                    _ => true,
                };
                if changed {
                    self.hover = next;
                    cx.notify();
                }
            }
            Pointer::Panning {
                start_pan,
                start_pos,
                moved,
            } => {
                let delta = point(cursor.x - start_pos.x, cursor.y - start_pos.y);
                self.pan = point(start_pan.x + delta.x, start_pan.y + delta.y);
                let moved = moved || exceeds_drag_threshold(delta);
                self.pointer = Pointer::Panning {
                    start_pan,
                    start_pos,
                    moved,
                };
                cx.notify();
            }
            Pointer::DraggingNode {
                id,
                grab,
                press,
                moved,
            } => {
                let travel = point(cursor.x - press.x, cursor.y - press.y);
                let moved = moved || exceeds_drag_threshold(travel);
                if moved {
                    let center = point(cursor.x - grab.x, cursor.y - grab.y);
                    let world = self.to_world(center);
                    self.sim.pin(&id, world);
                    self.positions.insert(id.clone(), world);
                    self.settling = true;
                }
                self.pointer = Pointer::DraggingNode {
                    id,
                    grab,
                    press,
                    moved,
                };
                cx.notify();
            }
            Pointer::Connecting { source, .. } => {
                self.pointer = Pointer::Connecting { source, cursor };
                cx.notify();
            }
        }
    }

    fn on_mouse_up(&mut self, e: &MouseUpEvent, cx: &mut Context<Self>) {
        let cursor = self.local(e.position);
        match std::mem::replace(&mut self.pointer, Pointer::Idle) {
            Pointer::Idle => {}
            Pointer::Panning { moved, .. } => {
                if !moved {
                    cx.emit(CanvasEvent::BackgroundClicked);
                }
            }
            Pointer::DraggingNode { id, moved, .. } => {
                self.sim.unpin(&id);
                if moved {
                    // Let the simulation re-settle the neighborhood.
                    self.settling = true;
                } else {
                    cx.emit(CanvasEvent::NodeClicked(id));
                }
            }
            Pointer::Connecting { source, .. } => {
                if let Some(target) = self.node_at(cursor) {
                    if target != source {
                        cx.emit(CanvasEvent::ConnectRequested { source, target });
                    }
                }
            }
        }
        cx.notify();
    }

    /// Middle button pans from anywhere, including over nodes.
    fn on_middle_down(&mut self, e: &MouseDownEvent, cx: &mut Context<Self>) {
        let cursor = self.local(e.position);
        if self.in_controls(cursor) {
            return;
        }
        self.hover = None;
        self.pointer = Pointer::Panning {
            start_pan: self.pan,
            start_pos: cursor,
            moved: true,
        };
        cx.notify();
    }

    fn on_scroll_wheel(&mut self, event: &ScrollWheelEvent, cx: &mut Context<Self>) {
        let delta_px = event.delta.pixel_delta(px(16.0));
        let dy = delta_px.y;
        if dy == px(0.0) {
            return;
        }
        let factor = if dy > px(0.0) { 1.1 } else { 0.9 };
        let old_zoom = self.zoom;
        let new_zoom = (old_zoom * factor).clamp(0.25, 4.0);

        // Zoom toward the cursor by adjusting pan.
        let s = self.local(event.position);
        let world_x = (s.x - self.pan.x) / old_zoom;
        let world_y = (s.y - self.pan.y) / old_zoom;
        self.pan = point(s.x - world_x * new_zoom, s.y - world_y * new_zoom);
        self.zoom = new_zoom;
        cx.notify();
    }
}

impl Default for WorkflowCanvas {
    fn default() -> Self {
        Self::new()
    }
}

fn exceeds_drag_threshold(delta: Point<Pixels>) -> bool {
    let dx = (delta.x / px(1.0)) as f32;
    let dy = (delta.y / px(1.0)) as f32;
    dx * dx + dy * dy > DRAG_THRESHOLD * DRAG_THRESHOLD
}

fn node_hover_body(node: &Node) -> String {
    if node.metadata.description.is_empty() {
        "No description available".to_string()
    } else {
        node.metadata.description.clone()
    }
}

fn edge_hover_body(edge: &Edge) -> String {
    if edge.metadata.explanation.is_empty() {
        "No explanation available".to_string()
    } else {
        edge.metadata.explanation.clone()
    }
}

/// Distance from a point to a line segment, in the same units as the
/// inputs.
pub(crate) fn dist_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let abx = b.0 - a.0;
    let aby = b.1 - a.1;
    let len2 = abx * abx + aby * aby;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        (((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len2).clamp(0.0, 1.0)
    };
    let cx = a.0 + t * abx;
    let cy = a.1 + t * aby;
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Precomputed screen-space stroke for one edge (segment plus arrowhead).
struct EdgeStroke {
    p1: Point<Pixels>,
    p2: Point<Pixels>,
    tip: Point<Pixels>,
    head_left: Point<Pixels>,
    head_right: Point<Pixels>,
    color: Rgba,
    thickness: f32,
}

fn control_button<F>(
    label: impl Into<String>,
    cx: &mut Context<WorkflowCanvas>,
    on_press: F,
) -> Div
where
    F: Fn(&mut WorkflowCanvas, &mut Context<WorkflowCanvas>) + 'static,
{
    div()
        .child(label.into())
        .px(px(8.0))
        .py(px(2.0))
        .text_color(rgb(0xe2e8f0))
        .border(px(1.0))
        .border_color(rgb(0x334155))
        .rounded(px(4.0))
        .cursor_pointer()
        .hover(|this| this.bg(rgb(0x1e293b)))
        .on_mouse_down(
            MouseButton::Left,
            cx.listener(move |this, _event: &MouseDownEvent, _window, cx| {
                on_press(this, cx);
            }),
        )
}

impl Render for WorkflowCanvas {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        // Track container bounds so window coordinates can be converted to
        // container-local ones in the mouse handlers.
        let handle_for_bounds = cx.entity();
        let bounds_tracker = canvas(
            |_bounds, _window, _cx| (),
            move |bounds, _state, _window, cx| {
                cx.update_entity(&handle_for_bounds, |canvas, _| {
                    canvas.container_offset = bounds.origin;
                    canvas.container_size = bounds.size;
                });
            },
        )
        .absolute()
        .size_full();

        // Batched edge strokes, one paint pass.
        let zoom = self.zoom;
        let zone_of: HashMap<&str, Zone> =
            self.nodes.iter().map(|n| (n.id.as_str(), n.zone)).collect();
        let mut strokes: Vec<EdgeStroke> = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            let (Some(sp), Some(tp)) = (
                self.positions.get(&edge.source),
                self.positions.get(&edge.target),
            ) else {
                continue;
            };
            let a = self.to_screen(*sp);
            let b = self.to_screen(*tp);
            let dx = ((b.x - a.x) / px(1.0)) as f32;
            let dy = ((b.y - a.y) / px(1.0)) as f32;
            let len = (dx * dx + dy * dy).sqrt();
            if len < 1.0 {
                continue;
            }
            let (ux, uy) = (dx / len, dy / len);
            let (nx, ny) = (-uy, ux);
            let r = NODE_RADIUS * zoom;
            let head_len = 9.0 * zoom;
            let head_half = 4.5 * zoom;

            let p1 = point(a.x + px(ux * r), a.y + px(uy * r));
            let tip = point(b.x - px(ux * r), b.y - px(uy * r));
            let base = point(tip.x - px(ux * head_len), tip.y - px(uy * head_len));
            let head_left = point(base.x + px(nx * head_half), base.y + px(ny * head_half));
            let head_right = point(base.x - px(nx * head_half), base.y - px(ny * head_half));

            let source_zone = zone_of.get(edge.source.as_str()).copied().unwrap_or_default();
            let selected =
                matches!(&self.selection, Some(Selection::Edge(id)) if id == &edge.id);
            let (color, thickness) = if selected {
                (zone_color(source_zone), (2.5 * zoom).max(2.0))
            } else {
                (edge_color(source_zone), (1.5 * zoom).max(1.0))
            };
            strokes.push(EdgeStroke {
                p1,
                p2: base,
                tip,
                head_left,
                head_right,
                color,
                thickness,
            });
        }

        // Live preview while a connect drag is in progress.
        let preview = if let Pointer::Connecting { source, cursor } = &self.pointer {
            self.positions.get(source).map(|pos| {
                let a = self.to_screen(*pos);
                (a, *cursor)
            })
        } else {
            None
        };

        let edges_canvas = canvas(
            |_bounds, _window, _cx| (),
            move |bounds, _state, window, _cx| {
                let offset = bounds.origin;

                let draw_segment = |path: &mut gpui::Path<Pixels>,
                                    p1: Point<Pixels>,
                                    p2: Point<Pixels>,
                                    half_thickness: f32| {
                    let dir = point(p2.x - p1.x, p2.y - p1.y);
                    let len = dir.magnitude() as f32;
                    if len <= 0.0001 {
                        return;
                    }
                    let normal = point(-dir.y, dir.x) * (half_thickness / len);

                    let p1a = point(p1.x + normal.x, p1.y + normal.y);
                    let p1b = point(p1.x - normal.x, p1.y - normal.y);
                    let p2a = point(p2.x + normal.x, p2.y + normal.y);
                    let p2b = point(p2.x - normal.x, p2.y - normal.y);

                    let st = (point(0., 1.), point(0., 1.), point(0., 1.));
                    path.push_triangle((p1a, p1b, p2a), st);
                    path.push_triangle((p2a, p1b, p2b), st);
                };
                let shift =
                    |p: Point<Pixels>| point(offset.x + p.x, offset.y + p.y);

                for stroke in &strokes {
                    let mut path = gpui::Path::new(shift(stroke.p1));
                    draw_segment(
                        &mut path,
                        shift(stroke.p1),
                        shift(stroke.p2),
                        stroke.thickness / 2.0,
                    );
                    let st = (point(0., 1.), point(0., 1.), point(0., 1.));
                    path.push_triangle(
                        (
                            shift(stroke.tip),
                            shift(stroke.head_left),
                            shift(stroke.head_right),
                        ),
                        st,
                    );
                    window.paint_path(path, stroke.color);
                }

                if let Some((from, to)) = preview {
                    let mut path = gpui::Path::new(shift(from));
                    draw_segment(&mut path, shift(from), shift(to), 1.0);
                    window.paint_path(path, rgba(0x94a3b8aa));
                }
            },
        )
        .absolute()
        .size_full();

        // Physics frames while the force layout is settling.
        let handle_for_sim = cx.entity();
        let sim_canvas = canvas(
            |_bounds, _window, _cx| (),
            move |_bounds, _state, window, cx| {
                let active = cx.read_entity(&handle_for_sim, |canvas: &WorkflowCanvas, _| {
                    canvas.settling && canvas.layout == CanvasLayout::Force
                });
                if !active {
                    return;
                }
                window.request_animation_frame();
                cx.update_entity(&handle_for_sim, |canvas, _| canvas.step_simulation());
                cx.notify(handle_for_sim.entity_id());
            },
        )
        .absolute()
        .size_full();

        // Node circles with a label underneath and a connect handle on the
        // right edge. Plain divs; all pointer handling stays on the
        // container so hit testing and gesture state live in one place.
        let node_divs: Vec<Div> = self
            .nodes
            .iter()
            .filter_map(|node| {
                let pos = self.positions.get(&node.id)?;
                let center = self.to_screen(*pos);
                let r = NODE_RADIUS * self.zoom;
                let wrap_half = 60.0 * self.zoom;
                let selected =
                    matches!(&self.selection, Some(Selection::Node(id)) if id == &node.id);
                Some(
                    div()
                        .absolute()
                        .left(center.x - px(wrap_half))
                        .top(center.y - px(r))
                        .w(px(wrap_half * 2.0))
                        .flex()
                        .flex_col()
                        .items_center()
                        .child(
                            div()
                                .size(px(r * 2.0))
                                .rounded_full()
                                .bg(zone_color(node.zone))
                                .border(px(if selected { 3.0 } else { 1.5 }))
                                .border_color(if selected {
                                    rgba(0xffffffff)
                                } else {
                                    rgba(0xffffff55)
                                }),
                        )
                        .child(
                            div()
                                .mt(px(2.0))
                                .text_size(px((11.0 * self.zoom).max(9.0)))
                                .text_color(rgb(0xe2e8f0))
                                .child(node.label.clone()),
                        )
                        .child(
                            // connect handle
                            div()
                                .absolute()
                                .left(px(wrap_half + r - 4.0))
                                .top(px(r - 4.0))
                                .size(px(8.0))
                                .rounded_full()
                                .bg(rgb(0x94a3b8))
                                .border(px(1.0))
                                .border_color(rgb(0x0f172a)),
                        ),
                )
            })
            .collect();

        let tooltip = self.hover.as_ref().map(|hover| {
            div()
                .absolute()
                .left(hover.position.x + px(12.0))
                .top(hover.position.y + px(14.0))
                .max_w(px(280.0))
                .p(px(8.0))
                .bg(rgb(0x1f2937))
                .border(px(1.0))
                .border_color(rgb(0x374151))
                .rounded(px(6.0))
                .text_color(rgb(0xf9fafb))
                .text_size(px(12.0))
                .flex()
                .flex_col()
                .gap(px(2.0))
                .child(div().font_weight(FontWeight::BOLD).child(hover.title.clone()))
                .child(
                    div()
                        .text_color(rgb(0x9ca3af))
                        .text_size(px(11.0))
                        .child(hover.body.clone()),
                )
        });

        let placeholder = self.nodes.is_empty().then(|| {
            div()
                .absolute()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_color(rgb(0x64748b))
                .child("Canvas ready. Generate a workflow or add a node to begin.")
        });

        let zoom_percent = (self.zoom * 100.0) as i32;
        let layout_label = match self.layout {
            CanvasLayout::Force => "Layout: Force",
            CanvasLayout::Layered => "Layout: Layered",
        };
        let controls_panel = div()
            .absolute()
            .top(px(8.0))
            .left(px(8.0))
            .bg(rgba(0x0f172ae6))
            .border(px(1.0))
            .border_color(rgb(0x334155))
            .rounded(px(6.0))
            .p(px(6.0))
            .flex()
            .items_center()
            .gap_2()
            .text_color(rgb(0xe2e8f0))
            .text_size(px(12.0))
            .child(control_button("-", cx, |this, cx| {
                this.set_zoom(this.zoom - 0.1, cx);
            }))
            .child(format!("{zoom_percent}%"))
            .child(control_button("+", cx, |this, cx| {
                this.set_zoom(this.zoom + 0.1, cx);
            }))
            .child(div().w(px(8.0)))
            .child(control_button("Fit", cx, |this, cx| {
                this.fit_to_content(cx);
            }))
            .child(control_button(layout_label, cx, |this, cx| {
                let next = match this.layout {
                    CanvasLayout::Force => CanvasLayout::Layered,
                    CanvasLayout::Layered => CanvasLayout::Force,
                };
                this.set_layout(next, cx);
            }));

        div()
            .relative()
            .size_full()
            .cursor(CursorStyle::Arrow)
            .child(bounds_tracker)
            .child(sim_canvas)
            .child(edges_canvas)
            .children(node_divs)
            .when_some(placeholder, |this, p| this.child(p))
            .when_some(tooltip, |this, t| this.child(t))
            .child(controls_panel)
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, e: &MouseDownEvent, _w, cx| this.on_mouse_down(e, cx)),
            )
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, e: &MouseUpEvent, _w, cx| this.on_mouse_up(e, cx)),
            )
            .on_mouse_down(
                MouseButton::Middle,
                cx.listener(|this, e: &MouseDownEvent, _w, cx| this.on_middle_down(e, cx)),
            )
            .on_mouse_up(
                MouseButton::Middle,
                cx.listener(|this, e: &MouseUpEvent, _w, cx| this.on_mouse_up(e, cx)),
            )
            .on_mouse_move(cx.listener(|this, e: &MouseMoveEvent, _w, cx| {
                this.on_mouse_move(e, cx)
            }))
            .on_scroll_wheel(cx.listener(|this, e: &ScrollWheelEvent, _w, cx| {
                this.on_scroll_wheel(e, cx)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_model::{EdgeMetadata, NodeKind, NodeMetadata};

    #[core::prelude::v1::test]
    fn dist_to_segment_handles_interior_and_endpoints() {
        // Perpendicular drop onto the segment interior.
        let d = dist_to_segment((5.0, 3.0), (0.0, 0.0), (10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-6);
        // Beyond the end: distance to the endpoint.
        let d = dist_to_segment((13.0, 4.0), (0.0, 0.0), (10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-6);
        // Degenerate segment.
        let d = dist_to_segment((3.0, 4.0), (0.0, 0.0), (0.0, 0.0));
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[core::prelude::v1::test]
    fn hover_bodies_fall_back_when_metadata_is_empty() {
        let node = Node {
            id: "n1".into(),
            kind: NodeKind::Tool,
            label: "Search".into(),
            zone: NodeKind::Tool.default_zone(),
            metadata: NodeMetadata::default(),
        };
        assert_eq!(node_hover_body(&node), "No description available");

        let edge = Edge {
            id: "a-b".into(),
            source: "a".into(),
            target: "b".into(),
            label: "uses".into(),
            metadata: EdgeMetadata::default(),
        };
        assert_eq!(edge_hover_body(&edge), "No explanation available");

        let described = Node {
            metadata: NodeMetadata {
                description: "finds things".into(),
                ..Default::default()
            },
            ..node
        };
        assert_eq!(node_hover_body(&described), "finds things");
    }

    #[core::prelude::v1::test]
    fn drag_threshold_separates_clicks_from_drags() {
        assert!(!exceeds_drag_threshold(point(px(2.0), px(2.0))));
        assert!(exceeds_drag_threshold(point(px(5.0), px(0.0))));
    }
}
