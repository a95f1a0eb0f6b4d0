use std::fmt;

use backend_client::{ChannelEvent, ClientError, GeneratedWorkflow, ReviewFeedback};
use graph_model::{Edge, GraphError, GraphStore, Node, NodeKind, Selection};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The async operations the coordinator guards, one request lane each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Generate,
    NlEdit,
    Feedback,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Generate => "generation",
            OperationKind::NlEdit => "edit",
            OperationKind::Feedback => "feedback",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Requesting,
}

/// Why a submitted intent was refused. Everything here is recoverable;
/// the shell turns these into notices.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    /// The same operation kind is already awaiting a response.
    RequestInFlight(OperationKind),
    /// The free-text input for the operation was empty.
    EmptyInput(&'static str),
    /// The operation needs a backend session and none exists yet.
    NoSession,
    /// Nothing is selected to act on.
    NoSelection,
    Graph(GraphError),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::RequestInFlight(kind) => {
                write!(f, "a {kind} request is already running")
            }
            CoordinatorError::EmptyInput(what) => write!(f, "please enter a {what} first"),
            CoordinatorError::NoSession => {
                write!(f, "generate a workflow first to start a session")
            }
            CoordinatorError::NoSelection => write!(f, "nothing is selected"),
            CoordinatorError::Graph(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for CoordinatorError {}

impl From<GraphError> for CoordinatorError {
    fn from(error: GraphError) -> Self {
        CoordinatorError::Graph(error)
    }
}

/// Mediates between the canvas, the toolbar and the backend client.
///
/// Pure state: no gpui, no I/O. The shell calls `begin_*` before
/// dispatching a request and feeds the response back through the matching
/// `complete_*`; local intents mutate the store directly. Every failure
/// becomes a dismissible notice rather than an error path the UI has to
/// unwind.
pub struct Coordinator {
    store: GraphStore,
    simulation_id: Option<String>,
    /// Bumped by `reset`; completions stamped with an older value belong
    /// to a cleared session and are dropped.
    epoch: u64,
    feedback: Option<ReviewFeedback>,
    notice: Option<String>,
    /// The lane whose failure raised the current notice, if any. A
    /// success only clears the notice its own lane raised.
    notice_source: Option<OperationKind>,
    generate: RequestState,
    nl_edit: RequestState,
    review: RequestState,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            store: GraphStore::new(),
            simulation_id: None,
            epoch: 0,
            feedback: None,
            notice: None,
            notice_source: None,
            generate: RequestState::Idle,
            nl_edit: RequestState::Idle,
            review: RequestState::Idle,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn nodes(&self) -> &[Node] {
        self.store.nodes()
    }

    pub fn edges(&self) -> &[Edge] {
        self.store.edges()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.store.selection()
    }

    pub fn simulation_id(&self) -> Option<&str> {
        self.simulation_id.as_deref()
    }

    /// Stamp for in-flight requests; pass it back to the matching
    /// `complete_*` so completions that straddle a `reset` are ignored.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn feedback(&self) -> Option<&ReviewFeedback> {
        self.feedback.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
        self.notice_source = None;
    }

    pub fn request_state(&self, kind: OperationKind) -> RequestState {
        match kind {
            OperationKind::Generate => self.generate,
            OperationKind::NlEdit => self.nl_edit,
            OperationKind::Feedback => self.review,
        }
    }

    pub fn is_requesting(&self, kind: OperationKind) -> bool {
        self.request_state(kind) == RequestState::Requesting
    }

    fn lane(&mut self, kind: OperationKind) -> &mut RequestState {
        match kind {
            OperationKind::Generate => &mut self.generate,
            OperationKind::NlEdit => &mut self.nl_edit,
            OperationKind::Feedback => &mut self.review,
        }
    }

    fn claim(&mut self, kind: OperationKind) -> Result<(), CoordinatorError> {
        let lane = self.lane(kind);
        if *lane == RequestState::Requesting {
            return Err(CoordinatorError::RequestInFlight(kind));
        }
        *lane = RequestState::Requesting;
        Ok(())
    }

    fn release(&mut self, kind: OperationKind) {
        *self.lane(kind) = RequestState::Idle;
    }

    /// Record a failed intent as a notice.
    pub fn reject(&mut self, error: CoordinatorError) {
        warn!(%error, "intent rejected");
        self.notice = Some(error.to_string());
        self.notice_source = None;
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
        self.notice_source = None;
    }

    fn fail(&mut self, kind: OperationKind, error: &ClientError) {
        warn!(%kind, %error, "request failed");
        self.notice = Some(error.to_string());
        self.notice_source = Some(kind);
    }

    /// Clear the notice only if this lane's own failure raised it.
    fn clear_notice_for(&mut self, kind: OperationKind) {
        if self.notice_source == Some(kind) {
            self.notice = None;
            self.notice_source = None;
        }
    }

    /// True when a completion was stamped before the last `reset` and
    /// must not touch the current session.
    fn is_stale(&self, epoch: u64, kind: OperationKind) -> bool {
        if epoch == self.epoch {
            return false;
        }
        debug!(epoch, current = self.epoch, %kind, "dropping completion from a cleared session");
        true
    }

    // Remote operations. `begin_*` validates and claims the request lane;
    // the returned session id is the one the request must target.

    pub fn begin_generate(&mut self, scenario_text: &str) -> Result<String, CoordinatorError> {
        if scenario_text.trim().is_empty() {
            return Err(CoordinatorError::EmptyInput("scenario description"));
        }
        self.claim(OperationKind::Generate)?;
        let id = self
            .simulation_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        info!(simulation_id = %id, "generation started");
        Ok(id)
    }

    pub fn complete_generate(&mut self, epoch: u64, result: Result<GeneratedWorkflow, ClientError>) {
        if self.is_stale(epoch, OperationKind::Generate) {
            return;
        }
        self.release(OperationKind::Generate);
        match result {
            Ok(workflow) => {
                let outcome = self
                    .store
                    .replace_graph(workflow.nodes, workflow.edges);
                self.simulation_id = Some(workflow.simulation_id);
                self.feedback = None;
                self.clear_notice_for(OperationKind::Generate);
                debug!(?outcome, "generation applied");
            }
            Err(error) => self.fail(OperationKind::Generate, &error),
        }
    }

    pub fn begin_nl_edit(&mut self, command: &str) -> Result<String, CoordinatorError> {
        if command.trim().is_empty() {
            return Err(CoordinatorError::EmptyInput("edit command"));
        }
        let id = self
            .simulation_id
            .clone()
            .ok_or(CoordinatorError::NoSession)?;
        self.claim(OperationKind::NlEdit)?;
        info!(simulation_id = %id, "natural-language edit started");
        Ok(id)
    }

    pub fn complete_nl_edit(&mut self, epoch: u64, result: Result<(Vec<Node>, Vec<Edge>), ClientError>) {
        if self.is_stale(epoch, OperationKind::NlEdit) {
            return;
        }
        self.release(OperationKind::NlEdit);
        match result {
            Ok((nodes, edges)) => {
                let outcome = self.store.replace_graph(nodes, edges);
                self.clear_notice_for(OperationKind::NlEdit);
                debug!(?outcome, "edit applied");
            }
            Err(error) => self.fail(OperationKind::NlEdit, &error),
        }
    }

    /// Claim the feedback lane; the caller sends the returned snapshot.
    pub fn begin_feedback(
        &mut self,
    ) -> Result<(String, Vec<Node>, Vec<Edge>), CoordinatorError> {
        let id = self
            .simulation_id
            .clone()
            .ok_or(CoordinatorError::NoSession)?;
        self.claim(OperationKind::Feedback)?;
        Ok((id, self.store.nodes().to_vec(), self.store.edges().to_vec()))
    }

    pub fn complete_feedback(&mut self, epoch: u64, result: Result<ReviewFeedback, ClientError>) {
        if self.is_stale(epoch, OperationKind::Feedback) {
            return;
        }
        self.release(OperationKind::Feedback);
        match result {
            Ok(feedback) => {
                self.feedback = Some(feedback);
                self.clear_notice_for(OperationKind::Feedback);
            }
            Err(error) => self.fail(OperationKind::Feedback, &error),
        }
    }

    pub fn dismiss_feedback(&mut self) {
        self.feedback = None;
    }

    // Local intents.

    /// Add a node of the given kind with a default label; returns its id.
    pub fn add_node(&mut self, kind: NodeKind) -> String {
        let node = self.store.add_node(kind, format!("New {kind}"));
        node.id.clone()
    }

    /// Delete whatever is selected, node or edge.
    pub fn delete_selected(&mut self) -> Result<(), CoordinatorError> {
        match self.store.selection().cloned() {
            Some(Selection::Node(id)) => self.store.delete_node(&id)?,
            Some(Selection::Edge(id)) => self.store.delete_edge(&id)?,
            None => return Err(CoordinatorError::NoSelection),
        }
        Ok(())
    }

    /// Apply a connect gesture (or toolbar edge) between two nodes.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<(), CoordinatorError> {
        self.store.add_edge(source, target, None)?;
        Ok(())
    }

    pub fn select(&mut self, selection: Option<Selection>) {
        self.store.select(selection);
    }

    pub fn undo(&mut self) -> bool {
        self.store.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.store.redo()
    }

    /// Apply a push-channel event. Replacement payloads win over whatever
    /// is on screen; each is its own history entry, so a racing local edit
    /// stays undoable.
    pub fn apply_push(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                debug!("push channel connected");
            }
            ChannelEvent::ArchitecturePlanned { nodes, edges } => {
                let outcome = self.store.replace_graph(nodes, edges);
                self.feedback = None;
                info!(?outcome, "planned architecture applied");
            }
            ChannelEvent::Error(error) => {
                warn!(%error, "push channel error");
                self.notice = Some(error.to_string());
            }
            ChannelEvent::Disconnected { message } => {
                debug!(%message, "push channel closed");
            }
        }
    }

    /// Clear the session. Returns the old session id so the shell can send
    /// the reset message over the channel before tearing it down.
    pub fn reset(&mut self) -> Option<String> {
        let old = self.simulation_id.take();
        self.store = GraphStore::new();
        self.epoch = self.epoch.wrapping_add(1);
        self.feedback = None;
        self.notice = None;
        self.notice_source = None;
        self.generate = RequestState::Idle;
        self.nl_edit = RequestState::Idle;
        self.review = RequestState::Idle;
        if let Some(id) = &old {
            info!(simulation_id = %id, "session reset");
        }
        old
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_model::{EdgeMetadata, NodeMetadata, Zone};

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Agent,
            label: id.to_string(),
            zone: Zone::Reasoning,
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

    fn generated(id: &str) -> GeneratedWorkflow {
        GeneratedWorkflow {
            nodes: vec![node("planner"), node("search")],
            edges: vec![edge("planner", "search")],
            simulation_id: id.to_string(),
        }
    }

    fn feedback(score: u8) -> ReviewFeedback {
        ReviewFeedback {
            score,
            violated_principles: vec![],
            missing_components: vec![],
            suggested_improvements: vec![],
            summary: "fine".into(),
        }
    }

    #[test]
    fn empty_scenario_is_rejected_before_any_request() {
        let mut c = Coordinator::new();
        assert_eq!(
            c.begin_generate("   "),
            Err(CoordinatorError::EmptyInput("scenario description"))
        );
        assert!(!c.is_requesting(OperationKind::Generate));
    }

    #[test]
    fn second_generate_while_requesting_is_rejected() {
        let mut c = Coordinator::new();
        let id = c.begin_generate("a support desk").unwrap();
        assert_eq!(
            c.begin_generate("again"),
            Err(CoordinatorError::RequestInFlight(OperationKind::Generate))
        );
        // Other lanes are independent: feedback only fails for lack of a
        // session, not because generation is running.
        assert_eq!(c.begin_feedback(), Err(CoordinatorError::NoSession));
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        assert!(!c.is_requesting(OperationKind::Generate));
    }

    #[test]
    fn generation_success_replaces_graph_and_stores_session() {
        let mut c = Coordinator::new();
        let id = c.begin_generate("research assistant").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        assert_eq!(c.nodes().len(), 2);
        assert_eq!(c.edges().len(), 1);
        assert_eq!(c.simulation_id(), Some(id.as_str()));
        assert!(c.store().is_consistent());
    }

    #[test]
    fn generation_failure_leaves_graph_untouched_and_sets_notice() {
        let mut c = Coordinator::new();
        c.add_node(NodeKind::Tool);
        let before = c.nodes().to_vec();
        c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Err(ClientError::Transport("refused".into())));
        assert_eq!(c.nodes(), before.as_slice());
        assert!(c.notice().is_some());
        assert!(!c.is_requesting(OperationKind::Generate));
    }

    #[test]
    fn session_id_is_reused_across_generations() {
        let mut c = Coordinator::new();
        let first = c.begin_generate("one").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&first)));
        let second = c.begin_generate("two").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nl_edit_requires_a_session() {
        let mut c = Coordinator::new();
        assert_eq!(
            c.begin_nl_edit("add a cache"),
            Err(CoordinatorError::NoSession)
        );
        assert_eq!(
            c.begin_nl_edit("  "),
            Err(CoordinatorError::EmptyInput("edit command"))
        );
    }

    #[test]
    fn nl_edit_success_replaces_graph() {
        let mut c = Coordinator::new();
        let id = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        c.begin_nl_edit("rename").unwrap();
        c.complete_nl_edit(c.epoch(), Ok((vec![node("solo")], vec![])));
        assert_eq!(c.nodes().len(), 1);
        assert_eq!(c.nodes()[0].id, "solo");
    }

    #[test]
    fn feedback_requires_session_and_stores_result() {
        let mut c = Coordinator::new();
        assert_eq!(c.begin_feedback(), Err(CoordinatorError::NoSession));

        let id = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        let (sent_id, nodes, edges) = c.begin_feedback().unwrap();
        assert_eq!(sent_id, id);
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        c.complete_feedback(c.epoch(), Ok(feedback(87)));
        assert_eq!(c.feedback().map(|f| f.score), Some(87));
    }

    #[test]
    fn new_generation_clears_stale_feedback() {
        let mut c = Coordinator::new();
        let id = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        c.begin_feedback().unwrap();
        c.complete_feedback(c.epoch(), Ok(feedback(50)));
        assert!(c.feedback().is_some());

        c.begin_generate("y").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        assert!(c.feedback().is_none());
    }

    #[test]
    fn delete_selected_handles_both_shapes_and_none() {
        let mut c = Coordinator::new();
        let a = c.add_node(NodeKind::Agent);
        let b = c.add_node(NodeKind::Tool);
        c.connect(&a, &b).unwrap();

        assert_eq!(
            c.delete_selected(),
            Err(CoordinatorError::NoSelection)
        );

        let edge_id = c.edges()[0].id.clone();
        c.select(Some(Selection::Edge(edge_id)));
        c.delete_selected().unwrap();
        assert!(c.edges().is_empty());

        c.select(Some(Selection::Node(a.clone())));
        c.delete_selected().unwrap();
        assert!(c.nodes().iter().all(|n| n.id != a));
        assert!(c.store().is_consistent());
    }

    #[test]
    fn duplicate_connect_surfaces_a_graph_error() {
        let mut c = Coordinator::new();
        let a = c.add_node(NodeKind::Agent);
        let b = c.add_node(NodeKind::Tool);
        c.connect(&a, &b).unwrap();
        let err = c.connect(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::Graph(GraphError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn push_replacement_and_local_edit_are_separate_history_entries() {
        let mut c = Coordinator::new();
        c.add_node(NodeKind::Agent);
        c.apply_push(ChannelEvent::ArchitecturePlanned {
            nodes: vec![node("planned")],
            edges: vec![],
        });
        assert_eq!(c.nodes()[0].id, "planned");
        // Undo the push, then the local add.
        assert!(c.undo());
        assert_eq!(c.nodes().len(), 1);
        assert_ne!(c.nodes()[0].id, "planned");
        assert!(c.undo());
        assert!(c.nodes().is_empty());
    }

    #[test]
    fn push_error_becomes_a_notice() {
        let mut c = Coordinator::new();
        c.apply_push(ChannelEvent::Error(ClientError::Channel {
            unreachable: true,
            message: "connect refused".into(),
        }));
        assert!(c.notice().is_some());
    }

    #[test]
    fn reset_clears_everything_and_reports_old_session() {
        let mut c = Coordinator::new();
        let id = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        c.begin_feedback().unwrap();
        c.complete_feedback(c.epoch(), Ok(feedback(10)));
        c.select(Some(Selection::Node("planner".into())));

        assert_eq!(c.reset(), Some(id));
        assert!(c.nodes().is_empty());
        assert!(c.edges().is_empty());
        assert!(c.selection().is_none());
        assert!(c.feedback().is_none());
        assert!(c.simulation_id().is_none());
        assert_eq!(c.reset(), None);
    }

    #[test]
    fn completion_from_before_reset_is_dropped() {
        let mut c = Coordinator::new();
        let first = c.begin_generate("one").unwrap();
        let stale_epoch = c.epoch();
        c.reset();
        let second = c.begin_generate("two").unwrap();
        assert_ne!(first, second);

        // The dead session's response arrives late: it must not touch the
        // graph, the session id, or the request lane of the live request.
        c.complete_generate(stale_epoch, Ok(generated(&first)));
        assert!(c.nodes().is_empty());
        assert_eq!(c.simulation_id(), Some(second.as_str()));
        assert!(c.is_requesting(OperationKind::Generate));
        assert_eq!(
            c.begin_generate("three"),
            Err(CoordinatorError::RequestInFlight(OperationKind::Generate))
        );

        c.complete_generate(c.epoch(), Ok(generated(&second)));
        assert!(!c.is_requesting(OperationKind::Generate));
        assert_eq!(c.nodes().len(), 2);
    }

    #[test]
    fn stale_feedback_and_edit_completions_are_dropped_too() {
        let mut c = Coordinator::new();
        let id = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        c.begin_nl_edit("tweak").unwrap();
        c.begin_feedback().unwrap();
        let stale_epoch = c.epoch();
        c.reset();

        c.complete_nl_edit(stale_epoch, Ok((vec![node("ghost")], vec![])));
        c.complete_feedback(stale_epoch, Ok(feedback(99)));
        assert!(c.nodes().is_empty());
        assert!(c.feedback().is_none());
    }

    #[test]
    fn server_assigned_session_id_replaces_client_uuid() {
        let mut c = Coordinator::new();
        let requested = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated("server-77")));
        assert_ne!(c.simulation_id(), Some(requested.as_str()));
        assert_eq!(c.simulation_id(), Some("server-77"));
        // Follow-up requests target the adopted id.
        assert_eq!(c.begin_nl_edit("tweak").unwrap(), "server-77");
    }

    #[test]
    fn unrelated_notice_survives_successful_completion() {
        let mut c = Coordinator::new();
        c.reject(CoordinatorError::NoSelection);
        let id = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        assert!(c.notice().is_some(), "someone else's notice stays up");
    }

    #[test]
    fn failure_notice_clears_on_the_same_lanes_next_success() {
        let mut c = Coordinator::new();
        c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Err(ClientError::Transport("refused".into())));
        assert!(c.notice().is_some());

        let id = c.begin_generate("x").unwrap();
        c.complete_generate(c.epoch(), Ok(generated(&id)));
        assert!(c.notice().is_none());
    }

    #[test]
    fn notices_are_dismissible() {
        let mut c = Coordinator::new();
        c.reject(CoordinatorError::NoSelection);
        assert!(c.notice().is_some());
        c.dismiss_notice();
        assert!(c.notice().is_none());
    }
}
