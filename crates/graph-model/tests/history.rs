use graph_model::{Edge, EdgeMetadata, GraphStore, Node, NodeKind, NodeMetadata, Zone};

fn node(id: &str, kind: NodeKind) -> Node {
    Node {
        id: id.to_string(),
        kind,
        label: id.to_string(),
        zone: kind.default_zone(),
        metadata: NodeMetadata::default(),
    }
}

fn edge(source: &str, target: &str) -> Edge {
    Edge {
        id: format!("{source}-{target}"),
        source: source.to_string(),
        target: target.to_string(),
        label: "uses".to_string(),
        metadata: EdgeMetadata::default(),
    }
}

#[test]
fn add_node_end_to_end() {
    let mut store = GraphStore::new();
    let created = store.add_node(NodeKind::Agent, "Classifier").clone();

    assert_eq!(created.zone, Zone::Reasoning);
    assert_eq!(created.label, "Classifier");
    assert_eq!(store.nodes().len(), 1);
    assert_eq!(store.edges().len(), 0);
    assert_eq!(store.history_len(), 2, "initial empty state + one mutation");
}

#[test]
fn add_edge_undo_redo_round_trip() {
    let mut store = GraphStore::new();
    store.replace_graph(
        vec![node("A", NodeKind::Agent), node("B", NodeKind::Tool)],
        Vec::new(),
    );

    let created = store.add_edge("A", "B", Some("uses")).unwrap().clone();
    assert_eq!(created.id, "A-B");
    assert_eq!(created.label, "uses");

    assert!(store.undo());
    assert_eq!(store.edges().len(), 0);
    assert_eq!(store.nodes().len(), 2);

    assert!(store.redo());
    assert_eq!(store.edges().len(), 1);
    assert_eq!(store.edges()[0].id, "A-B");
}

#[test]
fn undo_restores_exact_prior_state() {
    let mut store = GraphStore::new();
    store.replace_graph(
        vec![node("A", NodeKind::Agent), node("B", NodeKind::Tool)],
        vec![edge("A", "B")],
    );
    let nodes_before = store.nodes().to_vec();
    let edges_before = store.edges().to_vec();

    store.delete_node("A").unwrap();
    assert_ne!(store.nodes(), nodes_before.as_slice());

    assert!(store.undo());
    assert_eq!(store.nodes(), nodes_before.as_slice());
    assert_eq!(store.edges(), edges_before.as_slice());
}

#[test]
fn new_mutation_after_undo_discards_redo_branch() {
    let mut store = GraphStore::new();
    store.add_node(NodeKind::Agent, "first");
    store.add_node(NodeKind::Tool, "second");

    assert!(store.undo());
    assert_eq!(store.nodes().len(), 1);

    store.add_node(NodeKind::Db, "replacement");
    assert_eq!(store.nodes().len(), 2);

    // The discarded branch is gone: redo after the new mutation is a no-op.
    assert!(!store.redo());
    assert_eq!(store.nodes().len(), 2);
    assert_eq!(store.nodes()[1].label, "replacement");
}

#[test]
fn undo_redo_are_noops_at_history_boundaries() {
    let mut store = GraphStore::new();
    assert!(!store.undo());
    assert!(!store.redo());

    store.add_node(NodeKind::Agent, "only");
    assert!(!store.redo(), "cursor already at tail");
    assert!(store.undo());
    assert!(!store.undo(), "cursor already at start");
}

#[test]
fn no_dangling_edges_after_any_operation_sequence() {
    let mut store = GraphStore::new();
    store.replace_graph(
        vec![
            node("A", NodeKind::Input),
            node("B", NodeKind::Agent),
            node("C", NodeKind::Tool),
            node("D", NodeKind::Output),
        ],
        Vec::new(),
    );
    store.add_edge("A", "B", None).unwrap();
    assert!(store.is_consistent());
    store.add_edge("B", "C", None).unwrap();
    assert!(store.is_consistent());
    store.add_edge("C", "D", Some("result")).unwrap();
    assert!(store.is_consistent());

    store.delete_node("C").unwrap();
    assert!(store.is_consistent());
    assert_eq!(store.edges().len(), 1, "only A-B survives");

    store.delete_edge("A-B").unwrap();
    assert!(store.is_consistent());
    store.undo();
    assert!(store.is_consistent());
    store.undo();
    assert!(store.is_consistent());
    store.redo();
    assert!(store.is_consistent());
}

#[test]
fn replace_is_all_or_nothing_per_edge() {
    let mut store = GraphStore::new();
    store.add_node(NodeKind::Agent, "existing");
    let prior_nodes = store.nodes().to_vec();

    // Replacement with one valid and one dangling edge: the dangling edge
    // alone is dropped, the rest of the payload applies.
    let outcome = store.replace_graph(
        vec![node("X", NodeKind::Agent), node("Y", NodeKind::Tool)],
        vec![edge("X", "Y"), edge("X", "missing")],
    );
    assert_eq!(outcome.applied_edges, 1);
    assert_eq!(outcome.dropped_edges, 1);
    assert_ne!(store.nodes(), prior_nodes.as_slice());
    assert!(store.is_consistent());

    // The swap is a single history entry.
    assert!(store.undo());
    assert_eq!(store.nodes(), prior_nodes.as_slice());
}
