use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use flowtree_core::error::{FlowError, Result};
use flowtree_core::event::EventBus;
use flowtree_core::traits::PersistenceGateway;
use flowtree_core::types::*;

use crate::layout::LayoutEngine;
use crate::writer::SnapshotWriter;

struct GraphState {
    snapshot: GraphSnapshot,
    /// Highest id ever assigned. Ids are never reused.
    high_water: u64,
    selected_edge: Option<EdgeId>,
}

/// Owner of the live decision tree.
///
/// Mutations are serialized by an internal lock. Each committed mutation is
/// published as `FlowEvent::SnapshotUpdated` and queued for exactly one save
/// of the full resulting snapshot.
pub struct GraphStore {
    state: Mutex<GraphState>,
    layout: LayoutEngine,
    writer: SnapshotWriter,
    event_bus: Arc<EventBus>,
}

impl GraphStore {
    /// Create a store over an already loaded snapshot. Must be called inside a
    /// tokio runtime (the snapshot writer is spawned here).
    pub fn new(
        snapshot: GraphSnapshot,
        persistence: Arc<dyn PersistenceGateway>,
        layout: LayoutEngine,
        event_bus: Arc<EventBus>,
    ) -> Self {
        for problem in check_tree(&snapshot) {
            warn!(problem = %problem, "Loaded graph violates tree shape");
        }
        let high_water = snapshot.max_numeric_id();
        let writer = SnapshotWriter::spawn(persistence, event_bus.clone());
        Self {
            state: Mutex::new(GraphState {
                snapshot,
                high_water,
                selected_edge: None,
            }),
            layout,
            writer,
            event_bus,
        }
    }

    /// Load the durable snapshot and build a store over it.
    ///
    /// A read failure is returned rather than treated as an empty tree: the
    /// first mutation would otherwise save over the durable copy. A missing
    /// file is not a failure (the persistence layer loads it as empty).
    pub async fn hydrate(
        persistence: Arc<dyn PersistenceGateway>,
        layout: LayoutEngine,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let snapshot = persistence.load().await.inspect_err(|e| {
            error!(error = %e, "Failed to load graph, refusing to start over it");
        })?;
        info!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "Graph hydrated"
        );
        Ok(Self::new(snapshot, persistence, layout, event_bus))
    }

    fn state(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish and queue a committed snapshot. Called with the lock held so
    /// saves are queued in commit order.
    fn commit(&self, snapshot: &GraphSnapshot) {
        self.event_bus
            .publish(FlowEvent::SnapshotUpdated(snapshot.clone()));
        self.writer.enqueue(snapshot.clone());
    }

    /// Read-only copy of the current graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.state().snapshot.clone()
    }

    pub fn node_count(&self) -> usize {
        self.state().snapshot.nodes.len()
    }

    pub fn node(&self, id: &NodeId) -> Option<Node> {
        self.state().snapshot.node(id).cloned()
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Create the first node. Only legal on an empty graph.
    pub fn create_root(&self, draft: NodeDraft) -> Result<GraphSnapshot> {
        self.create_root_with_children(draft, Vec::new())
    }

    /// Create the first node and attach `children` to it as one mutation with
    /// one save.
    pub fn create_root_with_children(
        &self,
        draft: NodeDraft,
        children: Vec<ChildDraft>,
    ) -> Result<GraphSnapshot> {
        let mut state = self.state();
        if !state.snapshot.nodes.is_empty() {
            return Err(FlowError::GraphNotEmpty);
        }

        state.high_water += 1;
        let root_id = NodeId::from_number(state.high_water);
        let root = Node {
            id: root_id.clone(),
            position: self.layout.root_position(),
            label: draft.label,
            kind: NodeKind::Root,
            tone: draft.tone,
        };
        let positions = self.layout.layout_children(&root, &[], children.len());
        state.snapshot.nodes.push(root);
        attach_children(&mut state, &root_id, children, &positions);

        info!(
            root = %root_id,
            nodes = state.snapshot.nodes.len(),
            "Root created"
        );
        let snapshot = state.snapshot.clone();
        self.commit(&snapshot);
        Ok(snapshot)
    }

    /// Attach one new leaf per draft under `parent` and re-center the whole
    /// sibling row. A `leaf` parent becomes a `branch`.
    pub fn insert_children(
        &self,
        parent: &NodeId,
        children: Vec<ChildDraft>,
    ) -> Result<GraphSnapshot> {
        let mut state = self.state();
        let parent_node = state
            .snapshot
            .node(parent)
            .cloned()
            .ok_or_else(|| FlowError::InvalidParent(parent.to_string()))?;

        if children.is_empty() {
            debug!(parent = %parent, "No children to insert");
            return Ok(state.snapshot.clone());
        }

        let (existing_ids, positions) = {
            let existing = state.snapshot.children_of(parent);
            let ids: Vec<NodeId> = existing.iter().map(|n| n.id.clone()).collect();
            let positions = self
                .layout
                .layout_children(&parent_node, &existing, children.len());
            (ids, positions)
        };
        let (old_positions, new_positions) = positions.split_at(existing_ids.len());

        for (id, position) in existing_ids.iter().zip(old_positions) {
            if let Some(node) = state.snapshot.nodes.iter_mut().find(|n| &n.id == id) {
                node.position = *position;
            }
        }

        let added = children.len();
        attach_children(&mut state, parent, children, new_positions);

        if let Some(node) = state.snapshot.nodes.iter_mut().find(|n| &n.id == parent) {
            if node.kind == NodeKind::Leaf {
                node.kind = NodeKind::Branch;
            }
        }

        info!(
            parent = %parent,
            added,
            siblings = existing_ids.len() + added,
            "Children inserted"
        );
        let snapshot = state.snapshot.clone();
        self.commit(&snapshot);
        Ok(snapshot)
    }

    /// Move one node. No structural change.
    pub fn reposition(&self, node_id: &NodeId, position: Position) -> Result<GraphSnapshot> {
        let mut state = self.state();
        let node = state
            .snapshot
            .nodes
            .iter_mut()
            .find(|n| &n.id == node_id)
            .ok_or_else(|| FlowError::UnknownNode(node_id.to_string()))?;
        node.position = position;

        debug!(node = %node_id, x = position.x, y = position.y, "Node repositioned");
        let snapshot = state.snapshot.clone();
        self.commit(&snapshot);
        Ok(snapshot)
    }

    /// Mark an edge as selected. UI state only: nothing is saved.
    pub fn select_edge(&self, edge_id: &EdgeId) -> Result<()> {
        let mut state = self.state();
        if state.snapshot.edge(edge_id).is_none() {
            return Err(FlowError::UnknownEdge(edge_id.to_string()));
        }
        state.selected_edge = Some(edge_id.clone());
        self.event_bus.publish(FlowEvent::EdgeSelected(edge_id.clone()));
        Ok(())
    }

    pub fn selected_edge(&self) -> Option<EdgeId> {
        self.state().selected_edge.clone()
    }

    /// Wait for every queued save to finish.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }
}

fn attach_children(
    state: &mut GraphState,
    parent: &NodeId,
    children: Vec<ChildDraft>,
    positions: &[Position],
) {
    for (child, position) in children.into_iter().zip(positions) {
        state.high_water += 1;
        let id = NodeId::from_number(state.high_water);
        state.snapshot.nodes.push(Node {
            id: id.clone(),
            position: *position,
            label: child.node.label,
            kind: NodeKind::Leaf,
            tone: child.node.tone,
        });
        state
            .snapshot
            .edges
            .push(Edge::new(parent.clone(), id, child.edge.emphasized));
    }
}

/// Describe every way `snapshot` fails to be a single tree: dangling edge
/// ends, nodes with more than one parent, duplicate ids, and a root count
/// other than one.
pub fn check_tree(snapshot: &GraphSnapshot) -> Vec<String> {
    let mut problems = Vec::new();
    if snapshot.nodes.is_empty() {
        if !snapshot.edges.is_empty() {
            problems.push(format!("{} edges in a graph with no nodes", snapshot.edges.len()));
        }
        return problems;
    }

    let mut ids = HashSet::new();
    for node in &snapshot.nodes {
        if !ids.insert(&node.id) {
            problems.push(format!("duplicate node id {}", node.id));
        }
    }

    let mut in_degree: HashMap<&NodeId, usize> = HashMap::new();
    for edge in &snapshot.edges {
        if !ids.contains(&edge.source) {
            problems.push(format!("edge {} has unknown source {}", edge.id, edge.source));
        }
        if !ids.contains(&edge.target) {
            problems.push(format!("edge {} has unknown target {}", edge.id, edge.target));
        }
        *in_degree.entry(&edge.target).or_default() += 1;
    }

    for (target, degree) in &in_degree {
        if *degree > 1 {
            problems.push(format!("node {} has {} parents", target, degree));
        }
    }

    let roots = snapshot
        .nodes
        .iter()
        .filter(|n| !in_degree.contains_key(&n.id))
        .count();
    if roots != 1 {
        problems.push(format!("expected exactly one root, found {}", roots));
    }

    problems
}
