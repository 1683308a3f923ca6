use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use flowtree_core::error::Result;
use flowtree_core::types::{EdgeId, GraphSnapshot, NodeId, Position};
use flowtree_graph::GraphStore;

use crate::machine::{Step, WorkflowMachine};

/// Maps canvas gestures onto the graph store and the workflow.
///
/// Drags and edge selections go straight to the store. A click starts a
/// workflow unless one is already running, in which case it is dropped.
#[derive(Clone)]
pub struct GestureRouter {
    store: Arc<GraphStore>,
    machine: Arc<Mutex<WorkflowMachine>>,
}

impl GestureRouter {
    pub fn new(store: Arc<GraphStore>, machine: Arc<Mutex<WorkflowMachine>>) -> Self {
        Self { store, machine }
    }

    pub fn machine(&self) -> &Arc<Mutex<WorkflowMachine>> {
        &self.machine
    }

    /// A node was dropped at `position`.
    pub fn on_node_drag(&self, node_id: &NodeId, position: Position) -> Result<GraphSnapshot> {
        self.store.reposition(node_id, position)
    }

    /// A node was clicked. Ignored while the workflow is busy with another
    /// request.
    pub async fn on_node_click(&self, node_id: &NodeId) -> Result<Step> {
        let Ok(mut machine) = self.machine.try_lock() else {
            debug!(node = %node_id, "Workflow busy, click ignored");
            return Ok(Step::Ignored);
        };
        machine.click_node(node_id).await
    }

    /// An edge was selected.
    pub fn on_edge_select(&self, edge_id: &EdgeId) -> Result<()> {
        self.store.select_edge(edge_id)
    }
}
