use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use flowtree_core::error::FlowError;
use flowtree_core::event::EventBus;
use flowtree_core::traits::PersistenceGateway;
use flowtree_core::types::{FlowEvent, GraphSnapshot};

enum WriteCommand {
    Save(GraphSnapshot),
    Flush(oneshot::Sender<()>),
}

/// Background writer that saves snapshots in the order they were queued.
///
/// A failed save is logged and published as `FlowEvent::SaveFailed`; it is
/// not retried. The next queued snapshot carries the full graph, so one
/// successful write brings the store back in sync.
#[derive(Clone)]
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl SnapshotWriter {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(persistence: Arc<dyn PersistenceGateway>, event_bus: Arc<EventBus>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteCommand>();

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    WriteCommand::Save(snapshot) => {
                        let nodes = snapshot.nodes.len();
                        let edges = snapshot.edges.len();
                        match persistence.save(snapshot).await {
                            Ok(()) => {
                                debug!(nodes, edges, "Snapshot saved");
                                event_bus.publish(FlowEvent::Saved { nodes, edges });
                            }
                            Err(e) => {
                                let e = match e {
                                    FlowError::PersistenceWriteFailed(_) => e,
                                    other => FlowError::PersistenceWriteFailed(other.to_string()),
                                };
                                error!(error = %e, nodes, edges, "Snapshot save failed");
                                event_bus.publish(FlowEvent::SaveFailed {
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                    WriteCommand::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Snapshot writer stopped");
        });

        Self { tx }
    }

    /// Queue a full snapshot for saving. Never blocks.
    pub fn enqueue(&self, snapshot: GraphSnapshot) {
        if self.tx.send(WriteCommand::Save(snapshot)).is_err() {
            warn!("Snapshot writer is gone, save dropped");
        }
    }

    /// Wait until every snapshot queued so far has been handled.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtree_test_utils::{sample_snapshot, MemoryStore};

    #[tokio::test]
    async fn saves_in_queue_order() {
        let store = Arc::new(MemoryStore::new());
        let writer = SnapshotWriter::spawn(store.clone(), Arc::new(EventBus::default()));

        let first = GraphSnapshot::default();
        let second = sample_snapshot();
        writer.enqueue(first.clone());
        writer.enqueue(second.clone());
        writer.flush().await;

        assert_eq!(store.saved(), vec![first, second.clone()]);
        assert_eq!(store.current(), second);
    }

    #[tokio::test]
    async fn failed_save_is_published() {
        let store = Arc::new(MemoryStore::new());
        store.fail_saves(true);
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let writer = SnapshotWriter::spawn(store.clone(), bus);

        writer.enqueue(sample_snapshot());
        writer.flush().await;

        match rx.recv().await.unwrap() {
            FlowEvent::SaveFailed { error } => assert!(error.contains("Persistence write failed")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(store.saved().is_empty());
    }
}
