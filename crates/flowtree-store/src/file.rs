use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::debug;

use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::PersistenceGateway;
use flowtree_core::types::GraphSnapshot;

/// Snapshot stored as pretty-printed JSON in a single file.
///
/// Saves go to a sibling temp file that is then renamed over the target, so
/// a reader never sees a half-written graph.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "nodes.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }
}

impl PersistenceGateway for JsonFileStore {
    fn load(&self) -> BoxFuture<'_, Result<GraphSnapshot>> {
        Box::pin(async move {
            let content = match tokio::fs::read_to_string(&self.path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %self.path.display(), "No snapshot file yet");
                    return Ok(GraphSnapshot::default());
                }
                Err(e) => {
                    return Err(FlowError::PersistenceReadFailed(format!(
                        "{}: {}",
                        self.path.display(),
                        e
                    )))
                }
            };
            if content.trim().is_empty() {
                return Ok(GraphSnapshot::default());
            }
            serde_json::from_str(&content).map_err(|e| {
                FlowError::PersistenceReadFailed(format!("{}: {}", self.path.display(), e))
            })
        })
    }

    fn save(&self, snapshot: GraphSnapshot) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let write_failed =
                |e: std::io::Error| FlowError::PersistenceWriteFailed(format!("{}: {}", self.path.display(), e));

            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
            }

            let json = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| FlowError::PersistenceWriteFailed(e.to_string()))?;
            let tmp = self.temp_path();
            if let Err(e) = tokio::fs::write(&tmp, json).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(write_failed(e));
            }
            if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(write_failed(e));
            }

            debug!(
                path = %self.path.display(),
                nodes = snapshot.nodes.len(),
                edges = snapshot.edges.len(),
                "Snapshot written"
            );
            Ok(())
        })
    }
}
