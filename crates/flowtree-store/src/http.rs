use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use tracing::debug;

use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::PersistenceGateway;
use flowtree_core::types::GraphSnapshot;
use flowtree_core::wire::SaveResponse;

/// Snapshot kept by a flowtree server behind `GET`/`POST /api/nodes`.
pub struct RemoteStore {
    http: Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn nodes_url(&self) -> String {
        format!("{}/api/nodes", self.base_url)
    }
}

/// Map a save reply onto the persistence error taxonomy.
pub(crate) fn check_save_reply(status: StatusCode, body: &str) -> Result<()> {
    let reply: SaveResponse = serde_json::from_str(body).unwrap_or_default();
    if status.is_success() && reply.success {
        return Ok(());
    }
    let reason = reply
        .error
        .unwrap_or_else(|| format!("HTTP {}", status));
    Err(FlowError::PersistenceWriteFailed(reason))
}

impl PersistenceGateway for RemoteStore {
    fn load(&self) -> BoxFuture<'_, Result<GraphSnapshot>> {
        Box::pin(async move {
            let url = self.nodes_url();
            let read_failed = |e: String| FlowError::PersistenceReadFailed(format!("{}: {}", url, e));

            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| read_failed(e.to_string()))?;
            let status = response.status();
            let body = response.text().await.map_err(|e| read_failed(e.to_string()))?;
            if !status.is_success() {
                return Err(read_failed(format!("HTTP {}: {}", status, body)));
            }
            let snapshot: GraphSnapshot =
                serde_json::from_str(&body).map_err(|e| read_failed(e.to_string()))?;
            debug!(url = %url, nodes = snapshot.nodes.len(), "Snapshot fetched");
            Ok(snapshot)
        })
    }

    fn save(&self, snapshot: GraphSnapshot) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let response = self
                .http
                .post(self.nodes_url())
                .json(&snapshot)
                .send()
                .await
                .map_err(|e| FlowError::PersistenceWriteFailed(e.to_string()))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| FlowError::PersistenceWriteFailed(e.to_string()))?;
            check_save_reply(status, &body)
        })
    }
}
