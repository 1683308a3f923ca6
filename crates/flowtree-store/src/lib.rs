//! Durable homes for the graph snapshot: a local JSON file or a flowtree
//! server's `/api/nodes` endpoint.

pub mod file;
pub mod http;

use std::sync::Arc;

use flowtree_core::config::AppConfig;
use flowtree_core::traits::PersistenceGateway;

pub use file::JsonFileStore;
pub use http::RemoteStore;

/// The store selected by configuration: remote when `store.remote_url` is
/// set, otherwise the JSON file at `store.path`.
pub fn from_config(config: &AppConfig) -> Arc<dyn PersistenceGateway> {
    match &config.store.remote_url {
        Some(url) => Arc::new(RemoteStore::new(url.clone())),
        None => Arc::new(JsonFileStore::new(config.store_path())),
    }
}
