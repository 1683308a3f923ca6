use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use flowtree_core::config::GatewayConfig;

use crate::routes;
use crate::state::AppState;

/// All routes with permissive CORS, for serving or for driving in tests.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/nodes", get(routes::get_nodes).post(routes::put_nodes))
        .route("/api/ai/question", post(routes::ask_questions))
        .route("/api/ai/predict", post(routes::predict_outcomes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server exposing the graph store and the prediction collaborator.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Run the server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
