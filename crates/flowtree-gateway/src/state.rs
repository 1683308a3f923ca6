use std::sync::Arc;
use std::time::Duration;

use flowtree_core::event::EventBus;
use flowtree_core::traits::{PersistenceGateway, PredictionGateway};

/// Shared application state for axum handlers.
pub struct AppState {
    pub persistence: Arc<dyn PersistenceGateway>,
    pub predictor: Arc<dyn PredictionGateway>,
    pub event_bus: Arc<EventBus>,
    /// Upper bound on one prediction call.
    pub predict_timeout: Duration,
}
