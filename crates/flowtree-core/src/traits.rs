use std::time::Instant;

use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// Durable store for the full graph snapshot.
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Load the stored snapshot. A store that has never been written returns
    /// an empty snapshot.
    fn load(&self) -> BoxFuture<'_, Result<GraphSnapshot>>;

    /// Replace the stored snapshot with `snapshot`.
    fn save(&self, snapshot: GraphSnapshot) -> BoxFuture<'_, Result<()>>;
}

/// Text-generation collaborator that asks questions and predicts outcomes.
pub trait PredictionGateway: Send + Sync + 'static {
    /// Clarifying questions about `topic`. Callers validate the shape.
    fn ask_questions(&self, topic: &str) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Categorized outcome analysis for the request.
    fn predict_outcomes(&self, request: OutcomeRequest) -> BoxFuture<'_, Result<OutcomeAnalysis>>;
}

/// Single-shot text completion against a language model.
pub trait LlmClient: Send + Sync + 'static {
    /// Send one prompt and return the full text of the reply.
    fn complete(&self, config: &ModelConfig, prompt: String) -> BoxFuture<'_, Result<String>>;
}

/// Time source for debounced reactions. Injected so tests can move time by hand.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
