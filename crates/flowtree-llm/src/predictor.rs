use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use flowtree_core::config::ModelConfig;
use flowtree_core::error::Result;
use flowtree_core::traits::{LlmClient, PredictionGateway};
use flowtree_core::types::{OutcomeAnalysis, OutcomeRequest};

use crate::parse::{parse_analysis, parse_questions};
use crate::prompts::{outcome_prompt, question_prompt};

/// [`PredictionGateway`] that talks to a model directly.
///
/// Provider failures come back as `LlmRequest`/`LlmParse`/`Config` errors.
/// Replies that arrive but cannot be read come back as
/// `MalformedQuestionSet`/`MalformedOutcomeAnalysis`, so callers can tell
/// an outage from a bad answer.
pub struct LlmPredictor {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
}

impl LlmPredictor {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self { client, config }
    }
}

impl PredictionGateway for LlmPredictor {
    fn ask_questions(&self, topic: &str) -> BoxFuture<'_, Result<Vec<String>>> {
        let prompt = question_prompt(topic);
        Box::pin(async move {
            let text = self.client.complete(&self.config, prompt).await?;
            parse_questions(&text).inspect_err(|e| {
                warn!(error = %e, "Unreadable question reply");
                debug!(raw = %text, "Raw question reply");
            })
        })
    }

    fn predict_outcomes(&self, request: OutcomeRequest) -> BoxFuture<'_, Result<OutcomeAnalysis>> {
        let prompt = outcome_prompt(&request.prompt, request.decision.as_deref());
        Box::pin(async move {
            let text = self.client.complete(&self.config, prompt).await?;
            parse_analysis(&text).inspect_err(|e| {
                warn!(error = %e, "Unreadable outcome reply");
                debug!(raw = %text, "Raw outcome reply");
            })
        })
    }
}
