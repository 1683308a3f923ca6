use futures::future::BoxFuture;
use reqwest::Client;
use tracing::debug;

use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::PredictionGateway;
use flowtree_core::types::{OutcomeAnalysis, OutcomeRequest};
use flowtree_core::wire::{
    analysis_from_value, questions_from_value, PredictResponse, QuestionRequest, QuestionResponse,
};

/// [`PredictionGateway`] backed by a flowtree server's `/api/ai/*` routes.
pub struct RemotePredictor {
    http: Client,
    base_url: String,
}

impl RemotePredictor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: serde::Serialize, R: serde::de::DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(reqwest::StatusCode, R)> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Prediction request");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| FlowError::GatewayUnavailable(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FlowError::GatewayUnavailable(e.to_string()))?;
        // Error replies may not follow the envelope; keep the status either way.
        let parsed = serde_json::from_str(&text).unwrap_or_default();
        Ok((status, parsed))
    }
}

fn failure(status: reqwest::StatusCode, error: Option<String>, details: Option<String>) -> FlowError {
    let mut msg = format!("HTTP {}", status);
    if let Some(error) = error {
        msg.push_str(": ");
        msg.push_str(&error);
    }
    if let Some(details) = details {
        msg.push_str(" (");
        msg.push_str(&details);
        msg.push(')');
    }
    FlowError::GatewayUnavailable(msg)
}

/// Check a questions envelope before trusting its payload.
pub(crate) fn decode_questions(status: reqwest::StatusCode, reply: QuestionResponse) -> Result<Vec<String>> {
    if !status.is_success() || reply.error.is_some() {
        return Err(failure(status, reply.error, reply.details));
    }
    if !reply.success {
        return Err(FlowError::MalformedQuestionSet("reply is not marked successful".into()));
    }
    let questions = reply
        .questions
        .ok_or_else(|| FlowError::MalformedQuestionSet("reply has no questions".into()))?;
    questions_from_value(&questions)
}

/// Check an outcome envelope before trusting its payload.
pub(crate) fn decode_analysis(status: reqwest::StatusCode, reply: PredictResponse) -> Result<OutcomeAnalysis> {
    if !status.is_success() || reply.error.is_some() {
        return Err(failure(status, reply.error, reply.details));
    }
    if !reply.success {
        return Err(FlowError::MalformedOutcomeAnalysis("reply is not marked successful".into()));
    }
    let analysis = reply
        .analysis
        .ok_or_else(|| FlowError::MalformedOutcomeAnalysis("reply has no analysis".into()))?;
    analysis_from_value(&analysis)
}

impl PredictionGateway for RemotePredictor {
    fn ask_questions(&self, topic: &str) -> BoxFuture<'_, Result<Vec<String>>> {
        let body = QuestionRequest {
            scenario: topic.to_string(),
        };
        Box::pin(async move {
            let (status, reply) = self.post::<_, QuestionResponse>("/api/ai/question", &body).await?;
            decode_questions(status, reply)
        })
    }

    fn predict_outcomes(&self, request: OutcomeRequest) -> BoxFuture<'_, Result<OutcomeAnalysis>> {
        Box::pin(async move {
            let (status, reply) = self.post::<_, PredictResponse>("/api/ai/predict", &request).await?;
            decode_analysis(status, reply)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;

    fn question_reply(value: serde_json::Value) -> QuestionResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_valid_question_envelope() {
        let reply = question_reply(json!({
            "success": true,
            "scenario": "x",
            "questions": ["a?", "b?", "c?", "d?", "e?"]
        }));
        assert_eq!(decode_questions(StatusCode::OK, reply).unwrap().len(), 5);
    }

    #[test]
    fn wrong_length_is_malformed() {
        let reply = question_reply(json!({"success": true, "questions": ["a?", "b?", "c?", "d?"]}));
        assert!(matches!(
            decode_questions(StatusCode::OK, reply),
            Err(FlowError::MalformedQuestionSet(_))
        ));
        let reply = question_reply(json!({"success": true, "questions": "a?"}));
        assert!(matches!(
            decode_questions(StatusCode::OK, reply),
            Err(FlowError::MalformedQuestionSet(_))
        ));
    }

    #[test]
    fn error_reply_is_unavailable() {
        let reply = question_reply(json!({
            "error": "Failed to generate questions",
            "details": "quota exceeded"
        }));
        let err = decode_questions(StatusCode::INTERNAL_SERVER_ERROR, reply).unwrap_err();
        match err {
            FlowError::GatewayUnavailable(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn decodes_analysis_envelope() {
        let reply: PredictResponse = serde_json::from_value(json!({
            "success": true,
            "prompt": "p",
            "decision": null,
            "analysis": {"positive_outcomes": ["good"], "recommendations": "try"}
        }))
        .unwrap();
        let analysis = decode_analysis(StatusCode::OK, reply).unwrap();
        assert_eq!(analysis.positive, vec!["good"]);
        assert_eq!(analysis.recommendation, "try");
    }

    #[test]
    fn missing_analysis_is_malformed() {
        let reply: PredictResponse = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(matches!(
            decode_analysis(StatusCode::OK, reply),
            Err(FlowError::MalformedOutcomeAnalysis(_))
        ));
    }
}
