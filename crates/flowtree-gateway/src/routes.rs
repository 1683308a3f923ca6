use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use flowtree_core::error::FlowError;
use flowtree_core::fallback::{default_questions, fallback_analysis};
use flowtree_core::types::{FlowEvent, GraphSnapshot, OutcomeRequest};
use flowtree_core::wire::{validate_questions, PredictResponse, QuestionResponse, SaveResponse};

use crate::state::AppState;

type Reply = (StatusCode, Json<Value>);

fn reply<T: serde::Serialize>(status: StatusCode, body: T) -> Reply {
    (status, Json(serde_json::to_value(body).unwrap_or(Value::Null)))
}

// GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/nodes
pub async fn get_nodes(State(state): State<Arc<AppState>>) -> Reply {
    match state.persistence.load().await {
        Ok(snapshot) => reply(StatusCode::OK, snapshot),
        Err(e) => {
            error!(error = %e, "Failed to read snapshot");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("Failed to read nodes: {}", e) }),
            )
        }
    }
}

// POST /api/nodes (replaces the stored snapshot)
pub async fn put_nodes(State(state): State<Arc<AppState>>, Json(snapshot): Json<GraphSnapshot>) -> Reply {
    let nodes = snapshot.nodes.len();
    let edges = snapshot.edges.len();
    match state.persistence.save(snapshot).await {
        Ok(()) => {
            info!(nodes, edges, "Snapshot replaced");
            state.event_bus.publish(FlowEvent::Saved { nodes, edges });
            reply(
                StatusCode::OK,
                SaveResponse {
                    success: true,
                    error: None,
                },
            )
        }
        Err(e) => {
            error!(error = %e, "Failed to write snapshot");
            state.event_bus.publish(FlowEvent::SaveFailed {
                error: e.to_string(),
            });
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                SaveResponse {
                    success: false,
                    error: Some(e.to_string()),
                },
            )
        }
    }
}

fn is_unreadable_reply(e: &FlowError) -> bool {
    matches!(
        e,
        FlowError::MalformedQuestionSet(_) | FlowError::MalformedOutcomeAnalysis(_)
    )
}

fn provider_failure(message: &str, e: &FlowError) -> Reply {
    reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": message, "details": e.to_string() }),
    )
}

#[derive(Deserialize)]
pub struct QuestionBody {
    #[serde(default)]
    pub scenario: Option<String>,
}

// POST /api/ai/question
pub async fn ask_questions(State(state): State<Arc<AppState>>, Json(body): Json<QuestionBody>) -> Reply {
    let scenario = body.scenario.unwrap_or_default();
    if scenario.trim().is_empty() {
        return reply(StatusCode::BAD_REQUEST, json!({ "error": "Scenario is required" }));
    }

    let result = match tokio::time::timeout(state.predict_timeout, state.predictor.ask_questions(&scenario)).await {
        Ok(result) => result.and_then(validate_questions),
        Err(_) => Err(FlowError::GatewayUnavailable("question request timed out".into())),
    };

    let questions = match result {
        Ok(questions) => questions,
        Err(e) if is_unreadable_reply(&e) => {
            warn!(error = %e, "Returning default questions");
            default_questions()
        }
        Err(e) => {
            error!(error = %e, "Question generation failed");
            return provider_failure("Failed to generate questions", &e);
        }
    };

    reply(
        StatusCode::OK,
        QuestionResponse {
            success: true,
            scenario: Some(scenario),
            questions: Some(json!(questions)),
            error: None,
            details: None,
        },
    )
}

#[derive(Deserialize)]
pub struct PredictBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
}

// POST /api/ai/predict
pub async fn predict_outcomes(State(state): State<Arc<AppState>>, Json(body): Json<PredictBody>) -> Reply {
    let prompt = body.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return reply(StatusCode::BAD_REQUEST, json!({ "error": "Prompt is required" }));
    }
    let decision = body.decision.filter(|d| !d.trim().is_empty());

    let request = OutcomeRequest {
        prompt: prompt.clone(),
        decision: decision.clone(),
    };
    let result = match tokio::time::timeout(state.predict_timeout, state.predictor.predict_outcomes(request)).await {
        Ok(result) => result,
        Err(_) => Err(FlowError::GatewayUnavailable("prediction request timed out".into())),
    };

    let analysis = match result {
        Ok(analysis) => analysis,
        Err(e) if is_unreadable_reply(&e) => {
            warn!(error = %e, "Returning fallback analysis");
            fallback_analysis()
        }
        Err(e) => {
            error!(error = %e, "Outcome prediction failed");
            return provider_failure("Failed to predict outcomes", &e);
        }
    };

    reply(
        StatusCode::OK,
        PredictResponse {
            success: true,
            prompt: Some(prompt),
            decision,
            analysis: serde_json::to_value(analysis).ok(),
            error: None,
            details: None,
        },
    )
}
