//! JSON envelopes exchanged with the HTTP collaborators.

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::fallback::QUESTION_COUNT;
use crate::types::OutcomeAnalysis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub scenario: String,
}

/// Reply of the questions endpoint. `questions` stays untyped until
/// [`questions_from_value`] has checked it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Reply of the persistence write endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check that a question list has exactly five non-blank entries.
pub fn validate_questions(questions: Vec<String>) -> Result<Vec<String>> {
    if questions.len() != QUESTION_COUNT {
        return Err(FlowError::MalformedQuestionSet(format!(
            "expected {} questions, got {}",
            QUESTION_COUNT,
            questions.len()
        )));
    }
    if questions.iter().any(|q| q.trim().is_empty()) {
        return Err(FlowError::MalformedQuestionSet(
            "question list contains a blank entry".into(),
        ));
    }
    Ok(questions.into_iter().map(|q| q.trim().to_string()).collect())
}

/// Decode an untyped `questions` value: it must be an array of strings of
/// the expected length.
pub fn questions_from_value(value: &serde_json::Value) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| FlowError::MalformedQuestionSet("questions is not an array".into()))?;

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(q) => questions.push(q.to_string()),
            None => {
                return Err(FlowError::MalformedQuestionSet(format!(
                    "non-string question: {}",
                    item
                )))
            }
        }
    }
    validate_questions(questions)
}

/// Decode an untyped analysis value. Missing fields are empty; a non-object
/// or wrongly typed field is malformed.
pub fn analysis_from_value(value: &serde_json::Value) -> Result<OutcomeAnalysis> {
    if !value.is_object() {
        return Err(FlowError::MalformedOutcomeAnalysis(
            "analysis is not an object".into(),
        ));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| FlowError::MalformedOutcomeAnalysis(e.to_string()))
}
