use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowtree_core::config::ModelConfig;
use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::LlmClient;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini native API client.
pub struct GeminiClient {
    http: Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxOutputTokens")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

fn build_request(config: &ModelConfig, prompt: String) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart { text: Some(prompt) }],
        }],
        generation_config: Some(GenerationConfig {
            max_output_tokens: Some(config.max_tokens),
            temperature: if config.temperature > 0.0 {
                Some(config.temperature)
            } else {
                None
            },
        }),
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(body: &str) -> Result<String> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|e| FlowError::LlmParse(e.to_string()))?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| FlowError::LlmParse("Gemini: no candidates in response".into()))?;

    if let Some(reason) = &candidate.finish_reason {
        debug!(finish_reason = %reason, "Gemini candidate finished");
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(FlowError::LlmParse("Gemini: empty response text".into()));
    }
    Ok(text)
}

impl LlmClient for GeminiClient {
    fn complete(&self, config: &ModelConfig, prompt: String) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();

        Box::pin(async move {
            let api_key = config
                .api_key
                .as_deref()
                // An unset ${VAR} reference survives config expansion verbatim.
                .filter(|k| !k.is_empty() && !k.starts_with("${"))
                .ok_or_else(|| FlowError::Config("Gemini: api_key is required".into()))?;

            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(GEMINI_API_URL)
                .trim_end_matches('/');
            let url = format!("{}/models/{}:generateContent", base_url, config.model_id);

            let body = build_request(&config, prompt);

            let response = self
                .http
                .post(&url)
                .header("content-type", "application/json")
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| FlowError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(FlowError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let text = response
                .text()
                .await
                .map_err(|e| FlowError::LlmRequest(e.to_string()))?;
            response_text(&text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_generation_config() {
        let config = ModelConfig::default();
        let body = serde_json::to_value(build_request(&config, "hello".into())).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn zero_temperature_is_omitted() {
        let config = ModelConfig {
            temperature: 0.0,
            ..ModelConfig::default()
        };
        let body = serde_json::to_value(build_request(&config, "x".into())).unwrap();
        assert!(body["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn joins_candidate_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"questions\":"},{"text":" []}"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(response_text(body).unwrap(), "{\"questions\": []}");
    }

    #[test]
    fn empty_candidates_is_a_parse_error() {
        assert!(matches!(
            response_text(r#"{"candidates":[]}"#),
            Err(FlowError::LlmParse(_))
        ));
        assert!(matches!(
            response_text(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#),
            Err(FlowError::LlmParse(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_is_a_config_error() {
        let client = GeminiClient::new();
        let err = client
            .complete(&ModelConfig::default(), "hi".into())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }
}
