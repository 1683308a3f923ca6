use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use flowtree_core::config::ModelConfig;
use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::LlmClient;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request(config: &ModelConfig, prompt: String) -> ChatRequest {
    ChatRequest {
        model: config.model_id.clone(),
        messages: vec![OaiMessage {
            role: "user".to_string(),
            content: prompt,
        }],
        max_tokens: config.max_tokens,
        temperature: if config.temperature > 0.0 {
            Some(config.temperature)
        } else {
            None
        },
        stream: false,
    }
}

fn response_text(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| FlowError::LlmParse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| FlowError::LlmParse("OpenAI: empty response".into()))
}

impl LlmClient for OpenAiClient {
    fn complete(&self, config: &ModelConfig, prompt: String) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();

        Box::pin(async move {
            let base_url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
            let body = build_request(&config, prompt);

            let mut req = self.http.post(base_url).json(&body);
            if let Some(api_key) = &config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = req
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
