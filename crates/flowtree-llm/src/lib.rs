pub mod parse;
pub mod predictor;
pub mod prompts;
pub mod providers;
pub mod remote;
pub mod retry;

use flowtree_core::config::{AppConfig, ModelConfig};
use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::LlmClient;

pub use predictor::LlmPredictor;
pub use providers::gemini::GeminiClient;
pub use providers::openai::OpenAiClient;
pub use remote::RemotePredictor;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Box::new(GeminiClient::new())),
        "openai" | "ollama" | "openai-compatible" => Ok(Box::new(OpenAiClient::new())),
        other => Err(FlowError::UnsupportedProvider(other.to_string())),
    }
}

/// Primary model wrapped with retries and the configured fallback models.
pub fn create_retrying_client(config: &AppConfig) -> Result<RetryingClient> {
    let primary = create_client(&config.model)?;
    let mut fallbacks = Vec::with_capacity(config.fallback_models.len());
    for fb in &config.fallback_models {
        fallbacks.push((fb.clone(), create_client(fb)?));
    }
    let retry = config.model.retry.clone().unwrap_or_default();
    Ok(RetryingClient::new(primary, fallbacks, retry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_resolve() {
        for provider in ["gemini", "google", "openai", "ollama"] {
            let config = ModelConfig {
                provider: provider.into(),
                ..ModelConfig::default()
            };
            assert!(create_client(&config).is_ok(), "{}", provider);
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = ModelConfig {
            provider: "carrier-pigeon".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(
            create_client(&config),
            Err(FlowError::UnsupportedProvider(p)) if p == "carrier-pigeon"
        ));
    }

    #[test]
    fn fallback_with_bad_provider_fails_fast() {
        let mut config = AppConfig::default();
        config.fallback_models.push(ModelConfig {
            provider: "nope".into(),
            ..ModelConfig::default()
        });
        assert!(create_retrying_client(&config).is_err());
    }
}
