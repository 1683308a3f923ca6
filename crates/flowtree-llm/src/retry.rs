use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use flowtree_core::config::{ModelConfig, RetryConfig};
use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::LlmClient;

/// An LLM client that retries failed requests and falls back to alternative providers.
pub struct RetryingClient {
    primary: Box<dyn LlmClient>,
    fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Box<dyn LlmClient>,
        fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry_config,
        }
    }
}

/// Status code of an `HTTP <code> ...` request error, as produced by the
/// providers.
fn http_status(msg: &str) -> Option<u16> {
    msg.strip_prefix("HTTP ")?
        .split(|c: char| !c.is_ascii_digit())
        .next()?
        .parse()
        .ok()
}

fn is_retryable(e: &FlowError) -> bool {
    let FlowError::LlmRequest(msg) = e else {
        return false;
    };
    match http_status(msg) {
        Some(status) => status == 429 || (500..600).contains(&status),
        None => {
            let msg = msg.to_ascii_lowercase();
            msg.contains("timed out") || msg.contains("timeout") || msg.contains("connection")
        }
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl RetryingClient {
    /// One model, retried with backoff while the error is transient.
    async fn complete_with_retries(
        &self,
        client: &dyn LlmClient,
        config: &ModelConfig,
        prompt: &str,
    ) -> Result<String> {
        let max_retries = self.retry_config.max_retries;
        let mut attempt = 0;
        loop {
            let err = match client.complete(config, prompt.to_string()).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };
            if attempt >= max_retries || !is_retryable(&err) {
                return Err(err);
            }
            let backoff = calculate_backoff(attempt, &self.retry_config);
            warn!(
                model = %config.model_id,
                attempt = attempt + 1,
                max_retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "Retrying completion"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

impl LlmClient for RetryingClient {
    fn complete(&self, config: &ModelConfig, prompt: String) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();

        Box::pin(async move {
            let mut last_err = match self
                .complete_with_retries(self.primary.as_ref(), &config, &prompt)
                .await
            {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            for (fb_config, fb_client) in &self.fallbacks {
                info!(
                    model = %fb_config.model_id,
                    provider = %fb_config.provider,
                    previous_error = %last_err,
                    "Trying fallback model"
                );
                match self
                    .complete_with_retries(fb_client.as_ref(), fb_config, &prompt)
                    .await
                {
                    Ok(text) => return Ok(text),
                    Err(e) => last_err = e,
                }
            }

            Err(last_err)
        })
    }
}
