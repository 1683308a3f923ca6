use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlowError, Result};
use crate::types::Position;

/// Top-level flowtree configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

fn default_provider() -> String { "gemini".to_string() }
fn default_model_id() -> String { "gemini-1.5-flash".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.7 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 500 }
fn default_max_backoff() -> u64 { 8000 }

/// Where the graph snapshot lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the snapshot.
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Base URL of a flowtree server. When set, the CLI persists and predicts
    /// through it instead of the local file and model.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            remote_url: None,
        }
    }
}

fn default_store_path() -> String { "node_data/nodes.json".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Horizontal distance between siblings.
    #[serde(default = "default_spacing")]
    pub spacing: f64,
    /// Vertical distance from a parent to its row of children.
    #[serde(default = "default_row_gap")]
    pub row_gap: f64,
    #[serde(default = "default_root_x")]
    pub root_x: f64,
    #[serde(default = "default_root_y")]
    pub root_y: f64,
}

impl LayoutConfig {
    pub fn root_anchor(&self) -> Position {
        Position::new(self.root_x, self.root_y)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: default_spacing(),
            row_gap: default_row_gap(),
            root_x: default_root_x(),
            root_y: default_root_y(),
        }
    }
}

fn default_spacing() -> f64 { 200.0 }
fn default_row_gap() -> f64 { 150.0 }
fn default_root_x() -> f64 { 400.0 }
fn default_root_y() -> f64 { 50.0 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Delay between observing an empty tree and prompting for a scenario.
    #[serde(default = "default_auto_prompt_delay_ms")]
    pub auto_prompt_delay_ms: u64,
    /// Upper bound for a single prediction gateway call.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

impl WorkflowConfig {
    pub fn auto_prompt_delay(&self) -> Duration {
        Duration::from_millis(self.auto_prompt_delay_ms)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_prompt_delay_ms: default_auto_prompt_delay_ms(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

fn default_auto_prompt_delay_ms() -> u64 { 100 }
fn default_gateway_timeout_secs() -> u64 { 30 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String { "127.0.0.1:3000".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// Load config from `path`, falling back to defaults when the file does
    /// not exist. A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(FlowError::ConfigNotFound(p)) => {
                debug!(path = %p, "No config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Resolve the snapshot file path (expand ~).
    pub fn store_path(&self) -> PathBuf {
        let path = &self.store.path;
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Leave the reference as written if the variable is unset
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_FLOWTREE_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_FLOWTREE_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_FLOWTREE_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_FLOWTREE_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_FLOWTREE_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.provider, "gemini");
        assert_eq!(config.model.model_id, "gemini-1.5-flash");
        assert_eq!(config.store.path, "node_data/nodes.json");
        assert_eq!(config.layout.spacing, 200.0);
        assert_eq!(config.layout.row_gap, 150.0);
        assert_eq!(config.layout.root_anchor(), Position::new(400.0, 50.0));
        assert_eq!(config.workflow.auto_prompt_delay(), Duration::from_millis(100));
        assert_eq!(config.workflow.gateway_timeout(), Duration::from_secs(30));
        assert_eq!(config.gateway.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let toml_str = r#"
[model]
provider = "openai"
model_id = "gpt-4o-mini"

[layout]
spacing = 240.0

[[fallback_models]]
provider = "gemini"
model_id = "gemini-1.5-pro"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.model.max_tokens, 2048);
        assert_eq!(config.layout.spacing, 240.0);
        assert_eq!(config.layout.row_gap, 150.0);
        assert_eq!(config.fallback_models.len(), 1);
        assert_eq!(config.fallback_models[0].model_id, "gemini-1.5-pro");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_or_default(Path::new("/nonexistent/flowtree.toml")).unwrap();
        assert_eq!(config.store.path, "node_data/nodes.json");
        assert!(matches!(
            AppConfig::load(Path::new("/nonexistent/flowtree.toml")),
            Err(FlowError::ConfigNotFound(_))
        ));
    }
}
