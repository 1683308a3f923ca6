use std::io::Write;
use std::path::Path;

use flowtree_core::config::AppConfig;
use flowtree_core::error::FlowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4o-mini"
api_key = "sk-test-key"
base_url = "http://localhost:11434/v1/chat/completions"
max_tokens = 1024
temperature = 0.3

[model.retry]
max_retries = 4
initial_backoff_ms = 250

[[fallback_models]]
provider = "gemini"
model_id = "gemini-1.5-flash"
api_key = "AIza-test"

[store]
path = "/tmp/flowtree-test/nodes.json"

[layout]
spacing = 180.0
row_gap = 120.0
root_x = 500.0
root_y = 40.0

[workflow]
auto_prompt_delay_ms = 250
gateway_timeout_secs = 10

[gateway]
bind = "0.0.0.0:9999"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert_eq!(config.model.model_id, "gpt-4o-mini");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 1024);
    assert!((config.model.temperature - 0.3).abs() < f32::EPSILON);

    let retry = config.model.retry.as_ref().expect("retry section");
    assert_eq!(retry.max_retries, 4);
    assert_eq!(retry.initial_backoff_ms, 250);
    assert_eq!(retry.max_backoff_ms, 8000);

    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "gemini");

    assert_eq!(
        config.store_path(),
        Path::new("/tmp/flowtree-test/nodes.json")
    );
    assert!(config.store.remote_url.is_none());
    assert_eq!(config.layout.spacing, 180.0);
    assert_eq!(config.layout.root_anchor().x, 500.0);
    assert_eq!(config.workflow.auto_prompt_delay_ms, 250);
    assert_eq!(config.workflow.gateway_timeout().as_secs(), 10);
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
}

#[test]
fn test_env_var_expansion_in_api_key() {
    std::env::set_var("FLOWTREE_TEST_GEMINI_KEY", "AIza-from-env");
    let toml_content = r#"
[model]
api_key = "${FLOWTREE_TEST_GEMINI_KEY}"
"#;
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(toml_content.as_bytes()).unwrap();

    let config = AppConfig::load(tmp.path()).unwrap();
    assert_eq!(config.model.api_key.as_deref(), Some("AIza-from-env"));
    assert_eq!(config.model.provider, "gemini");
    std::env::remove_var("FLOWTREE_TEST_GEMINI_KEY");
}

#[test]
fn test_remote_store_config() {
    let toml_content = r#"
[store]
remote_url = "http://127.0.0.1:3000"
"#;
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(toml_content.as_bytes()).unwrap();

    let config = AppConfig::load(tmp.path()).unwrap();
    assert_eq!(config.store.remote_url.as_deref(), Some("http://127.0.0.1:3000"));
    assert_eq!(config.store.path, "node_data/nodes.json");
}

#[test]
fn test_missing_file_is_not_found() {
    let err = AppConfig::load(Path::new("/nonexistent/flowtree.toml")).unwrap_err();
    assert!(matches!(err, FlowError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"[layout\nspacing = ").unwrap();

    let err = AppConfig::load_or_default(tmp.path()).unwrap_err();
    assert!(matches!(err, FlowError::Config(_)));
}

#[test]
fn test_resolved_config_round_trips_through_toml() {
    let config = AppConfig::default();
    let rendered = toml::to_string_pretty(&config).expect("render config");
    let reparsed: AppConfig = toml::from_str(&rendered).expect("reparse config");
    assert_eq!(reparsed.model.model_id, config.model.model_id);
    assert_eq!(reparsed.gateway.bind, config.gateway.bind);
}
