//! Configuration resolution and graceful degradation
//!
//! Tests that touch SHELF_CONFIG or SHELF_LIBRARY are marked #[serial] so
//! environment changes never race.

use serial_test::serial;
use shelf_common::config::{
    load_config, resolve_library_path, DatePolicy, LlmProvider, QueryMode, TomlConfig,
    CONFIG_ENV_VAR, LIBRARY_ENV_VAR,
};
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();

    let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.server.port, 5731);
    assert_eq!(config.reconcile.batch_concurrency, 4);
}

#[test]
#[serial]
fn test_env_var_names_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shelf.toml");
    std::fs::write(
        &path,
        r#"
        [logging]
        level = "debug"

        [reconcile]
        query_mode = "concurrent"
        date_policy = "trusted_override"
        source_timeout_secs = 5
        "#,
    )
    .unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = load_config(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.reconcile.query_mode, QueryMode::Concurrent);
    assert_eq!(config.reconcile.date_policy, DatePolicy::TrustedOverride);
    assert_eq!(config.reconcile.source_timeout_secs, 5);
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    let dir = TempDir::new().unwrap();
    let cli = dir.path().join("cli.toml");
    let from_env = dir.path().join("env.toml");
    std::fs::write(&cli, "[server]\nport = 6000\n").unwrap();
    std::fs::write(&from_env, "[server]\nport = 7000\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &from_env);
    let config = load_config(Some(&cli)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.server.port, 6000);
}

#[test]
#[serial]
fn test_malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[reconcile\nsources = 3").unwrap();

    assert!(load_config(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_library_path_priority() {
    let mut config = TomlConfig::default();
    config.library_path = Some(PathBuf::from("/tmp/shelf-toml/books.json"));

    env::remove_var(LIBRARY_ENV_VAR);
    assert_eq!(
        resolve_library_path(None, &config),
        PathBuf::from("/tmp/shelf-toml/books.json")
    );

    env::set_var(LIBRARY_ENV_VAR, "/tmp/shelf-env/books.json");
    assert_eq!(
        resolve_library_path(None, &config),
        PathBuf::from("/tmp/shelf-env/books.json")
    );

    let cli = Path::new("/tmp/shelf-cli/books.json");
    assert_eq!(resolve_library_path(Some(cli), &config), cli);
    env::remove_var(LIBRARY_ENV_VAR);
}

#[test]
#[serial]
fn test_library_path_default_is_json_file() {
    env::remove_var(LIBRARY_ENV_VAR);
    let path = resolve_library_path(None, &TomlConfig::default());
    assert_eq!(path.file_name().unwrap(), "books.json");
}

#[test]
fn test_llm_section_selects_provider_endpoint() {
    let config: TomlConfig = toml::from_str(
        r#"
        [llm]
        provider = "anthropic"
        model = "claude-test"
        "#,
    )
    .unwrap();

    assert_eq!(config.llm.provider, LlmProvider::Anthropic);
    assert_eq!(config.llm.model, "claude-test");
    assert_eq!(config.llm.resolved_base_url(), "https://api.anthropic.com/v1");

    let config: TomlConfig = toml::from_str(
        r#"
        [llm]
        provider = "openai"
        base_url = "http://127.0.0.1:9000/v1"
        "#,
    )
    .unwrap();
    assert_eq!(config.llm.provider, LlmProvider::OpenAi);
    assert_eq!(config.llm.resolved_base_url(), "http://127.0.0.1:9000/v1");

    let defaults = TomlConfig::default();
    assert_eq!(defaults.llm.provider, LlmProvider::Ollama);
    assert_eq!(defaults.llm.resolved_base_url(), "http://localhost:11434");
}
