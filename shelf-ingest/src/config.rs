//! Runtime configuration resolution for shelf-ingest
//!
//! API keys resolve with ENV → TOML priority. Keys are optional: Google Books
//! works unauthenticated at a lower quota, and web search engines without a
//! key are simply not queried.

use crate::reconcile::ReconcileOptions;
use crate::sources::web_search::WebSearchKeys;
use shelf_common::config::{
    GoogleBooksConfig, LlmConfig, LlmProvider, TomlConfig, WebSearchConfig,
};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GOOGLE_BOOKS_KEY_ENV: &str = "GOOGLE_BOOKS_API_KEY";
pub const BING_KEY_ENV: &str = "BING_API_KEY";
pub const SERP_KEY_ENV: &str = "SERP_API_KEY";
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Resolve one API key from environment, then TOML
///
/// Warns when both are set, since the TOML value is then ignored.
pub fn resolve_api_key(label: &str, env_var: &str, toml_key: Option<&str>) -> Option<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} API key found in both {} and TOML config. Using environment (highest priority).",
            label, env_var
        );
    }

    if let Some(key) = env_key {
        info!("{} API key loaded from environment variable", label);
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("{} API key loaded from TOML config", label);
        return Some(key.to_string());
    }

    debug!("{} API key not configured", label);
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

pub fn resolve_google_books_key(config: &GoogleBooksConfig) -> Option<String> {
    resolve_api_key("Google Books", GOOGLE_BOOKS_KEY_ENV, config.api_key.as_deref())
}

pub fn resolve_web_search_keys(config: &WebSearchConfig) -> WebSearchKeys {
    WebSearchKeys {
        bing: resolve_api_key("Bing", BING_KEY_ENV, config.bing_api_key.as_deref()),
        serp: resolve_api_key("SerpAPI", SERP_KEY_ENV, config.serp_api_key.as_deref()),
    }
}

/// Key for the configured model provider; local Ollama needs none
pub fn resolve_llm_key(config: &LlmConfig) -> Option<String> {
    let toml_key = config.api_key.as_deref();
    match config.provider {
        LlmProvider::Ollama => toml_key.filter(|k| is_valid_key(k)).map(str::to_string),
        LlmProvider::OpenAi => resolve_api_key("OpenAI", OPENAI_KEY_ENV, toml_key),
        LlmProvider::Anthropic => resolve_api_key("Anthropic", ANTHROPIC_KEY_ENV, toml_key),
    }
}

/// Orchestrator options from the `[reconcile]` section
pub fn reconcile_options(config: &TomlConfig) -> ReconcileOptions {
    let reconcile = &config.reconcile;
    ReconcileOptions {
        query_mode: reconcile.query_mode,
        date_policy: reconcile.date_policy,
        source_timeout: Duration::from_secs(reconcile.source_timeout_secs.max(1)),
        batch_concurrency: reconcile.batch_concurrency.max(1),
    }
}
