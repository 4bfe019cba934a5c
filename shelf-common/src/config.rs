//! Configuration loading and library path resolution
//!
//! Bootstrap configuration lives in a single TOML file. A missing file is
//! not an error: every section has built-in defaults and the tools start
//! with a warning.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `SHELF_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/shelf/shelf.toml` on Linux)
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SHELF_CONFIG";

/// Environment variable naming the library JSON file
pub const LIBRARY_ENV_VAR: &str = "SHELF_LIBRARY";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the library JSON file (optional)
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub google_books: GoogleBooksConfig,

    #[serde(default)]
    pub open_library: OpenLibraryConfig,

    #[serde(default)]
    pub web_search: WebSearchConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Whether adapters are queried one after another or all at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Each source sees the record as fused by the sources before it
    #[default]
    Sequential,
    /// All sources are queried with the seed record; fusion stays in priority order
    Concurrent,
}

/// What happens when a source proposes a date the record already has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// The first source to supply a date keeps it
    #[default]
    FirstWriterWins,
    /// An authoritative source may replace a date supplied by a corroborating one
    TrustedOverride,
}

/// Reconciliation run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub query_mode: QueryMode,

    #[serde(default)]
    pub date_policy: DatePolicy,

    /// Per-source timeout; a source that exceeds it counts as no evidence
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Number of records reconciled concurrently in a batch
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Source names in priority order
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            query_mode: QueryMode::default(),
            date_policy: DatePolicy::default(),
            source_timeout_secs: default_source_timeout_secs(),
            batch_concurrency: default_batch_concurrency(),
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Tesseract OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
    #[serde(default = "default_page_segmentation_mode")]
    pub page_segmentation_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_ocr_command(),
            language: default_ocr_language(),
            page_segmentation_mode: default_page_segmentation_mode(),
        }
    }
}

/// Vision language model (Ollama-compatible) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_vision_url")]
    pub base_url: String,
    #[serde(default = "default_vision_model")]
    pub model: String,
    /// Vision calls are slow; this replaces the run-wide source timeout
    #[serde(default = "default_vision_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_vision_url(),
            model: default_vision_model(),
            timeout_secs: default_vision_timeout_secs(),
        }
    }
}

/// Chat-style model API used for text enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Ollama,
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

/// Language model enrichment settings
///
/// Unlike `[vision]` this source also works on text-only records; the cover
/// image is attached when the record has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub provider: LlmProvider,
    /// Defaults to the provider's public endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_vision_model")]
    pub model: String,
    /// Not needed for Ollama
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_true")]
    pub attach_image: bool,
    #[serde(default = "default_vision_timeout_secs")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(self.provider.default_base_url())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::default(),
            base_url: None,
            model: default_vision_model(),
            api_key: None,
            attach_image: true,
            timeout_secs: default_vision_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleBooksConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_google_books_url")]
    pub base_url: String,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: default_google_books_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenLibraryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_open_library_url")]
    pub base_url: String,
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_open_library_url(),
        }
    }
}

/// General web search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_true")]
    pub duckduckgo: bool,
    #[serde(default)]
    pub bing_api_key: Option<String>,
    #[serde(default)]
    pub serp_api_key: Option<String>,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results: default_max_results(),
            duckduckgo: true,
            bing_api_key: None,
            serp_api_key: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_source_timeout_secs() -> u64 {
    30
}

fn default_batch_concurrency() -> usize {
    4
}

fn default_sources() -> Vec<String> {
    ["ocr", "vision", "google_books", "open_library", "web_search"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_port() -> u16 {
    5731
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_page_segmentation_mode() -> u8 {
    6 // uniform block of text
}

fn default_vision_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_vision_model() -> String {
    "gemma3:27b".to_string()
}

fn default_vision_timeout_secs() -> u64 {
    60
}

fn default_google_books_url() -> String {
    "https://www.googleapis.com/books/v1".to_string()
}

fn default_open_library_url() -> String {
    "https://openlibrary.org".to_string()
}

fn default_max_results() -> usize {
    5
}

/// Locate the config file, if any
///
/// Returns `None` when no candidate exists; callers fall back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("shelf").join("shelf.toml"))
        .filter(|p| p.exists())
}

/// Load the TOML config, falling back to defaults when the file is missing
///
/// A file that exists but does not parse is a configuration error.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using built-in defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Library JSON path resolution
///
/// 1. Command-line argument
/// 2. `SHELF_LIBRARY` environment variable
/// 3. `library_path` in the TOML config
/// 4. OS-dependent default under the local data directory
pub fn resolve_library_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(LIBRARY_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.library_path {
        return path.clone();
    }

    default_library_path()
}

/// Get OS-dependent default library path
fn default_library_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("shelf").join("books.json"))
        .unwrap_or_else(|| PathBuf::from("./shelf_data/books.json"))
}
