// Source Adapters - Evidence sources behind one contract
//
// Each adapter turns a partial record into zero or more candidates. Missing
// input is `NoEvidence`, not an error. Transport and parse failures surface as
// `Err` and the orchestrator degrades them to `NoEvidence`.

use crate::fusion::{Candidate, Tier};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use shelf_common::config::{LlmProvider, TomlConfig};
use shelf_common::BookRecord;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod cover_text;
pub mod google_books;
pub mod llm;
pub mod open_library;
pub mod tesseract;
pub mod vision;
pub mod web_search;

pub use google_books::GoogleBooksAdapter;
pub use llm::LlmAdapter;
pub use open_library::OpenLibraryAdapter;
pub use tesseract::TesseractAdapter;
pub use vision::VisionAdapter;
pub use web_search::{WebSearchAdapter, WebSearchEndpoints};

/// User agent sent to every HTTP source
pub const USER_AGENT: &str = concat!("shelf-ingest/", env!("CARGO_PKG_VERSION"));

/// What one adapter call produced
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Candidates(Vec<Candidate>),
    NoEvidence,
}

impl SourceOutcome {
    /// Wrap a candidate list, dropping candidates with no usable field
    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        let candidates: Vec<Candidate> = candidates.into_iter().filter(|c| !c.is_empty()).collect();
        if candidates.is_empty() {
            SourceOutcome::NoEvidence
        } else {
            SourceOutcome::Candidates(candidates)
        }
    }

    pub fn candidate_count(&self) -> usize {
        match self {
            SourceOutcome::Candidates(c) => c.len(),
            SourceOutcome::NoEvidence => 0,
        }
    }
}

/// Adapter trait - every evidence source implements this
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provenance name recorded on fused records (e.g. "OCR", "OpenLibrary")
    fn name(&self) -> &'static str;

    /// Query the source with the current record
    ///
    /// # Returns
    /// * `Ok(SourceOutcome)` - candidates, or `NoEvidence` when input is insufficient
    /// * `Err(_)` - source unreachable or response unparsable (degraded by the caller)
    async fn query(&self, record: &BookRecord) -> Result<SourceOutcome>;

    /// Per-source timeout overriding the run-wide one
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// An adapter plus the trust tier it was registered with
#[derive(Clone)]
pub struct RegisteredSource {
    adapter: Arc<dyn SourceAdapter>,
    tier: Tier,
}

impl RegisteredSource {
    pub fn new(adapter: Arc<dyn SourceAdapter>, tier: Tier) -> Self {
        Self { adapter, tier }
    }

    pub fn authoritative(adapter: impl SourceAdapter + 'static) -> Self {
        Self::new(Arc::new(adapter), Tier::Authoritative)
    }

    pub fn corroborating(adapter: impl SourceAdapter + 'static) -> Self {
        Self::new(Arc::new(adapter), Tier::Corroborating)
    }

    pub fn name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn adapter(&self) -> &dyn SourceAdapter {
        self.adapter.as_ref()
    }
}

impl fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("name", &self.name())
            .field("tier", &self.tier)
            .finish()
    }
}

/// Tier each configurable source is registered with
pub fn tier_for(source: &str) -> Option<Tier> {
    match source {
        "google_books" | "open_library" => Some(Tier::Authoritative),
        "ocr" | "vision" | "llm" | "web_search" => Some(Tier::Corroborating),
        _ => None,
    }
}

/// Build the adapters named in `[reconcile] sources`, in priority order
///
/// Unknown names are a configuration error. Disabled sources are skipped.
pub fn build_sources(config: &TomlConfig) -> shelf_common::Result<Vec<RegisteredSource>> {
    let mut sources = Vec::new();

    for name in &config.reconcile.sources {
        let tier = tier_for(name).ok_or_else(|| {
            shelf_common::Error::Config(format!(
                "Unknown source '{}' (expected one of ocr, vision, llm, google_books, open_library, web_search)",
                name
            ))
        })?;

        let adapter: Arc<dyn SourceAdapter> = match name.as_str() {
            "ocr" if config.ocr.enabled => Arc::new(TesseractAdapter::new(&config.ocr)),
            "vision" if config.vision.enabled => {
                Arc::new(VisionAdapter::new(&config.vision).map_err(internal)?)
            }
            "llm" if config.llm.enabled => {
                let api_key = crate::config::resolve_llm_key(&config.llm);
                if config.llm.provider != LlmProvider::Ollama && api_key.is_none() {
                    warn!(
                        source = %name,
                        provider = ?config.llm.provider,
                        "No API key for hosted model, skipping"
                    );
                    continue;
                }
                Arc::new(LlmAdapter::new(&config.llm, api_key).map_err(internal)?)
            }
            "google_books" if config.google_books.enabled => {
                let api_key = crate::config::resolve_google_books_key(&config.google_books);
                Arc::new(
                    GoogleBooksAdapter::new(&config.google_books.base_url, api_key)
                        .map_err(internal)?,
                )
            }
            "open_library" if config.open_library.enabled => {
                Arc::new(OpenLibraryAdapter::new(&config.open_library.base_url).map_err(internal)?)
            }
            "web_search" if config.web_search.enabled => {
                let keys = crate::config::resolve_web_search_keys(&config.web_search);
                Arc::new(
                    WebSearchAdapter::new(&config.web_search, keys, WebSearchEndpoints::default())
                        .map_err(internal)?,
                )
            }
            _ => {
                info!(source = %name, "Source disabled in config, skipping");
                continue;
            }
        };

        info!(source = adapter.name(), %tier, "Registered source");
        sources.push(RegisteredSource::new(adapter, tier));
    }

    Ok(sources)
}

fn internal(err: anyhow::Error) -> shelf_common::Error {
    shelf_common::Error::Internal(format!("{:#}", err))
}

/// Shared HTTP client settings for catalog and search sources
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

pub(crate) type RateLimiter = governor::DefaultDirectRateLimiter;

/// Direct (unkeyed) limiter allowing `per_second` requests per second
pub(crate) fn rate_limiter(per_second: u32) -> RateLimiter {
    let quota = governor::Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    governor::RateLimiter::direct(quota)
}

/// Outermost `{...}` object in a model reply
///
/// Models wrap JSON in prose or code fences; anything that does not parse to
/// an object yields `None`.
pub(crate) fn json_object_in(reply: &str) -> Option<Map<String, Value>> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&reply[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// String view of a reply field; arrays are joined with ", "
pub(crate) fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// First plausible year (1000-2100) mentioned in free text
pub(crate) fn year_in(text: &str) -> Option<i32> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1\d{3}|20\d{2}|2100)\b").unwrap());

    YEAR.captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<i32>().ok())
        .find(|y| (1000..=2100).contains(y))
}
