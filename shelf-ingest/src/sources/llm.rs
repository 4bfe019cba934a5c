// LLM Enrichment Adapter
//
// Asks a chat-style model to verify and complete the record fused so far.
// Works on text-only records; the cover image is attached when the record has
// one. The model is asked for the original publication year and the work's
// place of origin, which catalog editions rarely carry.

use crate::fusion::Candidate;
use crate::sources::{
    http_client, json_object_in, text_field, year_in, SourceAdapter, SourceOutcome,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Map, Value};
use shelf_common::config::{LlmConfig, LlmProvider};
use shelf_common::BookRecord;
use std::time::Duration;
use tracing::debug;

/// Confidence when the model does not report one
pub const DEFAULT_LLM_CONFIDENCE: f64 = 0.7;

const MAX_TOKENS: u32 = 1000;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Prompt asking the model to check the known fields and fill the rest
pub fn build_prompt(record: &BookRecord) -> String {
    let year = record
        .original_date
        .map(|y| y.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        r#"Analyze this book and provide accurate metadata including geographic information.
Current data:
- Title: {title}
- Author: {author}
- ISBN: {isbn}
- Year: {year}
- Publisher: {publisher}

Verify and correct this information. Return a JSON object with:
{{
  "title": "correct full title",
  "author": "correct author name(s)",
  "isbn": "ISBN if known",
  "year": original publication year as integer (negative for BC),
  "publisher": "publisher name",
  "genre": "book genre/category",
  "original_language": "original language (e.g. English, French)",
  "description": "brief description of the book",
  "publication_location": "city and country where first published (e.g. London, England)",
  "author_origin": "country or region the author is from (e.g. Ancient Greece)",
  "confidence": 0.0 to 1.0
}}
For classics give the original publication date, not a modern edition date.
If a cover image is attached, treat it as the primary source."#,
        title = record.title(),
        author = record.author(),
        isbn = record.isbn,
        year = year,
        publisher = record.publisher,
    )
}

pub struct LlmAdapter {
    client: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<String>,
    attach_image: bool,
    timeout: Duration,
}

impl LlmAdapter {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            provider: config.provider,
            base_url: config.resolved_base_url().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            attach_image: config.attach_image,
            timeout,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Send one prompt, with an optional JPEG/PNG image, and return the
    /// model's text reply
    pub async fn complete(&self, prompt: &str, image: Option<&[u8]>) -> Result<String> {
        let image = image.map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes));

        let (request, body, reply_path) = match self.provider {
            LlmProvider::Ollama => {
                let mut body = json!({
                    "model": self.model,
                    "prompt": prompt,
                    "stream": false,
                    "options": { "temperature": 0.1, "top_p": 0.9 },
                });
                if let Some(image) = image {
                    body["images"] = json!([image]);
                }
                let request = self.client.post(format!("{}/api/generate", self.base_url));
                (request, body, "/response")
            }
            LlmProvider::OpenAi => {
                let content = match image {
                    Some(image) => json!([
                        { "type": "text", "text": prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/jpeg;base64,{}", image) }
                        },
                    ]),
                    None => json!(prompt),
                };
                let body = json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "messages": [{ "role": "user", "content": content }],
                });
                let mut request = self.client.post(format!("{}/chat/completions", self.base_url));
                if let Some(key) = &self.api_key {
                    request = request.bearer_auth(key);
                }
                (request, body, "/choices/0/message/content")
            }
            LlmProvider::Anthropic => {
                let mut content = vec![json!({ "type": "text", "text": prompt })];
                if let Some(image) = image {
                    content.push(json!({
                        "type": "image",
                        "source": { "type": "base64", "media_type": "image/jpeg", "data": image },
                    }));
                }
                let body = json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "messages": [{ "role": "user", "content": content }],
                });
                let mut request = self
                    .client
                    .post(format!("{}/messages", self.base_url))
                    .header("anthropic-version", ANTHROPIC_VERSION);
                if let Some(key) = &self.api_key {
                    request = request.header("x-api-key", key);
                }
                (request, body, "/content/0/text")
            }
        };

        let response = request
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request failed", provider_label(self.provider)))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "{} returned error: {}",
                provider_label(self.provider),
                response.status()
            );
        }

        let reply: Value = response
            .json()
            .await
            .context("Failed to parse model response")?;

        reply
            .pointer(reply_path)
            .and_then(Value::as_str)
            .map(str::to_string)
            .with_context(|| format!("No reply text from {}", provider_label(self.provider)))
    }

    async fn cover_image(&self, record: &BookRecord) -> Option<Vec<u8>> {
        if !self.attach_image || record.image_path.is_empty() {
            return None;
        }
        match tokio::fs::read(&record.image_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(image = %record.image_path, error = %e, "Cover not readable, sending text only");
                None
            }
        }
    }
}

fn provider_label(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Ollama => "Ollama",
        LlmProvider::OpenAi => "OpenAI",
        LlmProvider::Anthropic => "Anthropic",
    }
}

/// Year as the model sent it; numbers and numeric strings, 0 means unknown
fn reply_year(map: &Map<String, Value>, key: &str) -> Option<i32> {
    let year = match map.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok().or_else(|| year_in(s)),
        _ => None,
    };
    year.filter(|y| *y != 0)
}

/// Turn the model's JSON object into a candidate
///
/// `year` is the original publication year. The publication place wins over
/// the author's origin as the work's location.
pub fn candidate_from_reply(map: &Map<String, Value>) -> Candidate {
    let confidence = map
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_LLM_CONFIDENCE);

    let mut location = text_field(map, "publication_location");
    if location.is_empty() {
        location = text_field(map, "author_origin");
    }
    let genre = text_field(map, "genre");

    Candidate::new("LLM", confidence)
        .with_title(text_field(map, "title"))
        .with_author(text_field(map, "author"))
        .with_isbn(text_field(map, "isbn").replace(['-', ' '], ""))
        .with_publisher(text_field(map, "publisher"))
        .with_description(text_field(map, "description"))
        .with_original_date(reply_year(map, "year"))
        .with_location(location)
        .with_original_language(text_field(map, "original_language"))
        .with_categories(if genre.is_empty() { Vec::new() } else { vec![genre] })
}

#[async_trait]
impl SourceAdapter for LlmAdapter {
    fn name(&self) -> &'static str {
        "LLM"
    }

    async fn query(&self, record: &BookRecord) -> Result<SourceOutcome> {
        let image = self.cover_image(record).await;
        if image.is_none() && record.title().trim().is_empty() && record.isbn.trim().is_empty() {
            return Ok(SourceOutcome::NoEvidence);
        }

        let reply = self
            .complete(&build_prompt(record), image.as_deref())
            .await?;
        debug!(
            provider = provider_label(self.provider),
            model = %self.model,
            with_image = image.is_some(),
            "Model replied"
        );

        let map = json_object_in(&reply).context("Model reply contained no JSON object")?;
        Ok(SourceOutcome::from_candidates(vec![candidate_from_reply(&map)]))
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}
