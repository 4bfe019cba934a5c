// Vision Model Adapter
//
// Sends the cover image to an Ollama-compatible `/api/generate` endpoint and
// asks for a JSON description of the book. Models do not always comply, so the
// reply is searched for a JSON object and falls back to `key: value` lines.

use crate::fusion::Candidate;
use crate::sources::{
    http_client, json_object_in, text_field, year_in, SourceAdapter, SourceOutcome,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shelf_common::config::VisionConfig;
use shelf_common::BookRecord;
use std::time::Duration;
use tracing::debug;

/// Confidence when the model does not report one
pub const DEFAULT_VISION_CONFIDENCE: f64 = 0.7;

/// Confidence for replies that had to be parsed as plain text
pub const TEXT_FALLBACK_CONFIDENCE: f64 = 0.5;

const PROMPT: &str = r#"Analyze this book cover image and extract the following information in JSON format:
{
  "title": "exact title as shown on cover",
  "author": "author name(s)",
  "isbn": "ISBN if visible",
  "publisher": "publisher name if visible",
  "publication_year": "year if visible",
  "publication_location": "city or country of publication if known",
  "language": "language of the text",
  "genre": "book genre/category if determinable",
  "description": "brief description based on cover",
  "confidence": 0.95
}
Be precise and only include information that is clearly visible on the cover. Set confidence between 0-1 based on clarity."#;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct VisionAdapter {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl VisionAdapter {
    pub fn new(config: &VisionConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
        })
    }

    /// Ask the model about one image; returns the model's raw reply
    pub async fn describe(&self, image: &[u8]) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: PROMPT,
            images: vec![base64::engine::general_purpose::STANDARD.encode(image)],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Vision model request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Vision model returned error: {}", response.status());
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse vision model response")?;

        Ok(reply.response)
    }
}

/// Turn a model reply into a candidate
pub fn parse_vision_reply(reply: &str) -> Candidate {
    match json_object_in(reply) {
        Some(map) => candidate_from_json(&map),
        None => {
            debug!("Vision reply has no usable JSON object, falling back to text");
            candidate_from_lines(reply)
        }
    }
}

fn candidate_from_json(map: &Map<String, Value>) -> Candidate {
    let confidence = map
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_VISION_CONFIDENCE);

    let year = year_in(&text_field(map, "publication_year"))
        .or_else(|| year_in(&text_field(map, "year")));
    let genre = text_field(map, "genre");

    Candidate::new("Vision", confidence)
        .with_title(text_field(map, "title"))
        .with_author(text_field(map, "author"))
        .with_isbn(text_field(map, "isbn").replace(['-', ' '], ""))
        .with_publisher(text_field(map, "publisher"))
        .with_release_date(year)
        .with_location(text_field(map, "publication_location"))
        .with_edition_language(text_field(map, "language"))
        .with_categories(if genre.is_empty() { Vec::new() } else { vec![genre] })
        .with_description(text_field(map, "description"))
}

fn candidate_from_lines(reply: &str) -> Candidate {
    let mut candidate = Candidate::new("Vision", TEXT_FALLBACK_CONFIDENCE).with_raw_text(reply);

    for line in reply.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches(|c: char| c == '*' || c == '-').trim().to_lowercase();
        let value = value.trim().to_string();

        candidate = match key.as_str() {
            "title" => candidate.with_title(value),
            "author" => candidate.with_author(value),
            "isbn" => candidate.with_isbn(value.replace(['-', ' '], "")),
            "publisher" => candidate.with_publisher(value),
            "year" | "publication year" => {
                let year = year_in(&value);
                candidate.with_release_date(year)
            }
            _ => candidate,
        };
    }

    candidate
}

#[async_trait]
impl SourceAdapter for VisionAdapter {
    fn name(&self) -> &'static str {
        "Vision"
    }

    async fn query(&self, record: &BookRecord) -> Result<SourceOutcome> {
        if record.image_path.is_empty() {
            return Ok(SourceOutcome::NoEvidence);
        }

        let image = tokio::fs::read(&record.image_path)
            .await
            .with_context(|| format!("Failed to read image {}", record.image_path))?;

        let reply = self.describe(&image).await?;
        debug!(image = %record.image_path, model = %self.model, "Vision model replied");

        Ok(SourceOutcome::from_candidates(vec![parse_vision_reply(&reply)]))
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_reply_embedded_in_prose() {
        let reply = r#"Here is what I see:
```json
{"title": "Pride and Prejudice", "author": "Jane Austen", "isbn": "978-0-14-143951-8",
 "publication_year": "2003", "publication_location": "London", "genre": "Classic",
 "language": "English", "confidence": 0.92}
```"#;

        let candidate = parse_vision_reply(reply);
        assert_eq!(candidate.raw_confidence, 0.92);
        assert_eq!(candidate.fields.title.as_deref(), Some("Pride and Prejudice"));
        assert_eq!(candidate.fields.isbn.as_deref(), Some("9780141439518"));
        assert_eq!(candidate.fields.release_date, Some(2003));
        assert_eq!(candidate.fields.location_name.as_deref(), Some("London"));
        assert_eq!(candidate.fields.categories, Some(vec!["Classic".to_string()]));
        assert_eq!(candidate.fields.original_date, None);
    }

    #[test]
    fn test_missing_confidence_uses_default() {
        let candidate = parse_vision_reply(r#"{"title": "Dune", "publication_year": 1965}"#);
        assert_eq!(candidate.raw_confidence, DEFAULT_VISION_CONFIDENCE);
        assert_eq!(candidate.fields.release_date, Some(1965));
    }

    #[test]
    fn test_text_fallback() {
        let reply = "Title: Dune\nAuthor: Frank Herbert\nYear: 1965\nNotes: sand";
        let candidate = parse_vision_reply(reply);

        assert_eq!(candidate.raw_confidence, TEXT_FALLBACK_CONFIDENCE);
        assert_eq!(candidate.fields.title.as_deref(), Some("Dune"));
        assert_eq!(candidate.fields.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(candidate.fields.release_date, Some(1965));
    }

    #[test]
    fn test_empty_json_fields_are_absent() {
        let candidate = parse_vision_reply(r#"{"title": "", "author": "  ", "confidence": 0.4}"#);
        assert!(candidate.is_empty());
    }
}
