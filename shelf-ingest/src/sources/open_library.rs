// Open Library Search Adapter
//
// `search.json` by ISBN or by title/author. Open Library reports the first
// publication year of the work, so it can supply the original date.

use crate::fusion::Candidate;
use crate::sources::{http_client, rate_limiter, RateLimiter, SourceAdapter, SourceOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use shelf_common::BookRecord;
use std::time::Duration;
use tracing::debug;

/// Raw confidence for catalog documents
pub const OPEN_LIBRARY_CONFIDENCE: f64 = 0.85;

const MAX_RESULTS: usize = 5;
const MAX_SUBJECTS: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchDoc {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    first_publish_year: Option<i32>,
    #[serde(default)]
    publisher: Vec<String>,
    #[serde(default)]
    language: Vec<String>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    isbn: Vec<String>,
    /// Either a list of strings or `{ "value": ... }` depending on the record
    #[serde(default)]
    first_sentence: Option<Value>,
}

pub struct OpenLibraryAdapter {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl OpenLibraryAdapter {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(30))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: rate_limiter(2),
        })
    }
}

/// Query parameters for a record, `None` when there is nothing to search by
pub fn search_params(record: &BookRecord) -> Option<Vec<(&'static str, String)>> {
    let isbn = record.isbn.trim();
    let mut params = Vec::new();

    if !isbn.is_empty() {
        params.push(("isbn", isbn.to_string()));
    } else {
        if !record.title().trim().is_empty() {
            params.push(("title", record.title().trim().to_string()));
        }
        if !record.author().trim().is_empty() {
            params.push(("author", record.author().trim().to_string()));
        }
    }

    if params.is_empty() {
        return None;
    }
    params.push(("limit", MAX_RESULTS.to_string()));
    Some(params)
}

fn first_sentence(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => items
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::Object(map)) => map
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn candidate_from_doc(doc: SearchDoc) -> Candidate {
    let language = doc.language.first().cloned().unwrap_or_default();

    Candidate::new("OpenLibrary", OPEN_LIBRARY_CONFIDENCE)
        .with_title(doc.title)
        .with_authors(doc.author_name)
        .with_original_date(doc.first_publish_year)
        .with_release_date(doc.first_publish_year)
        .with_publisher(doc.publisher.into_iter().next().unwrap_or_default())
        .with_original_language(language.clone())
        .with_edition_language(language)
        .with_categories(doc.subject.into_iter().take(MAX_SUBJECTS).collect())
        .with_isbn(doc.isbn.into_iter().next().unwrap_or_default())
        .with_description(first_sentence(doc.first_sentence))
}

#[async_trait]
impl SourceAdapter for OpenLibraryAdapter {
    fn name(&self) -> &'static str {
        "OpenLibrary"
    }

    async fn query(&self, record: &BookRecord) -> Result<SourceOutcome> {
        let Some(params) = search_params(record) else {
            return Ok(SourceOutcome::NoEvidence);
        };

        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&params)
            .send()
            .await
            .context("Open Library request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Open Library returned error: {}", response.status());
        }

        let search: SearchResponse = response
            .json()
            .await
            .context("Failed to parse Open Library response")?;

        debug!(docs = search.docs.len(), "Open Library search complete");

        Ok(SourceOutcome::from_candidates(
            search
                .docs
                .into_iter()
                .take(MAX_RESULTS)
                .map(candidate_from_doc)
                .collect(),
        ))
    }
}
