// Google Books API Adapter
//
// Catalog lookup by ISBN when the record has one, otherwise by title and
// author. Authoritative tier. Rate limited per adapter instance.

use crate::fusion::Candidate;
use crate::sources::{http_client, rate_limiter, year_in, RateLimiter, SourceAdapter, SourceOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use shelf_common::BookRecord;
use std::time::Duration;
use tracing::debug;

/// Raw confidence for catalog volumes
pub const GOOGLE_BOOKS_CONFIDENCE: f64 = 0.9;

const MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    published_date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    language: String,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

pub struct GoogleBooksAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: RateLimiter,
}

impl GoogleBooksAdapter {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(30))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rate_limiter: rate_limiter(5),
        })
    }
}

/// Search expression for a record, `None` when there is nothing to search by
pub fn build_query(record: &BookRecord) -> Option<String> {
    let isbn = record.isbn.trim();
    if !isbn.is_empty() {
        return Some(format!("isbn:{}", isbn));
    }

    let mut parts = Vec::new();
    if !record.title().trim().is_empty() {
        parts.push(format!("intitle:{}", record.title().trim()));
    }
    if !record.author().trim().is_empty() {
        parts.push(format!("inauthor:{}", record.author().trim()));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("+"))
    }
}

fn candidate_from_volume(info: VolumeInfo) -> Candidate {
    let isbn = ["ISBN_13", "ISBN_10"].iter().find_map(|kind| {
        info.industry_identifiers
            .iter()
            .find(|id| id.kind == *kind)
            .map(|id| id.identifier.clone())
    });

    let title = if info.subtitle.is_empty() {
        info.title
    } else {
        format!("{}: {}", info.title, info.subtitle)
    };

    Candidate::new("GoogleBooks", GOOGLE_BOOKS_CONFIDENCE)
        .with_title(title)
        .with_authors(info.authors)
        .with_publisher(info.publisher)
        .with_description(info.description)
        .with_release_date(year_in(&info.published_date))
        .with_categories(info.categories)
        .with_edition_language(info.language)
        .with_isbn(isbn.unwrap_or_default())
}

#[async_trait]
impl SourceAdapter for GoogleBooksAdapter {
    fn name(&self) -> &'static str {
        "GoogleBooks"
    }

    async fn query(&self, record: &BookRecord) -> Result<SourceOutcome> {
        let Some(query) = build_query(record) else {
            return Ok(SourceOutcome::NoEvidence);
        };

        self.rate_limiter.until_ready().await;

        let max_results = MAX_RESULTS.to_string();
        let mut params = vec![("q", query.as_str()), ("maxResults", max_results.as_str())];
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/volumes", self.base_url))
            .query(&params)
            .send()
            .await
            .context("Google Books API request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Google Books API returned error: {}", response.status());
        }

        let volumes: VolumesResponse = response
            .json()
            .await
            .context("Failed to parse Google Books response")?;

        debug!(query = %query, volumes = volumes.items.len(), "Google Books search complete");

        Ok(SourceOutcome::from_candidates(
            volumes
                .items
                .into_iter()
                .take(MAX_RESULTS)
                .map(|v| candidate_from_volume(v.volume_info))
                .collect(),
        ))
    }
}
