// Web Search Adapter
//
// General web search engines as weak corroborating evidence. DuckDuckGo's
// instant answer API needs no key; Bing and SerpAPI are queried only when a
// key is configured. One engine failing does not fail the source.

use crate::fusion::Candidate;
use crate::sources::{http_client, rate_limiter, year_in, RateLimiter, SourceAdapter, SourceOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use shelf_common::config::WebSearchConfig;
use shelf_common::BookRecord;
use std::time::Duration;
use tracing::{debug, warn};

pub const DDG_ABSTRACT_CONFIDENCE: f64 = 0.6;
pub const DDG_TOPIC_CONFIDENCE: f64 = 0.5;
pub const BING_CONFIDENCE: f64 = 0.7;
pub const SERP_ORGANIC_CONFIDENCE: f64 = 0.8;
pub const SERP_KNOWLEDGE_GRAPH_CONFIDENCE: f64 = 0.9;

static BY_AUTHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bby\s+([^.,;(]+)").unwrap());

/// Keys for the engines that need one
#[derive(Debug, Clone, Default)]
pub struct WebSearchKeys {
    pub bing: Option<String>,
    pub serp: Option<String>,
}

/// Engine endpoints; overridable so tests can point at a local server
#[derive(Debug, Clone)]
pub struct WebSearchEndpoints {
    pub duckduckgo: String,
    pub bing: String,
    pub serpapi: String,
}

impl Default for WebSearchEndpoints {
    fn default() -> Self {
        Self {
            duckduckgo: "https://api.duckduckgo.com/".to_string(),
            bing: "https://api.bing.microsoft.com/v7.0/search".to_string(),
            serpapi: "https://serpapi.com/search.json".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DuckDuckGoResponse {
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    /// Absent on topic groups, which carry nested `Topics` instead
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    #[serde(default)]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Default, Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Debug, Default, Deserialize)]
struct BingPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpOrganic>,
    #[serde(default)]
    knowledge_graph: Option<SerpKnowledgeGraph>,
}

#[derive(Debug, Default, Deserialize)]
struct SerpOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

#[derive(Debug, Default, Deserialize)]
struct SerpKnowledgeGraph {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
}

pub struct WebSearchAdapter {
    client: reqwest::Client,
    endpoints: WebSearchEndpoints,
    keys: WebSearchKeys,
    duckduckgo: bool,
    max_results: usize,
    rate_limiter: RateLimiter,
}

impl WebSearchAdapter {
    pub fn new(
        config: &WebSearchConfig,
        keys: WebSearchKeys,
        endpoints: WebSearchEndpoints,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(10))?,
            endpoints,
            keys,
            duckduckgo: config.duckduckgo,
            max_results: config.max_results.max(1),
            rate_limiter: rate_limiter(2),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        engine: &str,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let response = request
            .send()
            .await
            .with_context(|| format!("{} request failed", engine))?;

        if !response.status().is_success() {
            anyhow::bail!("{} returned error: {}", engine, response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", engine))
    }

    async fn search_duckduckgo(&self, query: &str) -> Result<Vec<Candidate>> {
        let request = self.client.get(&self.endpoints.duckduckgo).query(&[
            ("q", query),
            ("format", "json"),
            ("no_html", "1"),
        ]);
        let response: DuckDuckGoResponse = self.get_json(request, "DuckDuckGo").await?;
        Ok(duckduckgo_candidates(response, self.max_results))
    }

    async fn search_bing(&self, query: &str, key: &str) -> Result<Vec<Candidate>> {
        let count = self.max_results.to_string();
        let request = self
            .client
            .get(&self.endpoints.bing)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Ocp-Apim-Subscription-Key", key);
        let response: BingResponse = self.get_json(request, "Bing").await?;
        Ok(bing_candidates(response))
    }

    async fn search_serpapi(&self, query: &str, key: &str) -> Result<Vec<Candidate>> {
        let num = self.max_results.to_string();
        let request = self.client.get(&self.endpoints.serpapi).query(&[
            ("q", query),
            ("api_key", key),
            ("num", num.as_str()),
        ]);
        let response: SerpResponse = self.get_json(request, "SerpAPI").await?;
        Ok(serp_candidates(response))
    }
}

/// Search phrase for a record, `None` without a title or ISBN
pub fn build_query(record: &BookRecord) -> Option<String> {
    let title = record.title().trim();
    let isbn = record.isbn.trim();
    if title.is_empty() && isbn.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if !title.is_empty() {
        parts.push(format!("\"{}\"", title));
    }
    if !record.author().trim().is_empty() {
        parts.push(record.author().trim().to_string());
    }
    if !isbn.is_empty() {
        parts.push(format!("ISBN {}", isbn));
    }
    parts.push("book".to_string());

    Some(parts.join(" "))
}

/// Name following "by " up to the next punctuation
pub fn extract_author(text: &str) -> String {
    BY_AUTHOR
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

fn first_sentence(text: &str) -> &str {
    text.split('.').next().unwrap_or_default().trim()
}

fn duckduckgo_candidates(response: DuckDuckGoResponse, max_results: usize) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    if !response.abstract_text.is_empty() {
        let text = &response.abstract_text;
        candidates.push(
            Candidate::new("DuckDuckGo", DDG_ABSTRACT_CONFIDENCE)
                .with_title(first_sentence(text))
                .with_author(extract_author(text))
                .with_description(text.as_str())
                .with_url(response.abstract_url.as_str()),
        );
    }

    candidates.extend(
        response
            .related_topics
            .into_iter()
            .take(max_results)
            .filter_map(|topic| {
                let text = topic.text?;
                Some(
                    Candidate::new("DuckDuckGo", DDG_TOPIC_CONFIDENCE)
                        .with_description(text)
                        .with_url(topic.first_url),
                )
            }),
    );

    candidates
}

fn snippet_candidate(source: &str, confidence: f64, title: String, snippet: String, url: String) -> Candidate {
    Candidate::new(source, confidence)
        .with_title(title)
        .with_author(extract_author(&snippet))
        .with_original_date(year_in(&snippet))
        .with_description(snippet)
        .with_url(url)
}

fn bing_candidates(response: BingResponse) -> Vec<Candidate> {
    response
        .web_pages
        .map(|pages| pages.value)
        .unwrap_or_default()
        .into_iter()
        .map(|page| snippet_candidate("Bing", BING_CONFIDENCE, page.name, page.snippet, page.url))
        .collect()
}

fn serp_candidates(response: SerpResponse) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = response
        .organic_results
        .into_iter()
        .map(|r| snippet_candidate("SerpAPI", SERP_ORGANIC_CONFIDENCE, r.title, r.snippet, r.link))
        .collect();

    if let Some(graph) = response.knowledge_graph {
        candidates.push(
            Candidate::new("SerpAPI Knowledge Graph", SERP_KNOWLEDGE_GRAPH_CONFIDENCE)
                .with_title(graph.title)
                .with_author(graph.author)
                .with_description(graph.description),
        );
    }

    candidates
}

#[async_trait]
impl SourceAdapter for WebSearchAdapter {
    fn name(&self) -> &'static str {
        "WebSearch"
    }

    async fn query(&self, record: &BookRecord) -> Result<SourceOutcome> {
        let Some(query) = build_query(record) else {
            return Ok(SourceOutcome::NoEvidence);
        };

        let mut candidates = Vec::new();

        if self.duckduckgo {
            match self.search_duckduckgo(&query).await {
                Ok(found) => candidates.extend(found),
                Err(e) => warn!(engine = "DuckDuckGo", error = %format!("{:#}", e), "Search engine failed"),
            }
        }

        if let Some(key) = &self.keys.bing {
            match self.search_bing(&query, key).await {
                Ok(found) => candidates.extend(found),
                Err(e) => warn!(engine = "Bing", error = %format!("{:#}", e), "Search engine failed"),
            }
        }

        if let Some(key) = &self.keys.serp {
            match self.search_serpapi(&query, key).await {
                Ok(found) => candidates.extend(found),
                Err(e) => warn!(engine = "SerpAPI", error = %format!("{:#}", e), "Search engine failed"),
            }
        }

        debug!(query = %query, candidates = candidates.len(), "Web search complete");
        Ok(SourceOutcome::from_candidates(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_phrase() {
        let record = BookRecord::new("Emma", "Jane Austen").with_isbn("0141439580");
        assert_eq!(
            build_query(&record).as_deref(),
            Some("\"Emma\" Jane Austen ISBN 0141439580 book")
        );
        assert_eq!(build_query(&BookRecord::new("", "Jane Austen")), None);
    }

    #[test]
    fn test_extract_author() {
        assert_eq!(extract_author("A novel by Jane Austen, published 1813."), "Jane Austen");
        assert_eq!(extract_author("Written BY Frank Herbert (1965)"), "Frank Herbert");
        assert_eq!(extract_author("Classic novel by Mary Shelley"), "Mary Shelley");
        assert_eq!(extract_author("Abby Road"), "");
    }

    #[test]
    fn test_duckduckgo_mapping() {
        let json = r#"{
            "AbstractText": "Emma is a novel by Jane Austen. It was first published in 1815.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Emma_(novel)",
            "RelatedTopics": [
                {"Text": "Emma (2020 film)", "FirstURL": "https://duckduckgo.com/Emma_2020"},
                {"Name": "Adaptations", "Topics": []},
                {"Text": "Jane Austen", "FirstURL": "https://duckduckgo.com/Jane_Austen"}
            ]
        }"#;
        let response: DuckDuckGoResponse = serde_json::from_str(json).unwrap();
        let candidates = duckduckgo_candidates(response, 2);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].raw_confidence, DDG_ABSTRACT_CONFIDENCE);
        assert_eq!(candidates[0].fields.title.as_deref(), Some("Emma is a novel by Jane Austen"));
        assert_eq!(candidates[0].fields.author.as_deref(), Some("Jane Austen"));
        assert_eq!(candidates[1].raw_confidence, DDG_TOPIC_CONFIDENCE);
        assert_eq!(candidates[1].fields.description.as_deref(), Some("Emma (2020 film)"));
    }

    #[test]
    fn test_serp_mapping() {
        let json = r#"{
            "organic_results": [
                {"title": "Frankenstein", "snippet": "Gothic novel by Mary Shelley; first published in 1818", "link": "https://example.org/f"}
            ],
            "knowledge_graph": {"title": "Frankenstein", "description": "Novel", "author": "Mary Shelley"}
        }"#;
        let response: SerpResponse = serde_json::from_str(json).unwrap();
        let candidates = serp_candidates(response);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].fields.author.as_deref(), Some("Mary Shelley"));
        assert_eq!(candidates[0].fields.original_date, Some(1818));
        assert_eq!(candidates[1].raw_confidence, SERP_KNOWLEDGE_GRAPH_CONFIDENCE);
    }

    #[test]
    fn test_bing_without_pages() {
        assert!(bing_candidates(BingResponse::default()).is_empty());
    }
}
