//! Source adapters against a local fixture server

mod helpers;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use helpers::spawn_fixture_server;
use serde_json::{json, Value};
use shelf_common::config::{LlmConfig, LlmProvider, VisionConfig, WebSearchConfig};
use shelf_common::BookRecord;
use shelf_ingest::sources::web_search::WebSearchKeys;
use shelf_ingest::sources::{
    GoogleBooksAdapter, LlmAdapter, OpenLibraryAdapter, SourceAdapter, SourceOutcome,
    VisionAdapter, WebSearchAdapter, WebSearchEndpoints,
};
use std::collections::HashMap;

type Params = Query<HashMap<String, String>>;

fn candidates(outcome: SourceOutcome) -> Vec<shelf_ingest::fusion::Candidate> {
    match outcome {
        SourceOutcome::Candidates(c) => c,
        SourceOutcome::NoEvidence => panic!("expected candidates"),
    }
}

#[tokio::test]
async fn test_google_books_isbn_lookup() {
    let router = Router::new().route(
        "/volumes",
        get(|Query(params): Params| async move {
            if params.get("q").map(String::as_str) != Some("isbn:0141439518") {
                return Json(json!({"totalItems": 0}));
            }
            Json(json!({
                "totalItems": 1,
                "items": [{
                    "volumeInfo": {
                        "title": "Pride and Prejudice",
                        "authors": ["Jane Austen"],
                        "publisher": "Penguin UK",
                        "publishedDate": "2003-01-30",
                        "language": "en",
                        "industryIdentifiers": [{"type": "ISBN_10", "identifier": "0141439518"}]
                    }
                }]
            }))
        }),
    );
    let base = spawn_fixture_server(router).await;

    let adapter = GoogleBooksAdapter::new(&base, None).unwrap();
    let record = BookRecord::default().with_isbn("0141439518");
    let found = candidates(adapter.query(&record).await.unwrap());

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].source, "GoogleBooks");
    assert_eq!(found[0].fields.title.as_deref(), Some("Pride and Prejudice"));
    assert_eq!(found[0].fields.authors, Some(vec!["Jane Austen".to_string()]));
    assert_eq!(found[0].fields.release_date, Some(2003));
}

#[tokio::test]
async fn test_google_books_empty_result_is_no_evidence() {
    let router = Router::new().route("/volumes", get(|| async { Json(json!({"totalItems": 0})) }));
    let base = spawn_fixture_server(router).await;

    let adapter = GoogleBooksAdapter::new(&base, Some("key".to_string())).unwrap();
    let outcome = adapter.query(&BookRecord::new("Nothing", "")).await.unwrap();
    assert_eq!(outcome, SourceOutcome::NoEvidence);
}

#[tokio::test]
async fn test_google_books_server_error_is_err() {
    let router = Router::new().route(
        "/volumes",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
    );
    let base = spawn_fixture_server(router).await;

    let adapter = GoogleBooksAdapter::new(&base, None).unwrap();
    assert!(adapter.query(&BookRecord::new("Emma", "")).await.is_err());
}

#[tokio::test]
async fn test_open_library_title_search() {
    let router = Router::new().route(
        "/search.json",
        get(|Query(params): Params| async move {
            assert_eq!(params.get("title").map(String::as_str), Some("Frankenstein"));
            assert_eq!(params.get("author").map(String::as_str), Some("Mary Shelley"));
            Json(json!({
                "numFound": 1,
                "docs": [{
                    "title": "Frankenstein",
                    "author_name": ["Mary Shelley"],
                    "first_publish_year": 1818,
                    "language": ["eng"],
                    "publisher": ["Lackington"],
                    "first_sentence": {"type": "/type/text", "value": "You will rejoice to hear."}
                }]
            }))
        }),
    );
    let base = spawn_fixture_server(router).await;

    let adapter = OpenLibraryAdapter::new(&base).unwrap();
    let found = candidates(
        adapter
            .query(&BookRecord::new("Frankenstein", "Mary Shelley"))
            .await
            .unwrap(),
    );

    assert_eq!(found[0].fields.original_date, Some(1818));
    assert_eq!(found[0].fields.publisher.as_deref(), Some("Lackington"));
    assert_eq!(
        found[0].fields.description.as_deref(),
        Some("You will rejoice to hear.")
    );
}

#[tokio::test]
async fn test_web_search_skips_failing_engine() {
    let router = Router::new()
        .route(
            "/ddg",
            get(|Query(params): Params| async move {
                assert_eq!(params.get("format").map(String::as_str), Some("json"));
                Json(json!({
                    "AbstractText": "Emma is a novel by Jane Austen. First published in 1815.",
                    "AbstractURL": "https://example.org/emma",
                    "RelatedTopics": []
                }))
            }),
        )
        .route(
            "/bing",
            get(|headers: HeaderMap| async move {
                if headers.get("Ocp-Apim-Subscription-Key").and_then(|v| v.to_str().ok())
                    != Some("bing-key")
                {
                    return (StatusCode::UNAUTHORIZED, Json(json!({})));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "webPages": {"value": [{
                            "name": "Emma (novel) - Wikipedia",
                            "snippet": "Emma is a novel by Jane Austen, first published in December 1815.",
                            "url": "https://example.org/wiki/emma"
                        }]}
                    })),
                )
            }),
        )
        .route("/serp", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let base = spawn_fixture_server(router).await;

    let endpoints = WebSearchEndpoints {
        duckduckgo: format!("{}/ddg", base),
        bing: format!("{}/bing", base),
        serpapi: format!("{}/serp", base),
    };
    let keys = WebSearchKeys {
        bing: Some("bing-key".to_string()),
        serp: Some("serp-key".to_string()),
    };
    let adapter = WebSearchAdapter::new(&WebSearchConfig::default(), keys, endpoints).unwrap();

    let found = candidates(adapter.query(&BookRecord::new("Emma", "")).await.unwrap());

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].source, "DuckDuckGo");
    assert_eq!(found[1].source, "Bing");
    assert_eq!(found[1].fields.author.as_deref(), Some("Jane Austen"));
    assert_eq!(found[1].fields.original_date, Some(1815));
}

#[tokio::test]
async fn test_web_search_without_title_or_isbn() {
    let adapter = WebSearchAdapter::new(
        &WebSearchConfig::default(),
        WebSearchKeys::default(),
        WebSearchEndpoints::default(),
    )
    .unwrap();

    let outcome = adapter.query(&BookRecord::new("", "Jane Austen")).await.unwrap();
    assert_eq!(outcome, SourceOutcome::NoEvidence);
}

#[tokio::test]
async fn test_vision_sends_image_and_parses_reply() {
    let router = Router::new().route(
        "/api/generate",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "test-model");
            assert_eq!(body["stream"], false);
            assert!(!body["images"][0].as_str().unwrap_or_default().is_empty());
            Json(json!({
                "response": "```json\n{\"title\": \"Dune\", \"author\": \"Frank Herbert\", \"confidence\": 0.88}\n```"
            }))
        }),
    );
    let base = spawn_fixture_server(router).await;

    let dir = tempfile::TempDir::new().unwrap();
    let image = dir.path().join("dune.jpg");
    std::fs::write(&image, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

    let adapter = VisionAdapter::new(&VisionConfig {
        base_url: base,
        model: "test-model".to_string(),
        ..Default::default()
    })
    .unwrap();

    let found = candidates(
        adapter
            .query(&BookRecord::from_image(image.to_string_lossy()))
            .await
            .unwrap(),
    );

    assert_eq!(found[0].source, "Vision");
    assert_eq!(found[0].raw_confidence, 0.88);
    assert_eq!(found[0].fields.author.as_deref(), Some("Frank Herbert"));
}

#[tokio::test]
async fn test_vision_missing_image_is_err() {
    let adapter = VisionAdapter::new(&VisionConfig::default()).unwrap();
    let result = adapter
        .query(&BookRecord::from_image("/nonexistent/cover.jpg"))
        .await;
    assert!(result.is_err());
}

fn llm_config(provider: LlmProvider, base_url: String) -> LlmConfig {
    LlmConfig {
        provider,
        base_url: Some(base_url),
        model: "test-model".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_llm_ollama_enriches_text_only_record() {
    let router = Router::new().route(
        "/api/generate",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "test-model");
            assert_eq!(body["stream"], false);
            assert!(body.get("images").is_none());
            assert!(body["prompt"].as_str().unwrap_or_default().contains("- Title: Emma"));
            Json(json!({
                "response": "{\"title\": \"Emma\", \"author\": \"Jane Austen\", \"year\": 1815, \"publication_location\": \"\", \"author_origin\": \"England\"}"
            }))
        }),
    );
    let base = spawn_fixture_server(router).await;

    let adapter = LlmAdapter::new(&llm_config(LlmProvider::Ollama, base), None).unwrap();
    let found = candidates(adapter.query(&BookRecord::new("Emma", "")).await.unwrap());

    assert_eq!(found[0].source, "LLM");
    assert_eq!(found[0].fields.original_date, Some(1815));
    assert_eq!(found[0].fields.release_date, None);
    assert_eq!(found[0].fields.location_name.as_deref(), Some("England"));
}

#[tokio::test]
async fn test_llm_openai_sends_bearer_key_and_cover() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(
                headers.get("authorization").and_then(|v| v.to_str().ok()),
                Some("Bearer sk-test")
            );
            let content = &body["messages"][0]["content"];
            assert_eq!(content[0]["type"], "text");
            assert_eq!(content[1]["type"], "image_url");
            assert!(content[1]["image_url"]["url"]
                .as_str()
                .unwrap_or_default()
                .starts_with("data:image/jpeg;base64,"));
            Json(json!({
                "choices": [{"message": {"content": "```json\n{\"title\": \"Dune\", \"year\": \"1965\", \"confidence\": 0.8}\n```"}}]
            }))
        }),
    );
    let base = spawn_fixture_server(router).await;

    let dir = tempfile::TempDir::new().unwrap();
    let image = dir.path().join("dune.jpg");
    std::fs::write(&image, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

    let adapter = LlmAdapter::new(
        &llm_config(LlmProvider::OpenAi, format!("{}/v1", base)),
        Some("sk-test".to_string()),
    )
    .unwrap();
    let found = candidates(
        adapter
            .query(&BookRecord::from_image(image.to_string_lossy()))
            .await
            .unwrap(),
    );

    assert_eq!(found[0].fields.title.as_deref(), Some("Dune"));
    assert_eq!(found[0].fields.original_date, Some(1965));
    assert_eq!(found[0].raw_confidence, 0.8);
}

#[tokio::test]
async fn test_llm_anthropic_headers_and_reply() {
    let router = Router::new().route(
        "/messages",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(
                headers.get("x-api-key").and_then(|v| v.to_str().ok()),
                Some("anthropic-key")
            );
            assert_eq!(
                headers.get("anthropic-version").and_then(|v| v.to_str().ok()),
                Some("2023-06-01")
            );
            assert_eq!(body["messages"][0]["content"][0]["type"], "text");
            Json(json!({
                "content": [{"type": "text", "text": "{\"title\": \"The Republic\", \"author\": \"Plato\", \"year\": -375, \"author_origin\": \"Ancient Greece\"}"}]
            }))
        }),
    );
    let base = spawn_fixture_server(router).await;

    let adapter = LlmAdapter::new(
        &llm_config(LlmProvider::Anthropic, base),
        Some("anthropic-key".to_string()),
    )
    .unwrap();
    let found = candidates(adapter.query(&BookRecord::new("Republic", "")).await.unwrap());

    assert_eq!(found[0].fields.author.as_deref(), Some("Plato"));
    assert_eq!(found[0].fields.original_date, Some(-375));
    assert_eq!(found[0].fields.location_name.as_deref(), Some("Ancient Greece"));
}

#[tokio::test]
async fn test_llm_rejected_or_prose_reply_is_err() {
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"}))) }),
        )
        .route(
            "/api/generate",
            post(|| async { Json(json!({"response": "I am not sure which book this is."})) }),
        );
    let base = spawn_fixture_server(router).await;

    let openai = LlmAdapter::new(
        &llm_config(LlmProvider::OpenAi, format!("{}/v1", base)),
        Some("wrong".to_string()),
    )
    .unwrap();
    assert!(openai.query(&BookRecord::new("Emma", "")).await.is_err());

    let ollama = LlmAdapter::new(&llm_config(LlmProvider::Ollama, base), None).unwrap();
    assert!(ollama.query(&BookRecord::new("Emma", "")).await.is_err());
}
