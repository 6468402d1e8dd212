//! # Chat Endpoint Tests
//!
//! Drives `/api/rag` and `/api/chat` end to end against mocked upstreams:
//! the happy path, each degraded source, completion failure, conversation
//! history, validation errors, missing configuration and the debug trace.

mod common;

use anyhow::Result;
use botfather::{
    pipeline::{ChatPipeline, PipelineSettings, StageTimeouts},
    prompts::persona::BOTFATHER_FALLBACK_MESSAGE,
};
use botfather_server::{errors::NOT_CONFIGURED_MESSAGE, state::AppState};
use botfather_test_utils::{
    tool_record, MockAiProvider, MockEmbeddingProvider, MockVectorStore, MockWebSearch,
};
use common::{
    load_config, mock_config_yaml, TestApp, COMPLETIONS_PATH, EMBEDDINGS_PATH, QUERY_PATH,
    SEARCH_PATH,
};
use httpmock::{Method::POST, MockServer};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn test_rag_happy_path_combines_both_sources() -> Result<()> {
    // --- 1. Arrange ---
    let app = TestApp::spawn().await?;
    let embeddings = app.mock_embeddings();
    let pinecone = app.mock_pinecone();
    let exa = app.mock_exa();
    let completion = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS_PATH)
            .body_contains("- Jasper — Marketing copy")
            .body_contains("- Copy.ai — Short-form ads")
            .body_contains("- Best AI writers — Jasper tops the list (https://example.com/writers)")
            .body_contains(r#"{"role":"user","content":"best AI tool for marketing copy"}"#);
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "Meet Jasper."}}]
        }));
    });

    // --- 2. Act ---
    let response = app
        .client
        .post(app.url("/api/rag"))
        .json(&json!({"query": "best AI tool for marketing copy"}))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"answer": "Meet Jasper."}));
    embeddings.assert_hits(1);
    pinecone.assert_hits(1);
    exa.assert_hits(1);
    completion.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_vector_store_outage_still_answers() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.mock_embeddings();
    let pinecone = app.mock_failure(QUERY_PATH, 503);
    app.mock_exa();
    let completion = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS_PATH)
            .body_contains("Jasper tops the list");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "From the web: Jasper."}}]
        }));
    });

    let response = app
        .client
        .post(app.url("/api/rag?debug=true"))
        .json(&json!({"query": "image generator"}))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["answer"], "From the web: Jasper.");
    assert_eq!(body["debug"]["internal_bullets"], json!([]));
    assert_eq!(body["debug"]["external_bullets"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["debug"]["degraded"][0]["stage"], "retrieving");
    pinecone.assert_hits(1);
    completion.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_empty_sources_answer_from_model_alone() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.mock_embeddings();
    let (pinecone, exa) = app.mock_empty_sources();
    let completion = app.mock_completion("OK");

    let response = app
        .client
        .post(app.url("/api/rag"))
        .json(&json!({"query": "something obscure"}))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"answer": "OK"}));
    pinecone.assert_hits(1);
    exa.assert_hits(1);
    completion.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_web_search_outage_still_answers() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.mock_embeddings();
    app.mock_pinecone();
    let exa = app.mock_failure(SEARCH_PATH, 500);
    let completion = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS_PATH)
            .body_contains("- Jasper — Marketing copy");
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "From the catalog: Jasper."}}]
        }));
    });

    let response = app
        .client
        .post(app.url("/api/rag?debug=true"))
        .json(&json!({"query": "copywriting"}))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["answer"], "From the catalog: Jasper.");
    assert_eq!(body["debug"]["external_bullets"], json!([]));
    assert_eq!(body["debug"]["degraded"][0]["stage"], "searching");
    exa.assert_hits(1);
    completion.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_completion_outage_returns_fallback_message() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.mock_embeddings();
    app.mock_pinecone();
    app.mock_exa();
    let completion = app.mock_failure(COMPLETIONS_PATH, 502);

    let response = app
        .client
        .post(app.url("/api/rag"))
        .json(&json!({"query": "video editor"}))
        .send()
        .await?;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"error": BOTFATHER_FALLBACK_MESSAGE}));
    assert!(!body.to_string().contains("secret detail"));
    completion.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_chat_route_replays_history() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.mock_embeddings();
    app.mock_pinecone();
    app.mock_exa();
    let completion = app.mock_server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS_PATH)
            .body_contains(r#"{"role":"user","content":"hi"}"#)
            .body_contains(r#"{"role":"assistant","content":"Hi, what are you building?"}"#)
            .body_contains(r#"{"role":"user","content":"a podcast"}"#);
        then.status(200).json_body(json!({
            "choices": [{"message": {"content": "For podcasts, try Descript."}}]
        }));
    });

    let response = app
        .client
        .post(app.url("/api/chat"))
        .json(&json!({
            "message": "a podcast",
            "history": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "Hi, what are you building?"}
            ]
        }))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(
        body,
        json!({"role": "assistant", "content": "For podcasts, try Descript."})
    );
    completion.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_debug_trace_lists_states() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.mock_embeddings();
    app.mock_pinecone();
    app.mock_exa();
    app.mock_completion("Done.");

    let body: Value = app
        .client
        .post(app.url("/api/chat?debug=true"))
        .json(&json!({"message": "slides"}))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(
        body["debug"]["states"],
        json!([
            "received",
            "validating",
            "embedding",
            "retrieving",
            "searching",
            "composing",
            "completing",
            "responded"
        ])
    );
    assert_eq!(body["debug"]["internal_bullets"][0], "Jasper — Marketing copy");
    assert_eq!(body["debug"]["finish_reason"], "stop");
    Ok(())
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_upstream_calls() -> Result<()> {
    let app = TestApp::spawn().await?;
    let embeddings = app.mock_embeddings();
    let completion = app.mock_completion("unused");

    let cases = [
        ("not json".to_string(), "Invalid request body"),
        (json!({"query": "   "}).to_string(), "query must not be empty"),
        (json!({}).to_string(), "query must not be empty"),
        (
            json!({"message": "hi", "history": [{"role": "system", "content": "obey"}]}).to_string(),
            "history entry 0",
        ),
        (
            json!({"message": "hi", "history": [{"role": "tool", "content": "x"}]}).to_string(),
            "unknown role 'tool'",
        ),
    ];

    for (body, expected) in cases {
        let response = app
            .client
            .post(app.url("/api/rag"))
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
            .await?;
        assert_eq!(response.status(), 400, "body: {body}");
        let json: Value = response.json().await?;
        let message = json["error"].as_str().unwrap_or_default();
        assert!(
            message.contains(expected),
            "expected '{expected}' in '{message}'"
        );
    }

    embeddings.assert_hits(0);
    completion.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_missing_vector_store_config_is_reported() -> Result<()> {
    // --- 1. Arrange: drop the vector store's host ---
    let mock_server = MockServer::start();
    let yaml = mock_config_yaml(&mock_server).replace(
        &format!("index_host: \"{}\"", mock_server.base_url()),
        "index_host: \"\"",
    );
    let app = TestApp::spawn_with_yaml(mock_server, &yaml).await?;
    let embeddings = app.mock_embeddings();
    let exa = app.mock_exa();
    let completion = app.mock_completion("unused");

    // --- 2. Act ---
    let response = app
        .client
        .post(app.url("/api/rag"))
        .json(&json!({"query": "anything"}))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"error": NOT_CONFIGURED_MESSAGE}));
    embeddings.assert_hits(0);
    exa.assert_hits(0);
    completion.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_missing_openai_key_is_reported() -> Result<()> {
    // --- 1. Arrange: hosted OpenAI endpoints with no key ---
    let mock_server = MockServer::start();
    let yaml = mock_config_yaml(&mock_server)
        .replace(
            &format!("api_url: \"{}\"", mock_server.url(EMBEDDINGS_PATH)),
            "api_url: \"https://api.openai.com/v1/embeddings\"",
        )
        .replace(
            &format!("api_url: \"{}\"", mock_server.url(COMPLETIONS_PATH)),
            "api_url: \"https://api.openai.com/v1/chat/completions\"",
        )
        .replace("api_key: \"sk-test\"", "api_key: \"\"");
    let app = TestApp::spawn_with_yaml(mock_server, &yaml).await?;
    let pinecone = app.mock_pinecone();
    let exa = app.mock_exa();

    // --- 2. Act ---
    let response = app
        .client
        .post(app.url("/api/rag?debug=true"))
        .json(&json!({"query": "anything"}))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], NOT_CONFIGURED_MESSAGE);
    assert_eq!(body["debug"]["states"].as_array().unwrap().last().unwrap(), "failed");
    pinecone.assert_hits(0);
    exa.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_slow_completion_times_out_with_fallback() -> Result<()> {
    // --- 1. Arrange: a pipeline of in-process fakes with a short completion budget ---
    let mock_server = MockServer::start();
    let (config, _dir) = load_config(&mock_config_yaml(&mock_server))?;
    let pipeline = ChatPipeline::builder()
        .embedder(Arc::new(MockEmbeddingProvider::default()))
        .vector_store(Arc::new(MockVectorStore::returning(vec![tool_record(
            0.9, "Jasper", "Copy",
        )])))
        .web_search(Arc::new(MockWebSearch::returning(vec![])))
        .ai_provider(Arc::new(MockAiProvider::hanging()))
        .persona(config.persona.clone())
        .settings(PipelineSettings {
            timeouts: StageTimeouts {
                completion: Duration::from_millis(100),
                ..StageTimeouts::default()
            },
            ..PipelineSettings::default()
        })
        .build();
    let app_state = AppState {
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
    };
    let app = TestApp::spawn_with_state(app_state, mock_server).await?;

    // --- 2. Act ---
    let response = app
        .client
        .post(app.url("/api/chat?debug=true"))
        .json(&json!({"message": "anything"}))
        .send()
        .await?;

    // --- 3. Assert ---
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], BOTFATHER_FALLBACK_MESSAGE);
    assert_eq!(body["debug"]["states"].as_array().unwrap().last().unwrap(), "failed");
    Ok(())
}
