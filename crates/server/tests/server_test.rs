//! # Server Smoke Tests
//!
//! Root, health, greeting and CORS behaviour of the router.

mod common;

use anyhow::Result;
use botfather::prompts::persona::BOTFATHER_GREETING;
use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn test_root_and_health() -> Result<()> {
    let app = TestApp::spawn().await?;

    let root = app.client.get(app.url("/")).send().await?;
    assert_eq!(root.status(), 200);
    assert_eq!(root.text().await?, "botfather server is running.");

    let health = app.client.get(app.url("/health")).send().await?;
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_greeting_is_served_from_persona() -> Result<()> {
    let app = TestApp::spawn().await?;

    let body: Value = app
        .client
        .get(app.url("/api/greeting"))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(
        body,
        json!({"role": "assistant", "content": BOTFATHER_GREETING})
    );
    Ok(())
}

#[tokio::test]
async fn test_cors_allows_cross_origin_widget() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app
        .client
        .request(reqwest::Method::OPTIONS, app.url("/api/chat"))
        .header("Origin", "https://widget.example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await?;

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    Ok(())
}
