//! # Common Test Utilities
//!
//! `TestApp` spawns the real router on a random port with every upstream
//! service (embeddings, Pinecone, Exa, completion) pointed at a single
//! `httpmock::MockServer`, plus helpers for the canned upstream responses.

// Allow unused code because this is a test utility module, and not all
// functions might be used by every test file that includes it.
#![allow(unused)]

use anyhow::Result;
use botfather_server::{
    config::{self, AppConfig},
    router,
    state::{build_app_state, AppState},
};
use axum::serve;
use httpmock::{Method::POST, Mock, MockServer};
use reqwest::Client;
use serde_json::json;
use std::{fs::File, io::Write, net::SocketAddr};
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

pub const EMBEDDINGS_PATH: &str = "/v1/embeddings";
pub const QUERY_PATH: &str = "/query";
pub const SEARCH_PATH: &str = "/search";
pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// A config that points every upstream at `mock_server`, with retries disabled.
pub fn mock_config_yaml(mock_server: &MockServer) -> String {
    format!(
        r#"
port: 0
embedding:
  api_url: "{}"
  model_name: "mock-embedding-model"
vector_store:
  index_host: "{}"
  api_key: "pc-test-key"
  top_k: 5
web_search:
  api_url: "{}"
  api_key: "exa-test-key"
  num_results: 3
completion:
  provider: "openai"
  api_url: "{}"
  api_key: "sk-test"
  model_name: "mock-chat-model"
retry:
  max_retries: 0
  backoff_base_ms: 1
timeouts:
  embedding_ms: 2000
  retrieval_ms: 2000
  search_ms: 2000
  completion_ms: 2000
"#,
        mock_server.url(EMBEDDINGS_PATH),
        mock_server.base_url(),
        mock_server.url(SEARCH_PATH),
        mock_server.url(COMPLETIONS_PATH),
    )
}

/// Writes `yaml` to a temporary `config.yml` and loads it.
pub fn load_config(yaml: &str) -> Result<(AppConfig, TempDir)> {
    let config_dir = tempdir()?;
    let config_path = config_dir.path().join("config.yml");
    let mut file = File::create(&config_path)?;
    file.write_all(yaml.as_bytes())?;
    let config = config::get_config(Some(config_path.to_str().unwrap()))?;
    Ok((config, config_dir))
}

// --- Full Application Test Harness ---

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub mock_server: MockServer,
    pub app_state: AppState,
    _config_dir: Option<TempDir>,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the server with every upstream mocked.
    pub async fn spawn() -> Result<Self> {
        let mock_server = MockServer::start();
        let yaml = mock_config_yaml(&mock_server);
        Self::spawn_with_yaml(mock_server, &yaml).await
    }

    /// Spawns the server from a custom configuration file.
    pub async fn spawn_with_yaml(mock_server: MockServer, yaml: &str) -> Result<Self> {
        let (config, config_dir) = load_config(yaml)?;
        let app_state = build_app_state(config).await?;
        let mut app = TestApp::spawn_with_state(app_state, mock_server).await?;
        app._config_dir = Some(config_dir);
        Ok(app)
    }

    pub async fn spawn_with_state(app_state: AppState, mock_server: MockServer) -> Result<Self> {
        dotenvy::dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let app_state_for_harness = app_state.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(app_state);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::new(),
            mock_server,
            app_state: app_state_for_harness,
            _config_dir: None,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    // --- Canned upstream responses ---

    pub fn mock_embeddings(&self) -> Mock<'_> {
        self.mock_server.mock(|when, then| {
            when.method(POST).path(EMBEDDINGS_PATH);
            then.status(200)
                .json_body(json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]}));
        })
    }

    pub fn mock_pinecone(&self) -> Mock<'_> {
        self.mock_server.mock(|when, then| {
            when.method(POST)
                .path(QUERY_PATH)
                .header("Api-Key", "pc-test-key");
            then.status(200).json_body(json!({
                "matches": [
                    {"id": "jasper", "score": 0.93, "metadata": {"Chatbot_Name": "Jasper", "Use_Case": "Marketing copy"}},
                    {"id": "copyai", "score": 0.87, "metadata": {"name": "Copy.ai", "description": "Short-form ads"}}
                ]
            }));
        })
    }

    pub fn mock_exa(&self) -> Mock<'_> {
        self.mock_server.mock(|when, then| {
            when.method(POST)
                .path(SEARCH_PATH)
                .header("x-api-key", "exa-test-key");
            then.status(200).json_body(json!({
                "results": [
                    {"title": "Best AI writers", "url": "https://example.com/writers", "highlights": ["Jasper tops the list"]},
                    {"title": "Writesonic review", "url": "https://example.com/writesonic", "text": "Fast drafts for blogs."},
                    {"title": "Rytr pricing", "url": "https://example.com/rytr", "highlights": [{"text": "Free tier for short copy"}]}
                ]
            }));
        })
    }

    /// Both sources answer, but with nothing to offer.
    pub fn mock_empty_sources(&self) -> (Mock<'_>, Mock<'_>) {
        let pinecone = self.mock_server.mock(|when, then| {
            when.method(POST).path(QUERY_PATH);
            then.status(200).json_body(json!({"matches": []}));
        });
        let exa = self.mock_server.mock(|when, then| {
            when.method(POST).path(SEARCH_PATH);
            then.status(200).json_body(json!({"results": []}));
        });
        (pinecone, exa)
    }

    pub fn mock_completion(&self, answer: &str) -> Mock<'_> {
        let answer = answer.to_string();
        self.mock_server.mock(move |when, then| {
            when.method(POST).path(COMPLETIONS_PATH);
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": answer}, "finish_reason": "stop"}]
            }));
        })
    }

    pub fn mock_failure(&self, path: &str, status: u16) -> Mock<'_> {
        let path = path.to_string();
        self.mock_server.mock(move |when, then| {
            when.method(POST).path(path);
            then.status(status).body("upstream exploded: secret detail");
        })
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
