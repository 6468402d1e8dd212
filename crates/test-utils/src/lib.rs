//! # Test Utilities
//!
//! Recording fakes for every provider trait used by the chat pipeline. Each fake
//! either returns a canned value, fails with an upstream-style error, or hangs
//! (to exercise timeouts), and records every call it receives for assertions.

use async_trait::async_trait;
use botfather::{
    errors::PromptError,
    prompts::AssembledPrompt,
    providers::{
        ai::{AiProvider, EmbeddingProvider},
        vector::VectorStore,
        web::WebSearch,
    },
    types::{Completion, GenerationOptions, RetrievedRecord, WebSnippet},
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a fake does when called.
#[derive(Clone, Debug)]
enum Behavior<T> {
    Return(T),
    Fail(String),
    Hang,
}

impl<T: Clone> Behavior<T> {
    async fn resolve(&self, service: &'static str) -> Result<T, PromptError> {
        match self {
            Behavior::Return(value) => Ok(value.clone()),
            Behavior::Fail(message) => Err(PromptError::Api {
                service,
                status: 503,
                body: message.clone(),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PromptError::EmptyResponse(service))
            }
        }
    }
}

/// A thread-safe list of recorded calls, shared between a fake and its clones.
#[derive(Clone, Debug)]
struct CallLog<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone> CallLog<T> {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    fn record(&self, call: T) {
        self.0.lock().unwrap().push(call);
    }

    fn get(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }
}

// --- Mock Embedding Provider ---

#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    behavior: Behavior<Vec<f32>>,
    calls: CallLog<String>,
}

impl MockEmbeddingProvider {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            behavior: Behavior::Return(vector),
            calls: CallLog::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: Behavior::Fail(message.to_string()),
            calls: CallLog::new(),
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: Behavior::Hang,
            calls: CallLog::new(),
        }
    }

    /// The texts this provider was asked to embed.
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.get()
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::returning(vec![0.1, 0.2, 0.3, 0.4])
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PromptError> {
        self.calls.record(text.to_string());
        self.behavior.resolve("mock embeddings").await
    }
}

// --- Mock Vector Store ---

#[derive(Clone, Debug)]
pub struct MockVectorStore {
    behavior: Behavior<Vec<RetrievedRecord>>,
    calls: CallLog<(Vec<f32>, u32)>,
}

impl MockVectorStore {
    pub fn returning(records: Vec<RetrievedRecord>) -> Self {
        Self {
            behavior: Behavior::Return(records),
            calls: CallLog::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: Behavior::Fail(message.to_string()),
            calls: CallLog::new(),
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: Behavior::Hang,
            calls: CallLog::new(),
        }
    }

    /// The `(vector, top_k)` pairs this store was queried with.
    pub fn get_calls(&self) -> Vec<(Vec<f32>, u32)> {
        self.calls.get()
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn query(
        &self,
        vector: &[f32],
        top_k: u32,
    ) -> Result<Vec<RetrievedRecord>, PromptError> {
        self.calls.record((vector.to_vec(), top_k));
        self.behavior.resolve("mock vector store").await
    }
}

// --- Mock Web Search ---

#[derive(Clone, Debug)]
pub struct MockWebSearch {
    behavior: Behavior<Vec<WebSnippet>>,
    calls: CallLog<(String, u32)>,
}

impl MockWebSearch {
    pub fn returning(snippets: Vec<WebSnippet>) -> Self {
        Self {
            behavior: Behavior::Return(snippets),
            calls: CallLog::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: Behavior::Fail(message.to_string()),
            calls: CallLog::new(),
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: Behavior::Hang,
            calls: CallLog::new(),
        }
    }

    /// The `(query, num_results)` pairs this provider was called with.
    pub fn get_calls(&self) -> Vec<(String, u32)> {
        self.calls.get()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, num_results: u32) -> Result<Vec<WebSnippet>, PromptError> {
        self.calls.record((query.to_string(), num_results));
        self.behavior.resolve("mock web search").await
    }
}

// --- Mock AI Provider ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    behavior: Behavior<String>,
    calls: CallLog<(AssembledPrompt, GenerationOptions)>,
}

impl MockAiProvider {
    pub fn returning(text: &str) -> Self {
        Self {
            behavior: Behavior::Return(text.to_string()),
            calls: CallLog::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: Behavior::Fail(message.to_string()),
            calls: CallLog::new(),
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: Behavior::Hang,
            calls: CallLog::new(),
        }
    }

    /// The prompts (and sampling options) sent to this provider.
    pub fn get_calls(&self) -> Vec<(AssembledPrompt, GenerationOptions)> {
        self.calls.get()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        prompt: &AssembledPrompt,
        options: &GenerationOptions,
    ) -> Result<Completion, PromptError> {
        self.calls.record((prompt.clone(), options.clone()));
        let text = self.behavior.resolve("mock completion").await?;
        Ok(Completion {
            text,
            finish_reason: Some("stop".to_string()),
        })
    }
}

// --- Fixtures ---

/// A vector store record with a name and a description field.
pub fn tool_record(score: f32, name: &str, description: &str) -> RetrievedRecord {
    RetrievedRecord::new(score)
        .with_field("name", name)
        .with_field("description", description)
}

/// A web snippet with a title, URL and body but no highlights.
pub fn web_snippet(title: &str, url: &str, body: &str) -> WebSnippet {
    WebSnippet {
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        highlights: Vec::new(),
        body: Some(body.to_string()),
    }
}
