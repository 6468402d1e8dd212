//! # Embeddings Provider
//!
//! This module provides functionality for generating vector embeddings by calling
//! an external, OpenAI-compatible (or Gemini) embeddings API.

use crate::{
    errors::PromptError,
    providers::http::{build_client, send_with_retry, HttpSettings, RetryPolicy},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

const SERVICE: &str = "Embeddings API";

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PromptError>;
}

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

// --- Gemini-specific request and response structures ---

#[derive(Serialize, Debug)]
struct GeminiEmbeddingRequest<'a> {
    model: String,
    content: GeminiEmbeddingContent<'a>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingContent<'a> {
    parts: Vec<GeminiEmbeddingPart<'a>>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GeminiEmbeddingResponse {
    embedding: GeminiEmbeddingValue,
}

#[derive(Deserialize, Debug)]
struct GeminiEmbeddingValue {
    values: Vec<f32>,
}

/// Calls a hosted embeddings endpoint.
///
/// The payload shape is picked from the URL: Gemini endpoints get the
/// `embedContent` format, everything else the OpenAI `/v1/embeddings` format.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: ReqwestClient,
    api_url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpEmbeddingProvider {
    pub fn new(
        api_url: String,
        model: String,
        api_key: Option<String>,
        settings: HttpSettings,
    ) -> Result<Self, PromptError> {
        Ok(Self {
            client: build_client(&settings)?,
            api_url,
            model,
            api_key,
            retry: settings.retry,
        })
    }

    fn is_gemini(&self) -> bool {
        self.api_url.contains("generativelanguage.googleapis.com")
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PromptError> {
        let deserialization = |source| PromptError::Deserialization {
            service: SERVICE,
            source,
        };

        if self.is_gemini() {
            // Gemini requires the model name to be prefixed with "models/" in the payload.
            let model = if self.model.starts_with("models/") {
                self.model.clone()
            } else {
                format!("models/{}", self.model)
            };
            let request_body = GeminiEmbeddingRequest {
                model,
                content: GeminiEmbeddingContent {
                    parts: vec![GeminiEmbeddingPart { text }],
                },
            };
            debug!(payload = ?request_body, "--> Sending request to Gemini Embeddings API");

            let response = send_with_retry(SERVICE, &self.retry, || {
                let builder = self.client.post(&self.api_url).json(&request_body);
                match &self.api_key {
                    // Gemini uses an `x-goog-api-key` header for embeddings, not a query param.
                    Some(key) => builder.header("x-goog-api-key", key),
                    None => builder,
                }
            })
            .await?;
            let body: GeminiEmbeddingResponse =
                response.json().await.map_err(deserialization)?;
            return non_empty(body.embedding.values);
        }

        let request_body = OpenAIEmbeddingRequest {
            model: &self.model,
            input: text,
        };
        debug!(payload = ?request_body, "--> Sending request to OpenAI-compatible Embeddings API");

        let response = send_with_retry(SERVICE, &self.retry, || {
            let builder = self.client.post(&self.api_url).json(&request_body);
            match &self.api_key {
                Some(key) => builder.bearer_auth(key),
                None => builder,
            }
        })
        .await?;
        let body: OpenAIEmbeddingResponse = response.json().await.map_err(deserialization)?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .map_or(Err(PromptError::EmptyResponse(SERVICE)), non_empty)
    }
}

fn non_empty(vector: Vec<f32>) -> Result<Vec<f32>, PromptError> {
    if vector.is_empty() {
        Err(PromptError::EmptyResponse(SERVICE))
    } else {
        Ok(vector)
    }
}
