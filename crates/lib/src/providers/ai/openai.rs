use crate::{
    errors::PromptError,
    prompts::AssembledPrompt,
    providers::{
        ai::AiProvider,
        http::{build_client, send_with_retry, HttpSettings, RetryPolicy},
    },
    types::{Completion, GenerationOptions},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

const SERVICE: &str = "Completion API";

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct OpenAiRequest<'a> {
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// --- OpenAI Provider implementation ---

/// A provider for OpenAI or any OpenAI-compatible chat completions API.
#[derive(Clone, Debug)]
pub struct OpenAiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: Option<String>,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    /// Creates a new `OpenAiProvider`.
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
        settings: HttpSettings,
    ) -> Result<Self, PromptError> {
        Ok(Self {
            client: build_client(&settings)?,
            api_url,
            api_key,
            model,
            retry: settings.retry,
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn generate(
        &self,
        prompt: &AssembledPrompt,
        options: &GenerationOptions,
    ) -> Result<Completion, PromptError> {
        let request_body = OpenAiRequest {
            messages: prompt
                .messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            model: self.model.as_deref(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };
        debug!(
            messages = request_body.messages.len(),
            "--> Sending request to OpenAI-compatible completion API"
        );

        let response = send_with_retry(SERVICE, &self.retry, || {
            let builder = self.client.post(&self.api_url).json(&request_body);
            match &self.api_key {
                Some(key) => builder.bearer_auth(key),
                None => builder,
            }
        })
        .await?;

        let body: OpenAiResponse =
            response
                .json()
                .await
                .map_err(|source| PromptError::Deserialization {
                    service: SERVICE,
                    source,
                })?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(PromptError::EmptyResponse(SERVICE))?;
        let text = choice
            .message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or(PromptError::EmptyResponse(SERVICE))?;

        Ok(Completion {
            text,
            finish_reason: choice.finish_reason,
        })
    }
}
