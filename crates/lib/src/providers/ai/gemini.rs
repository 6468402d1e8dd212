use crate::{
    errors::PromptError,
    prompts::AssembledPrompt,
    providers::{
        ai::AiProvider,
        http::{build_client, send_with_retry, HttpSettings, RetryPolicy},
    },
    types::{Completion, GenerationOptions, Role},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

const SERVICE: &str = "Gemini API";

// --- Gemini-specific request and response structures ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize, Debug)]
struct PartResponse {
    #[serde(default)]
    text: String,
}

// --- Gemini Provider implementation ---

/// A provider for interacting with the Google Gemini `generateContent` API.
#[derive(Clone, Debug)]
pub struct GeminiProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider`.
    pub fn new(
        api_url: String,
        api_key: String,
        settings: HttpSettings,
    ) -> Result<Self, PromptError> {
        Ok(Self {
            client: build_client(&settings)?,
            api_url,
            api_key,
            retry: settings.retry,
        })
    }
}

/// Splits an assembled prompt into Gemini's shape: the leading persona block becomes
/// the system instruction, every later block becomes a turn. Gemini has no system
/// turns, so a dedicated context block is sent as a user turn in the same position.
fn to_gemini_request<'a>(
    prompt: &'a AssembledPrompt,
    options: &GenerationOptions,
) -> GeminiRequest<'a> {
    let mut messages = prompt.messages.iter().peekable();
    let system_instruction = messages
        .next_if(|m| m.role == Role::System)
        .map(|m| SystemInstruction {
            parts: vec![Part { text: &m.content }],
        });

    let contents = messages
        .map(|m| Content {
            role: match m.role {
                Role::Assistant => "model",
                Role::User | Role::System => "user",
            },
            parts: vec![Part { text: &m.content }],
        })
        .collect();

    GeminiRequest {
        system_instruction,
        contents,
        generation_config: GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        },
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &AssembledPrompt,
        options: &GenerationOptions,
    ) -> Result<Completion, PromptError> {
        let request_body = to_gemini_request(prompt, options);
        debug!(
            turns = request_body.contents.len(),
            "--> Sending request to Gemini API"
        );

        let response = send_with_retry(SERVICE, &self.retry, || {
            self.client
                .post(&self.api_url)
                .query(&[("key", &self.api_key)])
                .json(&request_body)
        })
        .await?;

        let gemini_response: GeminiResponse =
            response
                .json()
                .await
                .map_err(|source| PromptError::Deserialization {
                    service: SERVICE,
                    source,
                })?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or(PromptError::EmptyResponse(SERVICE))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(PromptError::EmptyResponse(SERVICE));
        }

        Ok(Completion {
            text,
            finish_reason: candidate.finish_reason,
        })
    }
}
