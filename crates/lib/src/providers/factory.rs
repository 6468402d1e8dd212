//! # AI Provider Factory
//!
//! Builds the completion provider named in configuration. Any consumer of the
//! library (server, tests) goes through here so provider selection stays in one place.

use crate::{
    errors::PromptError,
    providers::{
        ai::{gemini::GeminiProvider, openai::OpenAiProvider, AiProvider},
        http::HttpSettings,
    },
    types::ProviderConfig,
};
use std::sync::Arc;
use tracing::info;

/// The default endpoint for the OpenAI provider when no `api_url` is configured.
pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Creates a completion provider from its configuration.
///
/// - `openai` (alias `local`): any OpenAI-compatible chat completions endpoint.
/// - `gemini`: the Gemini API; the URL is derived from the model name when absent.
pub fn create_ai_provider(
    config: &ProviderConfig,
    settings: HttpSettings,
) -> Result<Arc<dyn AiProvider>, PromptError> {
    let provider: Arc<dyn AiProvider> = match config.provider.as_str() {
        "openai" | "local" => {
            let api_url = config
                .api_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| OPENAI_CHAT_COMPLETIONS_URL.to_string());
            info!("Configuring OpenAI-compatible provider with URL: {}", api_url);
            Arc::new(OpenAiProvider::new(
                api_url,
                config.api_key.clone().filter(|key| !key.is_empty()),
                Some(config.model_name.clone()),
                settings,
            )?)
        }
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    PromptError::MissingAiProvider(
                        "api_key is required for the gemini provider".to_string(),
                    )
                })?;
            let api_url = config
                .api_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| {
                    format!(
                        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                        config.model_name
                    )
                });
            info!("Configuring Gemini provider with URL: {}", api_url);
            Arc::new(GeminiProvider::new(api_url, api_key, settings)?)
        }
        other => {
            return Err(PromptError::MissingAiProvider(format!(
                "unsupported provider type '{other}'"
            )))
        }
    };
    Ok(provider)
}
