//! # Application Configuration
//!
//! This module defines the configuration structure for the `botfather-server` and
//! provides the logic for loading it from a `config.yml` file, an optional
//! `persona.yml` and environment variables.

use botfather::{
    context::FormatterConfig,
    pipeline::StageTimeouts,
    prompts::persona::{
        BOTFATHER_CONTEXT_PROMPT, BOTFATHER_FALLBACK_MESSAGE, BOTFATHER_GREETING,
        BOTFATHER_SYSTEM_PROMPT,
    },
    providers::{http::RetryPolicy, web::exa::EXA_SEARCH_URL, web::ExaSearchOptions},
    types::ProviderConfig,
    GenerationOptions, PersonaConfig,
};
use config::{Config as ConfigBuilder, Environment, File, FileFormat, Value as ConfigValue};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").expect("env var pattern is valid")
});

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Configuration for the text embedding model.
    pub embedding: EmbeddingConfig,
    /// The Pinecone index holding the tool knowledge base.
    #[serde(default)]
    pub vector_store: Option<VectorStoreConfig>,
    /// The Exa web search service.
    #[serde(default)]
    pub web_search: Option<WebSearchConfig>,
    /// The completion model that writes the answer.
    pub completion: CompletionConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub persona: PersonaConfig,
    /// Field aliases, placeholders and excerpt length for context bullets.
    #[serde(default)]
    pub context: FormatterConfig,
}

/// Provides a default value for the `port` field if not set in the environment.
fn default_port() -> u16 {
    9090
}

/// Configuration for the embedding model provider.
#[derive(Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl EmbeddingConfig {
    /// Hosted embedding APIs need a key; self-hosted endpoints may not.
    pub fn is_usable(&self) -> bool {
        !self.api_url.trim().is_empty()
            && (has_key(self.api_key.as_deref()) || !is_hosted_api(&self.api_url))
    }
}

/// Hosts that reject requests without an API key.
const HOSTED_API_HOSTS: [&str; 2] = ["api.openai.com", "generativelanguage.googleapis.com"];

fn is_hosted_api(url: &str) -> bool {
    HOSTED_API_HOSTS.iter().any(|host| url.contains(host))
}

fn has_key(key: Option<&str>) -> bool {
    key.is_some_and(|k| !k.trim().is_empty())
}

#[derive(Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// The index's data-plane host, with or without a scheme.
    #[serde(default)]
    pub index_host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_top_k() -> u32 {
    5
}

impl VectorStoreConfig {
    /// Both the host and the key are needed to reach the index.
    pub fn is_usable(&self) -> bool {
        !self.index_host.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

#[derive(Deserialize, Clone)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_num_results")]
    pub num_results: u32,
    /// "neural", "keyword" or "auto".
    #[serde(default = "default_search_type")]
    pub search_type: String,
    #[serde(default = "default_true")]
    pub use_autoprompt: bool,
    #[serde(default = "default_max_characters")]
    pub max_characters: u32,
    #[serde(default = "default_highlight_sentences")]
    pub highlight_sentences: u32,
}

fn default_search_url() -> String {
    EXA_SEARCH_URL.to_string()
}

fn default_num_results() -> u32 {
    3
}

fn default_search_type() -> String {
    ExaSearchOptions::default().search_type
}

fn default_true() -> bool {
    true
}

fn default_max_characters() -> u32 {
    ExaSearchOptions::default().max_characters
}

fn default_highlight_sentences() -> u32 {
    ExaSearchOptions::default().highlight_sentences
}

impl WebSearchConfig {
    pub fn is_usable(&self) -> bool {
        !self.api_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    pub fn search_options(&self) -> ExaSearchOptions {
        ExaSearchOptions {
            search_type: self.search_type.clone(),
            use_autoprompt: self.use_autoprompt,
            max_characters: self.max_characters,
            highlight_sentences: self.highlight_sentences,
        }
    }
}

/// The completion provider and its sampling options.
#[derive(Deserialize, Clone)]
pub struct CompletionConfig {
    /// The type of provider ("openai" or "gemini").
    pub provider: String,
    /// The API URL. Optional; each provider has a default.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

impl CompletionConfig {
    /// Gemini always needs a key. OpenAI-compatible providers need one unless
    /// `api_url` points at a self-hosted endpoint.
    pub fn is_usable(&self) -> bool {
        if has_key(self.api_key.as_deref()) {
            return true;
        }
        match self.provider.as_str() {
            "gemini" => false,
            "openai" | "local" => self
                .api_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty() && !is_hosted_api(url)),
            // Unknown types are rejected by the provider factory.
            _ => true,
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider.clone(),
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            model_name: self.model_name.clone(),
        }
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

// --- Debug output that never prints API keys ---

/// Stands in for a secret in `Debug` output.
fn redacted(key: &str) -> &'static str {
    if key.trim().is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_url", &self.api_url)
            .field("model_name", &self.model_name)
            .field("api_key", &redacted(self.api_key.as_deref().unwrap_or_default()))
            .finish()
    }
}

impl fmt::Debug for VectorStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStoreConfig")
            .field("index_host", &self.index_host)
            .field("api_key", &redacted(&self.api_key))
            .field("namespace", &self.namespace)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redacted(&self.api_key))
            .field("num_results", &self.num_results)
            .field("search_type", &self.search_type)
            .field("use_autoprompt", &self.use_autoprompt)
            .field("max_characters", &self.max_characters)
            .field("highlight_sentences", &self.highlight_sentences)
            .finish()
    }
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &redacted(self.api_key.as_deref().unwrap_or_default()))
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Per-stage time budgets, in milliseconds.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TimeoutsConfig {
    #[serde(default = "default_embedding_ms")]
    pub embedding_ms: u64,
    #[serde(default = "default_retrieval_ms")]
    pub retrieval_ms: u64,
    #[serde(default = "default_search_ms")]
    pub search_ms: u64,
    #[serde(default = "default_completion_ms")]
    pub completion_ms: u64,
}

fn default_embedding_ms() -> u64 {
    10_000
}

fn default_retrieval_ms() -> u64 {
    10_000
}

fn default_search_ms() -> u64 {
    15_000
}

fn default_completion_ms() -> u64 {
    60_000
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            embedding_ms: default_embedding_ms(),
            retrieval_ms: default_retrieval_ms(),
            search_ms: default_search_ms(),
            completion_ms: default_completion_ms(),
        }
    }
}

impl TimeoutsConfig {
    pub fn stage_timeouts(&self) -> StageTimeouts {
        StageTimeouts {
            embedding: Duration::from_millis(self.embedding_ms),
            retrieval: Duration::from_millis(self.retrieval_ms),
            search: Duration::from_millis(self.search_ms),
            completion: Duration::from_millis(self.completion_ms),
        }
    }
}

/// Constructs a `config::Value` table of the default persona from the library.
/// This serves as the base layer of configuration.
fn build_default_persona() -> HashMap<String, ConfigValue> {
    [
        ("system_template", BOTFATHER_SYSTEM_PROMPT),
        ("context_template", BOTFATHER_CONTEXT_PROMPT),
        ("history_mode", "messages"),
        ("fallback_message", BOTFATHER_FALLBACK_MESSAGE),
        ("greeting", BOTFATHER_GREETING),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), ConfigValue::from(value)))
    .collect()
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::General(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;

    let expanded_content = ENV_VAR.replace_all(&content, |caps: &Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded_content.into_owned()))
}

/// Loads the application configuration from files and environment variables.
///
/// Layers, lowest priority first:
/// 1. the built-in BotFather persona;
/// 2. the main config: `config_path_override`, else `config.yml`, else `config.default.yml`;
/// 3. an optional `persona.yml` in the same directory as the main config;
/// 4. plain environment variables for top-level keys like `PORT`;
/// 5. `BOTFATHER_...` variables for nested keys (e.g. `BOTFATHER_WEB_SEARCH__NUM_RESULTS`).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let base_path = env!("CARGO_MANIFEST_DIR");
    let mut builder = ConfigBuilder::builder()
        // Layer 1: Programmatic defaults from the library.
        .set_default("persona", build_default_persona())?;

    // Layer 2: Main Config (with Fallback)
    let main_config_path = match config_path_override {
        Some(override_path) => Path::new(override_path).to_path_buf(),
        None => {
            let user_config_path = Path::new(base_path).join("config.yml");
            if user_config_path.exists() {
                info!(
                    "Loading user-defined configuration from '{}'.",
                    user_config_path.display()
                );
                user_config_path
            } else {
                let fallback_path = Path::new(base_path).join("config.default.yml");
                info!(
                    "'{}' not found. Falling back to '{}'.",
                    user_config_path.display(),
                    fallback_path.display()
                );
                fallback_path
            }
        }
    };

    let main_content = read_and_substitute(&main_config_path)?.ok_or_else(|| {
        ConfigError::NotFound(format!(
            "Main config file not found at '{}'. Please create 'config.yml' or restore 'config.default.yml'.",
            main_config_path.display()
        ))
    })?;
    builder = builder.add_source(File::from_str(&main_content, FileFormat::Yaml));

    // Layer 3: Persona Overrides (Optional)
    let persona_path = main_config_path
        .parent()
        .unwrap_or_else(|| Path::new(base_path))
        .join("persona.yml");
    if let Some(persona_content) = read_and_substitute(&persona_path)? {
        info!("Loading persona overrides from '{}'.", persona_path.display());
        let wrapped = wrap_persona_file(&persona_content);
        builder = builder.add_source(File::from_str(&wrapped, FileFormat::Yaml));
    }

    let settings = builder
        // Layer 4: Load environment variables for top-level keys like PORT.
        .add_source(Environment::default())
        // Layer 5: Load prefixed environment variables for deeper overrides.
        .add_source(
            Environment::with_prefix("BOTFATHER")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    // Deserialize the fully resolved configuration into our `AppConfig` struct.
    let config: AppConfig = settings.try_deserialize()?;
    Ok(config)
}

/// `persona.yml` holds persona keys at its top level; nest them under `persona:`.
fn wrap_persona_file(content: &str) -> String {
    let indented: String = content
        .lines()
        .map(|line| format!("  {line}\n"))
        .collect();
    format!("persona:\n{indented}")
}
